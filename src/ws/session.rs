use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ws::SignalingMessage;

/// Handle for pushing messages to one connected client.
#[derive(Clone)]
pub struct ClientHandle {
    pub connection_id: String,
    pub participant_id: String,
    pub sender: mpsc::UnboundedSender<SignalingMessage>,
}

impl ClientHandle {
    pub fn new(
        connection_id: String,
        participant_id: String,
        sender: mpsc::UnboundedSender<SignalingMessage>,
    ) -> Self {
        Self {
            connection_id,
            participant_id,
            sender,
        }
    }

    pub fn send(
        &self,
        msg: SignalingMessage,
    ) -> Result<(), mpsc::error::SendError<SignalingMessage>> {
        self.sender.send(msg)
    }
}

/// All connections currently bound to one meeting.
pub struct MeetingConnections {
    clients: dashmap::DashMap<String, ClientHandle>, // connection_id -> handle
}

impl MeetingConnections {
    pub fn new() -> Self {
        Self {
            clients: dashmap::DashMap::new(),
        }
    }

    pub fn add_client(&self, handle: ClientHandle) {
        self.clients.insert(handle.connection_id.clone(), handle);
    }

    pub fn remove_client(&self, connection_id: &str) -> Option<ClientHandle> {
        self.clients.remove(connection_id).map(|(_, v)| v)
    }

    /// Directed single-hop delivery. Returns false when the target is
    /// not (or no longer) in this meeting.
    pub fn send_to(&self, connection_id: &str, msg: SignalingMessage) -> bool {
        match self.clients.get(connection_id) {
            Some(client) => client.send(msg).is_ok(),
            None => false,
        }
    }

    pub fn broadcast(&self, msg: SignalingMessage, exclude_connection_id: Option<&str>) {
        for client in self.clients.iter() {
            if let Some(exclude) = exclude_connection_id {
                if client.connection_id == exclude {
                    continue;
                }
            }
            let _ = client.send(msg.clone());
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

impl Default for MeetingConnections {
    fn default() -> Self {
        Self::new()
    }
}

/// Transport-level groups, addressed by meeting id. Membership truth
/// lives in the registry; this only tracks live sockets for delivery.
pub struct ConnectionsManager {
    meetings: dashmap::DashMap<String, Arc<MeetingConnections>>,
}

impl ConnectionsManager {
    pub fn new() -> Self {
        Self {
            meetings: dashmap::DashMap::new(),
        }
    }

    pub fn get_or_create_meeting(&self, meeting_id: &str) -> Arc<MeetingConnections> {
        self.meetings
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(MeetingConnections::new()))
            .clone()
    }

    pub fn get_meeting(&self, meeting_id: &str) -> Option<Arc<MeetingConnections>> {
        self.meetings.get(meeting_id).map(|r| r.clone())
    }

    pub fn remove_client_from_meeting(
        &self,
        meeting_id: &str,
        connection_id: &str,
    ) -> Option<ClientHandle> {
        if let Some(meeting) = self.meetings.get(meeting_id) {
            let handle = meeting.remove_client(connection_id);

            if meeting.is_empty() {
                drop(meeting);
                self.meetings.remove(meeting_id);
            }

            handle
        } else {
            None
        }
    }

    pub fn broadcast_to_meeting(
        &self,
        meeting_id: &str,
        msg: SignalingMessage,
        exclude_connection_id: Option<&str>,
    ) {
        if let Some(meeting) = self.meetings.get(meeting_id) {
            meeting.broadcast(msg, exclude_connection_id);
        }
    }

    pub fn meeting_count(&self) -> usize {
        self.meetings.len()
    }
}

impl Default for ConnectionsManager {
    fn default() -> Self {
        Self::new()
    }
}
