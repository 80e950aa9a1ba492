use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::security;

/// An ephemeral, password-gated meeting. Valid only while
/// `now < expires_at`; a lookup past that moment deletes it.
#[derive(Debug, Clone, Serialize)]
pub struct Meeting {
    pub id: String,
    pub password: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// One membership entry, as exposed to signaling clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParticipantEntry {
    pub connection_id: String,
    pub participant_id: String,
}

/// All registry maps live behind one lock so that the forward
/// membership map and the reverse connection index can never be
/// observed out of step, and so the grace-period deletion check is
/// atomic with respect to concurrent joins.
#[derive(Default)]
struct RegistryInner {
    meetings: HashMap<String, Meeting>,
    // meeting_id -> (connection_id -> participant_id)
    participants: HashMap<String, HashMap<String, String>>,
    // connection_id -> meeting_id
    conn_to_meeting: HashMap<String, String>,
}

/// Meeting Registry: owns meeting records and participant membership.
///
/// Purely in-memory; nothing survives a restart. Expiry is enforced
/// both lazily on lookup and eagerly by the periodic sweep, using the
/// same comparison.
pub struct MeetingRegistry {
    inner: Mutex<RegistryInner>,
    meeting_ttl: Duration,
    empty_grace: StdDuration,
}

impl MeetingRegistry {
    pub fn new(meeting_ttl_seconds: u64, empty_grace: StdDuration) -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
            meeting_ttl: Duration::seconds(meeting_ttl_seconds as i64),
            empty_grace,
        }
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        // A poisoned lock means a panic mid-mutation elsewhere; the maps
        // are still structurally sound, so keep serving.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create a meeting with a fresh id and password.
    ///
    /// Id and password collisions are not checked; the keyspace makes
    /// them statistically negligible for entries that live two hours.
    pub fn create(&self) -> Meeting {
        let created_at = Utc::now();
        let meeting = Meeting {
            id: security::generate_meeting_id(),
            password: security::generate_meeting_password(),
            created_at,
            expires_at: created_at + self.meeting_ttl,
        };

        let mut inner = self.lock();
        inner
            .participants
            .insert(meeting.id.clone(), HashMap::new());
        inner.meetings.insert(meeting.id.clone(), meeting.clone());

        tracing::info!(meeting_id = %meeting.id, "Meeting created");
        meeting
    }

    /// Look up a meeting, lazily deleting it if it has expired.
    pub fn get(&self, meeting_id: &str) -> Option<Meeting> {
        let mut inner = self.lock();
        let expires_at = inner.meetings.get(meeting_id)?.expires_at;

        if Utc::now() > expires_at {
            delete_meeting(&mut inner, meeting_id);
            tracing::debug!(meeting_id = %meeting_id, "Expired meeting removed on lookup");
            return None;
        }

        inner.meetings.get(meeting_id).cloned()
    }

    /// Insert (or overwrite) a membership entry and its reverse-index
    /// counterpart. A no-op if the meeting no longer exists; a race
    /// with expiry must not corrupt state or error.
    pub fn add_participant(&self, meeting_id: &str, connection_id: &str, participant_id: &str) {
        let mut inner = self.lock();
        let Some(members) = inner.participants.get_mut(meeting_id) else {
            return;
        };
        members.insert(connection_id.to_string(), participant_id.to_string());
        inner
            .conn_to_meeting
            .insert(connection_id.to_string(), meeting_id.to_string());
    }

    /// Remove a membership entry and its reverse-index counterpart,
    /// atomically. Returns true when the membership became empty.
    fn remove_entry(&self, meeting_id: &str, connection_id: &str) -> bool {
        let mut inner = self.lock();
        inner.conn_to_meeting.remove(connection_id);
        match inner.participants.get_mut(meeting_id) {
            Some(members) => {
                members.remove(connection_id);
                members.is_empty()
            }
            None => false,
        }
    }

    /// Fire-time check for the empty-grace deletion: delete the meeting
    /// only if its membership is still empty.
    pub fn delete_if_still_empty(&self, meeting_id: &str) {
        let mut inner = self.lock();
        let still_empty = inner
            .participants
            .get(meeting_id)
            .is_some_and(|members| members.is_empty());
        if still_empty {
            delete_meeting(&mut inner, meeting_id);
            tracing::info!(meeting_id = %meeting_id, "Empty meeting deleted after grace period");
        }
    }

    /// Snapshot of current membership. Order carries no meaning.
    pub fn list_participants(&self, meeting_id: &str) -> Vec<ParticipantEntry> {
        let inner = self.lock();
        inner
            .participants
            .get(meeting_id)
            .map(|members| {
                members
                    .iter()
                    .map(|(connection_id, participant_id)| ParticipantEntry {
                        connection_id: connection_id.clone(),
                        participant_id: participant_id.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Reverse lookup for abrupt disconnects, where the departing
    /// connection never told us its meeting.
    pub fn find_meeting_of(&self, connection_id: &str) -> Option<String> {
        self.lock().conn_to_meeting.get(connection_id).cloned()
    }

    /// Delete every meeting past its expiry, cascading membership and
    /// reverse-index cleanup. Same comparison as the lazy path in
    /// [`MeetingRegistry::get`].
    pub fn sweep(&self, now: DateTime<Utc>) {
        let mut inner = self.lock();
        let expired: Vec<String> = inner
            .meetings
            .values()
            .filter(|m| now > m.expires_at)
            .map(|m| m.id.clone())
            .collect();

        for meeting_id in &expired {
            delete_meeting(&mut inner, meeting_id);
        }

        if !expired.is_empty() {
            tracing::info!(count = expired.len(), "Expired meetings swept");
        }
    }

    /// Periodic sweep task; spawned once at startup.
    pub async fn run_sweeper(self: Arc<Self>, interval: StdDuration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            self.sweep(Utc::now());
        }
    }

    #[cfg(test)]
    fn membership_size(&self, meeting_id: &str) -> usize {
        self.lock()
            .participants
            .get(meeting_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    #[cfg(test)]
    fn reverse_index_size(&self) -> usize {
        self.lock().conn_to_meeting.len()
    }
}

/// Remove a participant from a meeting.
///
/// If the meeting becomes empty this schedules a deletion check after
/// the grace period. The check re-reads membership at fire time, so a
/// rejoin inside the window cancels the deletion.
pub fn remove_participant(registry: &Arc<MeetingRegistry>, meeting_id: &str, connection_id: &str) {
    if registry.remove_entry(meeting_id, connection_id) {
        let registry = Arc::clone(registry);
        let meeting_id = meeting_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(registry.empty_grace).await;
            registry.delete_if_still_empty(&meeting_id);
        });
    }
}

/// Remove a meeting and all of its membership state. Caller holds the
/// registry lock.
fn delete_meeting(inner: &mut RegistryInner, meeting_id: &str) {
    if let Some(members) = inner.participants.remove(meeting_id) {
        for connection_id in members.keys() {
            inner.conn_to_meeting.remove(connection_id);
        }
    }
    inner.meetings.remove(meeting_id);
}
