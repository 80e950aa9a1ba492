use axum::{
    extract::{
        ws::{Message, WebSocket},
        Query, State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;
use crate::ws::{
    msg_types, AnswerPayload, ClientHandle, IceCandidatePayload, JoinMeetingPayload,
    LeaveMeetingPayload, OfferPayload, SignalingMessage, UserJoinedPayload, UserLeftPayload,
};

/// Query parameters for the WebSocket upgrade
#[derive(Debug, Deserialize)]
pub struct WsQueryParams {
    pub token: String,
}

/// WebSocket routes
pub fn ws_routes() -> Router<AppState> {
    Router::new().route("/ws", get(ws_upgrade))
}

/// WebSocket upgrade handler. The bearer token gates the transport;
/// meeting admission happens later, on join-meeting.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(params): Query<WsQueryParams>,
) -> Result<Response, AppError> {
    if !state.credentials.is_valid(&params.token) {
        return Err(AppError::Unauthenticated(
            "Invalid or expired token".to_string(),
        ));
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state)))
}

/// Per-connection session: which meeting (if any) this socket is bound
/// to, plus the channel the send task drains.
pub struct WsSession {
    pub connection_id: String,
    pub meeting_id: Option<String>,
    pub tx: mpsc::UnboundedSender<SignalingMessage>,
}

impl WsSession {
    pub fn new(tx: mpsc::UnboundedSender<SignalingMessage>) -> Self {
        Self {
            connection_id: Uuid::new_v4().to_string(),
            meeting_id: None,
            tx,
        }
    }

    fn send(&self, msg: SignalingMessage) {
        let _ = self.tx.send(msg);
    }
}

/// Handle one WebSocket connection for its whole lifetime.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::unbounded_channel::<SignalingMessage>();
    let mut session = WsSession::new(tx);
    let connection_id = session.connection_id.clone();

    tracing::info!(connection_id = %connection_id, "WebSocket connected");

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Task draining the outbound channel into the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Ok(json) = serde_json::to_string(&msg) {
                if ws_sender.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        match result {
            Ok(Message::Text(text)) => {
                // A bad message never takes the connection down; the
                // relay favors availability over strictness.
                if let Err(e) = handle_message(&text, &mut session, &state) {
                    tracing::warn!(
                        connection_id = %session.connection_id,
                        error = %e,
                        "Dropping malformed signaling message"
                    );
                    session.send(SignalingMessage::error(&e.to_string()));
                }
            }
            Ok(Message::Ping(_)) => {
                // The transport answers pings itself; nothing to do here.
                tracing::trace!(connection_id = %session.connection_id, "Ping received");
            }
            Ok(Message::Close(_)) => {
                tracing::info!(connection_id = %session.connection_id, "WebSocket close received");
                break;
            }
            Err(e) => {
                tracing::warn!(connection_id = %session.connection_id, error = %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    tracing::info!(connection_id = %session.connection_id, "WebSocket disconnected, cleaning up");
    handle_disconnect(&mut session, &state, None);

    send_task.abort();
}

/// Dispatch one incoming signaling message.
pub fn handle_message(
    text: &str,
    session: &mut WsSession,
    state: &AppState,
) -> crate::Result<()> {
    let msg: SignalingMessage = serde_json::from_str(text)?;

    tracing::debug!(
        msg_type = %msg.msg_type,
        connection_id = %session.connection_id,
        "Received message"
    );

    match msg.msg_type.as_str() {
        msg_types::JOIN_MEETING => handle_join(msg.payload, session, state)?,
        msg_types::OFFER => {
            let payload: OfferPayload = serde_json::from_value(msg.payload)?;
            forward_directed(
                msg_types::OFFER,
                &payload.target_connection_id,
                serde_json::json!({
                    "offer": payload.offer,
                    "connection_id": session.connection_id,
                }),
                session,
                state,
            );
        }
        msg_types::ANSWER => {
            let payload: AnswerPayload = serde_json::from_value(msg.payload)?;
            forward_directed(
                msg_types::ANSWER,
                &payload.target_connection_id,
                serde_json::json!({
                    "answer": payload.answer,
                    "connection_id": session.connection_id,
                }),
                session,
                state,
            );
        }
        msg_types::ICE_CANDIDATE => {
            let payload: IceCandidatePayload = serde_json::from_value(msg.payload)?;
            forward_directed(
                msg_types::ICE_CANDIDATE,
                &payload.target_connection_id,
                serde_json::json!({
                    "candidate": payload.candidate,
                    "connection_id": session.connection_id,
                }),
                session,
                state,
            );
        }
        msg_types::LEAVE_MEETING => {
            let payload: LeaveMeetingPayload = serde_json::from_value(msg.payload)?;
            handle_disconnect(session, state, Some(payload.meeting_id));
        }
        other => {
            tracing::warn!(msg_type = %other, "Unknown message type");
            session.send(SignalingMessage::error("Unknown message type"));
        }
    }

    Ok(())
}

/// join-meeting: admit the connection into a meeting.
///
/// The membership snapshot is taken before this connection is added,
/// so the participants-list reply never contains the joiner itself.
pub fn handle_join(
    payload: serde_json::Value,
    session: &mut WsSession,
    state: &AppState,
) -> crate::Result<()> {
    let join: JoinMeetingPayload = serde_json::from_value(payload)?;

    if state.meetings.get(&join.meeting_id).is_none() {
        session.send(SignalingMessage::error("Meeting not found"));
        return Ok(());
    }

    // A connection belongs to at most one meeting. A second join
    // rebinds it: run the full leave path for the current meeting
    // before admitting, so no stale membership or handle survives.
    handle_disconnect(session, state, None);

    let snapshot = state.meetings.list_participants(&join.meeting_id);

    state
        .meetings
        .add_participant(&join.meeting_id, &session.connection_id, &join.participant_id);

    let group = state.connections.get_or_create_meeting(&join.meeting_id);
    group.add_client(ClientHandle::new(
        session.connection_id.clone(),
        join.participant_id.clone(),
        session.tx.clone(),
    ));
    session.meeting_id = Some(join.meeting_id.clone());

    group.broadcast(
        SignalingMessage::new(
            msg_types::USER_JOINED,
            serde_json::to_value(UserJoinedPayload {
                participant_id: join.participant_id.clone(),
                connection_id: session.connection_id.clone(),
            })?,
        ),
        Some(&session.connection_id),
    );

    session.send(SignalingMessage::new(
        msg_types::PARTICIPANTS_LIST,
        serde_json::to_value(snapshot)?,
    ));

    tracing::info!(
        meeting_id = %join.meeting_id,
        connection_id = %session.connection_id,
        participant_id = %join.participant_id,
        "Connection joined meeting"
    );

    Ok(())
}

/// Forward a negotiation message to exactly one target connection in
/// the sender's meeting, re-tagged with the sender's connection id.
/// Unroutable messages are logged and dropped.
fn forward_directed(
    msg_type: &str,
    target_connection_id: &str,
    payload: serde_json::Value,
    session: &WsSession,
    state: &AppState,
) {
    let Some(meeting_id) = &session.meeting_id else {
        tracing::warn!(
            connection_id = %session.connection_id,
            msg_type = %msg_type,
            "Signaling message before join, dropped"
        );
        return;
    };

    let delivered = state
        .connections
        .get_meeting(meeting_id)
        .map(|group| group.send_to(target_connection_id, SignalingMessage::new(msg_type, payload)))
        .unwrap_or(false);

    if !delivered {
        tracing::warn!(
            meeting_id = %meeting_id,
            target = %target_connection_id,
            msg_type = %msg_type,
            "Target connection not in meeting, dropped"
        );
    }
}

/// Shared path for leave-meeting and transport-level disconnect.
/// Idempotent: a connection that never joined (or already left)
/// produces no broadcast and no error.
pub fn handle_disconnect(session: &mut WsSession, state: &AppState, explicit: Option<String>) {
    let bound = session
        .meeting_id
        .clone()
        .or_else(|| state.meetings.find_meeting_of(&session.connection_id));

    // An explicit leave-meeting only acts on the meeting the
    // connection is actually in; naming any other meeting is ignored
    // and leaves the real membership (and signaling) untouched.
    let meeting_id = match (explicit, bound) {
        (Some(named), Some(bound)) if named != bound => {
            tracing::warn!(
                connection_id = %session.connection_id,
                named = %named,
                "leave-meeting for a meeting the connection is not in, ignored"
            );
            return;
        }
        (_, Some(bound)) => bound,
        (Some(_), None) | (None, None) => return,
    };

    if state
        .connections
        .remove_client_from_meeting(&meeting_id, &session.connection_id)
        .is_none()
    {
        // Already gone; nothing to announce.
        session.meeting_id = None;
        return;
    }

    crate::meetings::remove_participant(&state.meetings, &meeting_id, &session.connection_id);

    state.connections.broadcast_to_meeting(
        &meeting_id,
        SignalingMessage::new(
            msg_types::USER_LEFT,
            serde_json::json!(UserLeftPayload {
                connection_id: session.connection_id.clone(),
            }),
        ),
        None,
    );

    session.meeting_id = None;

    tracing::info!(
        meeting_id = %meeting_id,
        connection_id = %session.connection_id,
        "Connection left meeting"
    );
}
