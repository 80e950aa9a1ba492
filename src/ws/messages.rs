use serde::{Deserialize, Serialize};

/// Wrapper for all signaling messages, both directions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl SignalingMessage {
    pub fn new(msg_type: &str, payload: serde_json::Value) -> Self {
        Self {
            msg_type: msg_type.to_string(),
            payload,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            msg_type: msg_types::ERROR.to_string(),
            payload: serde_json::json!({ "message": message }),
        }
    }
}

// ==================== Client -> Server ====================

/// join-meeting payload
#[derive(Debug, Clone, Deserialize)]
pub struct JoinMeetingPayload {
    pub meeting_id: String,
    pub participant_id: String,
}

/// offer payload; `offer` is an opaque session description, forwarded
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OfferPayload {
    pub offer: serde_json::Value,
    pub target_connection_id: String,
}

/// answer payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerPayload {
    pub answer: serde_json::Value,
    pub target_connection_id: String,
}

/// ice-candidate payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IceCandidatePayload {
    pub candidate: serde_json::Value,
    pub target_connection_id: String,
}

/// leave-meeting payload
#[derive(Debug, Clone, Deserialize)]
pub struct LeaveMeetingPayload {
    pub meeting_id: String,
}

// ==================== Server -> Client ====================

/// user-joined event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJoinedPayload {
    pub participant_id: String,
    pub connection_id: String,
}

/// user-left event payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserLeftPayload {
    pub connection_id: String,
}

/// Message types for dispatch
pub mod msg_types {
    // Client -> Server
    pub const JOIN_MEETING: &str = "join-meeting";
    pub const OFFER: &str = "offer";
    pub const ANSWER: &str = "answer";
    pub const ICE_CANDIDATE: &str = "ice-candidate";
    pub const LEAVE_MEETING: &str = "leave-meeting";

    // Server -> Client
    pub const PARTICIPANTS_LIST: &str = "participants-list";
    pub const USER_JOINED: &str = "user-joined";
    pub const USER_LEFT: &str = "user-left";
    pub const ERROR: &str = "error";
}
