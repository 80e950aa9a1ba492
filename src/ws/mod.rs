pub mod handler;
pub mod messages;
pub mod session;

pub use handler::ws_routes;
pub use messages::{
    msg_types, AnswerPayload, IceCandidatePayload, JoinMeetingPayload, LeaveMeetingPayload,
    OfferPayload, SignalingMessage, UserJoinedPayload, UserLeftPayload,
};
pub use session::{ClientHandle, ConnectionsManager, MeetingConnections};
