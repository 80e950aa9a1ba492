//! Client-side full-mesh orchestration.
//!
//! A meeting client keeps one [`PeerLink`] per remote participant and
//! drives it from the relay's event stream. The actual WebRTC engine
//! sits behind [`MediaNegotiator`], so this module carries only the
//! protocol rules: who offers, who answers, and what to send back.
//!
//! With N participants each client holds N-1 links; there is no
//! central media relay, which is the accepted scale boundary of the
//! full-mesh design.

mod peer_link;

use std::collections::HashMap;

use crate::meetings::ParticipantEntry;

pub use peer_link::{LinkRole, LinkState, PeerLink};

#[derive(Debug, thiserror::Error)]
pub enum NegotiationError {
    #[error("media engine error: {0}")]
    Engine(String),
}

/// Seam to the actual WebRTC engine. One negotiator per peer link.
pub trait MediaNegotiator {
    /// Produce a local session description to open negotiation.
    fn create_offer(&mut self) -> Result<String, NegotiationError>;
    /// Apply a remote offer and produce the answering description.
    fn accept_offer(&mut self, offer: &str) -> Result<String, NegotiationError>;
    /// Apply the remote answer to our outstanding offer.
    fn accept_answer(&mut self, answer: &str) -> Result<(), NegotiationError>;
    /// Apply a remote ICE candidate.
    fn add_remote_candidate(&mut self, candidate: &str) -> Result<(), NegotiationError>;
    /// Release engine resources for this link.
    fn close(&mut self);
}

/// Relay events as seen by a client, after payload decoding.
#[derive(Debug, Clone)]
pub enum SignalEvent {
    /// Membership as it existed before we joined; we answer these peers.
    ParticipantsList(Vec<ParticipantEntry>),
    /// A peer joined after us; we initiate toward them.
    UserJoined {
        participant_id: String,
        connection_id: String,
    },
    Offer {
        connection_id: String,
        offer: String,
    },
    Answer {
        connection_id: String,
        answer: String,
    },
    IceCandidate {
        connection_id: String,
        candidate: String,
    },
    UserLeft {
        connection_id: String,
    },
}

/// Messages the client must send through the relay in response.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundSignal {
    Offer {
        target_connection_id: String,
        offer: String,
    },
    Answer {
        target_connection_id: String,
        answer: String,
    },
    IceCandidate {
        target_connection_id: String,
        candidate: String,
    },
}

/// Orchestrates every peer link for one local meeting session.
pub struct MeshSession<N, F>
where
    N: MediaNegotiator,
    F: FnMut() -> N,
{
    links: HashMap<String, PeerLink<N>>, // remote connection_id -> link
    new_negotiator: F,
}

impl<N, F> MeshSession<N, F>
where
    N: MediaNegotiator,
    F: FnMut() -> N,
{
    pub fn new(new_negotiator: F) -> Self {
        Self {
            links: HashMap::new(),
            new_negotiator,
        }
    }

    /// Feed one relay event through the mesh; returns the signaling
    /// messages to send back through the relay.
    ///
    /// Out-of-order or unknown-peer messages are dropped, never fatal:
    /// one bad message must not disturb the other links.
    pub fn handle_event(&mut self, event: SignalEvent) -> Vec<OutboundSignal> {
        match event {
            SignalEvent::ParticipantsList(existing) => {
                // Everyone already present will offer to us; we wait.
                for entry in existing {
                    self.add_link(entry.connection_id, entry.participant_id, LinkRole::Answerer);
                }
                Vec::new()
            }
            SignalEvent::UserJoined {
                participant_id,
                connection_id,
            } => {
                self.add_link(connection_id.clone(), participant_id, LinkRole::Initiator);
                let Some(link) = self.links.get_mut(&connection_id) else {
                    return Vec::new();
                };
                // A replayed announcement for a peer already mid-handshake
                // must not restart negotiation.
                if link.state() != LinkState::Idle {
                    return Vec::new();
                }
                match link.start_offer() {
                    Ok(offer) => vec![OutboundSignal::Offer {
                        target_connection_id: connection_id,
                        offer,
                    }],
                    Err(e) => {
                        tracing::warn!(remote = %connection_id, error = %e, "Offer creation failed");
                        Vec::new()
                    }
                }
            }
            SignalEvent::Offer {
                connection_id,
                offer,
            } => {
                let Some(link) = self.links.get_mut(&connection_id) else {
                    tracing::debug!(remote = %connection_id, "Offer for unknown peer, dropped");
                    return Vec::new();
                };
                match link.accept_offer(&offer) {
                    Ok(Some(answer)) => vec![OutboundSignal::Answer {
                        target_connection_id: connection_id,
                        answer,
                    }],
                    Ok(None) => Vec::new(),
                    Err(e) => {
                        tracing::warn!(remote = %connection_id, error = %e, "Offer rejected");
                        Vec::new()
                    }
                }
            }
            SignalEvent::Answer {
                connection_id,
                answer,
            } => {
                let Some(link) = self.links.get_mut(&connection_id) else {
                    tracing::debug!(remote = %connection_id, "Answer for unknown peer, dropped");
                    return Vec::new();
                };
                if let Err(e) = link.accept_answer(&answer) {
                    tracing::warn!(remote = %connection_id, error = %e, "Answer rejected");
                }
                Vec::new()
            }
            SignalEvent::IceCandidate {
                connection_id,
                candidate,
            } => {
                // Candidates arriving before the link exists are a
                // benign drop; tolerate out-of-order delivery.
                let Some(link) = self.links.get_mut(&connection_id) else {
                    tracing::debug!(remote = %connection_id, "Candidate before link, dropped");
                    return Vec::new();
                };
                if let Err(e) = link.add_remote_candidate(&candidate) {
                    tracing::warn!(remote = %connection_id, error = %e, "Candidate rejected");
                }
                Vec::new()
            }
            SignalEvent::UserLeft { connection_id } => {
                if let Some(mut link) = self.links.remove(&connection_id) {
                    link.close();
                }
                Vec::new()
            }
        }
    }

    /// The transport confirmed a usable media path to this peer.
    pub fn media_established(&mut self, connection_id: &str) {
        if let Some(link) = self.links.get_mut(connection_id) {
            link.mark_connected();
        }
    }

    /// Emit a local ICE candidate toward one peer.
    pub fn local_candidate(&self, connection_id: &str, candidate: String) -> Option<OutboundSignal> {
        self.links
            .get(connection_id)
            .map(|_| OutboundSignal::IceCandidate {
                target_connection_id: connection_id.to_string(),
                candidate,
            })
    }

    pub fn link_state(&self, connection_id: &str) -> Option<LinkState> {
        self.links.get(connection_id).map(|link| link.state())
    }

    /// Remote participants with a live link, for display purposes.
    pub fn participants(&self) -> Vec<ParticipantEntry> {
        self.links
            .values()
            .map(|link| ParticipantEntry {
                connection_id: link.remote_connection_id.clone(),
                participant_id: link.remote_participant_id.clone(),
            })
            .collect()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    /// Local session teardown: discard every link.
    pub fn close_all(&mut self) {
        for (_, mut link) in self.links.drain() {
            link.close();
        }
    }

    fn add_link(&mut self, connection_id: String, participant_id: String, role: LinkRole) {
        // A duplicate announcement for a known peer keeps the original
        // link; replacing it would orphan an in-flight negotiation.
        if self.links.contains_key(&connection_id) {
            tracing::debug!(remote = %connection_id, "Duplicate peer announcement ignored");
            return;
        }
        let negotiator = (self.new_negotiator)();
        self.links.insert(
            connection_id.clone(),
            PeerLink::new(connection_id, participant_id, role, negotiator),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Scripted engine: offers/answers are readable tags.
    struct MockNegotiator {
        applied_offers: Vec<String>,
        applied_answers: Vec<String>,
        candidates: Vec<String>,
        closed: bool,
    }

    impl MockNegotiator {
        fn new() -> Self {
            Self {
                applied_offers: Vec::new(),
                applied_answers: Vec::new(),
                candidates: Vec::new(),
                closed: false,
            }
        }
    }

    impl MediaNegotiator for MockNegotiator {
        fn create_offer(&mut self) -> Result<String, NegotiationError> {
            Ok("local-offer".to_string())
        }
        fn accept_offer(&mut self, offer: &str) -> Result<String, NegotiationError> {
            self.applied_offers.push(offer.to_string());
            Ok(format!("answer-to:{offer}"))
        }
        fn accept_answer(&mut self, answer: &str) -> Result<(), NegotiationError> {
            self.applied_answers.push(answer.to_string());
            Ok(())
        }
        fn add_remote_candidate(&mut self, candidate: &str) -> Result<(), NegotiationError> {
            self.candidates.push(candidate.to_string());
            Ok(())
        }
        fn close(&mut self) {
            self.closed = true;
        }
    }

    fn mesh() -> MeshSession<MockNegotiator, fn() -> MockNegotiator> {
        MeshSession::new(MockNegotiator::new as fn() -> MockNegotiator)
    }

    fn entry(conn: &str, user: &str) -> ParticipantEntry {
        ParticipantEntry {
            connection_id: conn.to_string(),
            participant_id: user.to_string(),
        }
    }

    #[test]
    fn test_existing_members_become_answerers() {
        let mut mesh = mesh();
        let out = mesh.handle_event(SignalEvent::ParticipantsList(vec![
            entry("c-1", "alice"),
            entry("c-2", "bob"),
        ]));

        // Answerers send nothing until the offer arrives
        assert!(out.is_empty());
        assert_eq!(mesh.link_count(), 2);
        assert_eq!(mesh.link_state("c-1"), Some(LinkState::Idle));
        assert_eq!(mesh.link_state("c-2"), Some(LinkState::Idle));
    }

    #[test]
    fn test_new_joiner_triggers_offer() {
        let mut mesh = mesh();
        let out = mesh.handle_event(SignalEvent::UserJoined {
            participant_id: "carol".to_string(),
            connection_id: "c-3".to_string(),
        });

        assert_eq!(
            out,
            vec![OutboundSignal::Offer {
                target_connection_id: "c-3".to_string(),
                offer: "local-offer".to_string(),
            }]
        );
        assert_eq!(mesh.link_state("c-3"), Some(LinkState::Negotiating));
    }

    #[test]
    fn test_answerer_full_handshake() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::ParticipantsList(vec![entry("c-1", "alice")]));

        let out = mesh.handle_event(SignalEvent::Offer {
            connection_id: "c-1".to_string(),
            offer: "remote-offer".to_string(),
        });
        assert_eq!(
            out,
            vec![OutboundSignal::Answer {
                target_connection_id: "c-1".to_string(),
                answer: "answer-to:remote-offer".to_string(),
            }]
        );
        assert_eq!(mesh.link_state("c-1"), Some(LinkState::Negotiating));

        mesh.media_established("c-1");
        assert_eq!(mesh.link_state("c-1"), Some(LinkState::Connected));
    }

    #[test]
    fn test_initiator_applies_answer_then_connects() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::UserJoined {
            participant_id: "bob".to_string(),
            connection_id: "c-2".to_string(),
        });

        let out = mesh.handle_event(SignalEvent::Answer {
            connection_id: "c-2".to_string(),
            answer: "remote-answer".to_string(),
        });
        assert!(out.is_empty());
        assert_eq!(mesh.link_state("c-2"), Some(LinkState::Negotiating));

        mesh.media_established("c-2");
        assert_eq!(mesh.link_state("c-2"), Some(LinkState::Connected));
    }

    #[test]
    fn test_candidate_before_link_is_benign() {
        let mut mesh = mesh();
        let out = mesh.handle_event(SignalEvent::IceCandidate {
            connection_id: "c-9".to_string(),
            candidate: "candidate:1".to_string(),
        });
        assert!(out.is_empty());
        assert_eq!(mesh.link_count(), 0);
    }

    #[test]
    fn test_candidate_applies_in_any_live_state() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::ParticipantsList(vec![entry("c-1", "alice")]));

        // Candidate arrives before the offer: still applied
        let out = mesh.handle_event(SignalEvent::IceCandidate {
            connection_id: "c-1".to_string(),
            candidate: "candidate:early".to_string(),
        });
        assert!(out.is_empty());
        assert_eq!(mesh.link_state("c-1"), Some(LinkState::Idle));
    }

    #[test]
    fn test_user_left_closes_and_removes_link() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::UserJoined {
            participant_id: "bob".to_string(),
            connection_id: "c-2".to_string(),
        });
        assert_eq!(mesh.link_count(), 1);

        mesh.handle_event(SignalEvent::UserLeft {
            connection_id: "c-2".to_string(),
        });
        assert_eq!(mesh.link_count(), 0);
        assert_eq!(mesh.link_state("c-2"), None);
        assert!(mesh.participants().is_empty());
    }

    #[test]
    fn test_duplicate_offer_is_ignored() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::ParticipantsList(vec![entry("c-1", "alice")]));
        mesh.handle_event(SignalEvent::Offer {
            connection_id: "c-1".to_string(),
            offer: "first".to_string(),
        });

        let out = mesh.handle_event(SignalEvent::Offer {
            connection_id: "c-1".to_string(),
            offer: "second".to_string(),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_answer_without_link_is_dropped() {
        let mut mesh = mesh();
        let out = mesh.handle_event(SignalEvent::Answer {
            connection_id: "c-9".to_string(),
            answer: "stray".to_string(),
        });
        assert!(out.is_empty());
    }

    #[test]
    fn test_duplicate_announcement_keeps_existing_link() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::UserJoined {
            participant_id: "bob".to_string(),
            connection_id: "c-2".to_string(),
        });
        // Same peer announced again (e.g. replayed event)
        mesh.handle_event(SignalEvent::ParticipantsList(vec![entry("c-2", "bob")]));

        assert_eq!(mesh.link_count(), 1);
        assert_eq!(mesh.link_state("c-2"), Some(LinkState::Negotiating));
    }

    #[test]
    fn test_close_all_tears_down_mesh() {
        let mut mesh = mesh();
        mesh.handle_event(SignalEvent::ParticipantsList(vec![
            entry("c-1", "alice"),
            entry("c-2", "bob"),
        ]));

        mesh.close_all();
        assert_eq!(mesh.link_count(), 0);
    }
}
