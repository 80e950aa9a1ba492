use crate::mesh::{MediaNegotiator, NegotiationError};

/// Lifecycle of one direct peer connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link exists but negotiation has not started. An answerer waits
    /// here until the remote side's offer arrives.
    Idle,
    /// Offer/answer exchange in flight.
    Negotiating,
    /// Transport confirmed a usable media path.
    Connected,
    /// Terminal; the link's resources are released.
    Closed,
}

/// Which side starts the offer/answer exchange. Exactly one initiator
/// exists per pairwise link: the party that learned about the peer via
/// user-joined initiates, the pre-existing party answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Initiator,
    Answerer,
}

/// Local state machine for the media connection to one specific remote
/// participant.
pub struct PeerLink<N: MediaNegotiator> {
    pub remote_connection_id: String,
    pub remote_participant_id: String,
    pub role: LinkRole,
    state: LinkState,
    negotiator: N,
}

impl<N: MediaNegotiator> PeerLink<N> {
    pub fn new(
        remote_connection_id: String,
        remote_participant_id: String,
        role: LinkRole,
        negotiator: N,
    ) -> Self {
        Self {
            remote_connection_id,
            remote_participant_id,
            role,
            state: LinkState::Idle,
            negotiator,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Initiator path: produce the opening offer.
    pub fn start_offer(&mut self) -> Result<String, NegotiationError> {
        let offer = self.negotiator.create_offer()?;
        self.state = LinkState::Negotiating;
        Ok(offer)
    }

    /// Answerer path: apply a remote offer, produce the answer.
    /// Only legal from Idle; a duplicate offer is a protocol slip we
    /// tolerate by ignoring it.
    pub fn accept_offer(&mut self, offer: &str) -> Result<Option<String>, NegotiationError> {
        if self.state != LinkState::Idle {
            tracing::warn!(
                remote = %self.remote_connection_id,
                state = ?self.state,
                "Offer in unexpected state, ignored"
            );
            return Ok(None);
        }
        let answer = self.negotiator.accept_offer(offer)?;
        self.state = LinkState::Negotiating;
        Ok(Some(answer))
    }

    /// Initiator path: apply the remote answer. Ignored unless we are
    /// mid-negotiation.
    pub fn accept_answer(&mut self, answer: &str) -> Result<(), NegotiationError> {
        if self.state != LinkState::Negotiating {
            tracing::warn!(
                remote = %self.remote_connection_id,
                state = ?self.state,
                "Answer in unexpected state, ignored"
            );
            return Ok(());
        }
        self.negotiator.accept_answer(answer)
    }

    /// ICE candidates apply in any live state; ordering relative to the
    /// offer/answer exchange is not guaranteed.
    pub fn add_remote_candidate(&mut self, candidate: &str) -> Result<(), NegotiationError> {
        if self.state == LinkState::Closed {
            return Ok(());
        }
        self.negotiator.add_remote_candidate(candidate)
    }

    /// Transport confirmed a usable media path.
    pub fn mark_connected(&mut self) {
        if self.state != LinkState::Closed {
            self.state = LinkState::Connected;
        }
    }

    /// Terminal teardown. Closing mid-negotiation simply discards the
    /// link; there is no rollback protocol.
    pub fn close(&mut self) {
        self.negotiator.close();
        self.state = LinkState::Closed;
    }
}
