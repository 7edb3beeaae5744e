//! Peer link capability and lifecycle.
//!
//! A peer link is one NAT-traversal/data-channel session with one remote
//! peer. The negotiation machinery behind it (candidate gathering, channel
//! establishment) is out of scope here; the broker drives links through the
//! [`PeerLink`] trait and observes them through [`LinkSignal`]s.

use std::sync::Arc;
use tokio::sync::mpsc;

/// Lifecycle events a peer link reports to the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    /// The negotiated data channel is open.
    Connected,
    /// The data channel closed cleanly.
    Closed,
    /// Negotiation or the established channel failed. The broker treats
    /// this the same as a close at the transport boundary.
    Failed,
    /// A payload arrived from the peer.
    Data(Vec<u8>),
}

/// A link event tagged with the identity of the peer that raised it.
///
/// Signals carry the peer identity rather than a captured handle: the
/// broker re-resolves the current handle at delivery time, so a signal
/// raised around an entry replacement can never address the wrong
/// connection.
#[derive(Debug, Clone)]
pub struct LinkSignal {
    /// Identity of the peer whose link raised the event.
    pub peer: String,
    /// The event.
    pub event: LinkEvent,
}

impl LinkSignal {
    /// Tag an event with its peer.
    #[must_use]
    pub fn new(peer: impl Into<String>, event: LinkEvent) -> Self {
        Self {
            peer: peer.into(),
            event,
        }
    }
}

/// Broker-side view of a peer link's lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkPhase {
    /// Link object exists, negotiation not yet started.
    Created,
    /// Signaling exchange and, for a dialing client, relay credential
    /// acquisition in progress.
    Negotiating,
    /// Data channel open.
    Connected,
    /// Negotiation or channel failure, awaiting teardown.
    Failed,
    /// Torn down. Terminal.
    Closed,
}

impl LinkPhase {
    /// Check if a phase transition is valid.
    #[must_use]
    pub fn can_transition(self, to: LinkPhase) -> bool {
        matches!(
            (self, to),
            (LinkPhase::Created, LinkPhase::Negotiating | LinkPhase::Closed)
                | (
                    LinkPhase::Negotiating,
                    LinkPhase::Connected | LinkPhase::Failed | LinkPhase::Closed
                )
                | (LinkPhase::Connected, LinkPhase::Closed)
                | (LinkPhase::Failed, LinkPhase::Closed)
        )
    }

    /// Whether this phase is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, LinkPhase::Closed)
    }
}

/// Capability trait for one peer's NAT-traversal/data-channel session.
///
/// Supplied by a collaborator; the broker only orchestrates. All methods
/// are fire-and-forget - outcomes surface later as [`LinkEvent`]s on the
/// signal channel the link was created with.
pub trait PeerLink: Send + Sync {
    /// Feed an inbound signaling payload into the negotiation.
    fn process_signaling_message(&self, raw: &str);

    /// Begin connecting, using the given relay server and credentials as
    /// fallback if direct connectivity cannot be established.
    fn request_connect(&self, host: &str, port: u16, username: &str, password: &str);

    /// Transmit a payload to the peer. Best-effort.
    fn send(&self, payload: &[u8]);

    /// Tear the link down. Safe to call more than once.
    fn close(&self);
}

/// Factory for peer links, supplied alongside the [`PeerLink`] capability.
pub trait PeerLinkFactory: Send + Sync {
    /// Create a link for `peer` that reports its lifecycle through
    /// `events`.
    fn create_link(
        &self,
        peer: &str,
        events: mpsc::UnboundedSender<LinkSignal>,
    ) -> Arc<dyn PeerLink>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_path() {
        assert!(LinkPhase::Created.can_transition(LinkPhase::Negotiating));
        assert!(LinkPhase::Negotiating.can_transition(LinkPhase::Connected));
        assert!(LinkPhase::Connected.can_transition(LinkPhase::Closed));
    }

    #[test]
    fn test_failure_path() {
        assert!(LinkPhase::Negotiating.can_transition(LinkPhase::Failed));
        assert!(LinkPhase::Failed.can_transition(LinkPhase::Closed));
        assert!(!LinkPhase::Failed.can_transition(LinkPhase::Connected));
    }

    #[test]
    fn test_no_reverse_transitions() {
        assert!(!LinkPhase::Connected.can_transition(LinkPhase::Negotiating));
        assert!(!LinkPhase::Closed.can_transition(LinkPhase::Created));
        assert!(!LinkPhase::Closed.can_transition(LinkPhase::Negotiating));
    }

    #[test]
    fn test_terminal() {
        assert!(LinkPhase::Closed.is_terminal());
        assert!(!LinkPhase::Connected.is_terminal());
        assert!(!LinkPhase::Failed.is_terminal());
    }
}
