//! Events republished to the outer transport layer.

use crate::alias::ConnectionHandle;
use std::time::Instant;

/// What happened on a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    /// The peer's data channel is open; the handle is usable for sends.
    Connected,
    /// The connection is gone - clean close, negotiation failure and
    /// channel error all collapse to this at the transport boundary.
    Disconnected,
    /// A payload arrived from the peer.
    Data(Vec<u8>),
}

/// One event on the broker's upward stream.
///
/// Events for a given handle are delivered in the order the underlying
/// link raised them; there is no ordering guarantee across handles.
#[derive(Debug, Clone)]
pub struct TransportEvent {
    /// The connection the event belongs to.
    pub handle: ConnectionHandle,
    /// When the broker republished the event.
    pub at: Instant,
    /// The event itself.
    pub kind: TransportEventKind,
}

impl TransportEvent {
    /// Stamp an event with the current time.
    #[must_use]
    pub fn now(handle: ConnectionHandle, kind: TransportEventKind) -> Self {
        Self {
            handle,
            at: Instant::now(),
            kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_carries_handle_and_kind() {
        let event = TransportEvent::now(42, TransportEventKind::Data(vec![1, 2, 3]));
        assert_eq!(event.handle, 42);
        assert_eq!(event.kind, TransportEventKind::Data(vec![1, 2, 3]));
    }

    #[test]
    fn test_kinds_distinguishable() {
        assert_ne!(TransportEventKind::Connected, TransportEventKind::Disconnected);
        assert_ne!(
            TransportEventKind::Data(vec![]),
            TransportEventKind::Disconnected
        );
    }
}
