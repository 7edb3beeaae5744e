//! # Tether Signaling
//!
//! Signaling channel abstraction for the Tether connection broker.
//!
//! Peers behind NAT cannot talk to each other until a connection has been
//! negotiated out-of-band. The signaling channel is that out-of-band path:
//! an already-authenticated message service that delivers small opaque
//! negotiation payloads between peers identified by stable user IDs.
//!
//! This crate defines:
//! - The [`SignalingMessage`] envelope `(from, payload)` with a byte codec
//! - The [`SignalingChannel`] capability trait the broker consumes
//! - [`SignalingError`]
//!
//! The transport behind the channel (websocket, lobby service, ...) is a
//! collaborator concern and lives outside this workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// A single inbound or outbound signaling envelope.
///
/// `from` is the stable identity of the sending peer, assigned by the
/// signaling/authentication layer. `payload` is an opaque negotiation
/// message; the broker forwards it untouched to the peer link that owns
/// the negotiation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SignalingMessage {
    /// Stable identity of the sending peer.
    pub from: String,
    /// Raw negotiation payload, not interpreted by the broker.
    pub payload: String,
}

impl SignalingMessage {
    /// Create an envelope.
    #[must_use]
    pub fn new(from: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            payload: payload.into(),
        }
    }

    /// Serialize the envelope to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, SignalingError> {
        bincode::serialize(self).map_err(|e| SignalingError::Envelope(e.to_string()))
    }

    /// Deserialize an envelope from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SignalingError> {
        bincode::deserialize(bytes).map_err(|e| SignalingError::Envelope(e.to_string()))
    }
}

/// Signaling channel errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum SignalingError {
    /// Connection to the signaling service failed.
    #[error("connection to signaling service failed: {0}")]
    Connect(String),

    /// The channel was closed by the service or shut down locally.
    #[error("signaling channel closed")]
    Closed,

    /// Envelope could not be encoded or decoded.
    #[error("malformed signaling envelope: {0}")]
    Envelope(String),
}

/// Capability trait for the out-of-band signaling channel.
///
/// Implementations wrap whatever transport the surrounding platform
/// provides. The broker only needs to connect, check liveness, and consume
/// the inbound message stream.
///
/// # Subscription contract
///
/// [`take_inbound`](SignalingChannel::take_inbound) hands out the inbound
/// receiver **exactly once**. Subsequent calls return `None`. This turns
/// "must not subscribe twice" from a runtime discipline into an ownership
/// transfer: a second consumer cannot exist, so a message can never be
/// delivered to two pumps.
#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Establish the connection to the signaling service.
    ///
    /// Idempotent: connecting an already-connected channel is a no-op.
    async fn connect(&self) -> Result<(), SignalingError>;

    /// Whether the channel currently holds a live connection.
    fn is_connected(&self) -> bool;

    /// Start inbound dispatch.
    ///
    /// Called after the subscriber is wired so no message races the
    /// handoff of the inbound receiver.
    fn init(&self);

    /// Take ownership of the inbound message stream.
    ///
    /// Returns `Some` on the first call and `None` afterwards.
    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<SignalingMessage>>;
}
