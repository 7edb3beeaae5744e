//! Error types for the connection broker.
//!
//! The broker's propagation policy is deliberately narrow: configuration
//! problems surface as `false` returns from the initiating call, remote
//! failures become a log line plus (where a connection was in flight) an
//! upward disconnect event, and only channel/collaborator plumbing errors
//! reach callers as `BrokerError`. No failure path leaves the alias table
//! inconsistent.

use std::borrow::Cow;
use tether_directory::DirectoryError;
use tether_relay::RelayError;
use tether_signaling::SignalingError;
use thiserror::Error;

/// Errors that can occur in broker operations
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Signaling channel operation failed.
    #[error("signaling error: {0}")]
    Signaling(#[from] SignalingError),

    /// Relay lookup failed.
    #[error("relay lookup error: {0}")]
    RelayLookup(#[from] RelayError),

    /// Session directory operation failed.
    #[error("session directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Operation not valid in the broker's current state.
    #[error("invalid state: {0}")]
    InvalidState(Cow<'static, str>),

    /// Internal channel send/receive error.
    #[error("channel error: {0}")]
    Channel(Cow<'static, str>),
}

impl BrokerError {
    /// Returns true if this error is transient and the surrounding
    /// operation may succeed if initiated again.
    ///
    /// The broker itself never retries; this classification is for the
    /// caller deciding whether to start a fresh attempt.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BrokerError::Signaling(_)
                | BrokerError::RelayLookup(_)
                | BrokerError::Directory(_)
                | BrokerError::Channel(_)
        )
    }

    /// Create an invalid state error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_state(context: &'static str) -> Self {
        BrokerError::InvalidState(Cow::Borrowed(context))
    }

    /// Create a channel error with static context (zero allocation)
    #[must_use]
    pub const fn channel(context: &'static str) -> Self {
        BrokerError::Channel(Cow::Borrowed(context))
    }
}

/// Result type for broker operations
pub type Result<T> = std::result::Result<T, BrokerError>;
