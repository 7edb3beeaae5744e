//! Relay server lookup capability.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Description of a relay server returned by the lookup service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelayServer {
    /// Relay host address (IP or hostname).
    pub ip: String,
    /// Relay port.
    pub port: u16,
    /// The relay server's current clock, seconds since the epoch.
    ///
    /// Credential expiry is computed against this value, not the local
    /// clock, so a skewed local clock cannot produce already-expired or
    /// not-yet-valid credentials.
    pub current_time: u64,
}

/// Relay lookup errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum RelayError {
    /// The lookup request itself failed.
    #[error("relay lookup failed: {0}")]
    Lookup(String),

    /// The service answered but had no relay to offer.
    #[error("no relay server available")]
    NoServerAvailable,

    /// The lookup did not complete in time.
    #[error("relay lookup timed out")]
    Timeout,
}

/// Capability trait for the relay lookup service.
///
/// The broker asks for the nearest relay once per fallback attempt. A
/// failed lookup aborts that attempt; the broker never retries on its own.
#[async_trait]
pub trait RelayLookup: Send + Sync {
    /// Resolve the relay server closest to this client.
    async fn nearest_server(&self) -> Result<RelayServer, RelayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_roundtrip() {
        let server = RelayServer {
            ip: "203.0.113.7".to_string(),
            port: 3478,
            current_time: 1_700_000_000,
        };
        let json = serde_json::to_string(&server).unwrap();
        let back: RelayServer = serde_json::from_str(&json).unwrap();
        assert_eq!(back, server);
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RelayError::NoServerAvailable.to_string(),
            "no relay server available"
        );
        assert!(
            RelayError::Lookup("dns failure".to_string())
                .to_string()
                .contains("dns failure")
        );
    }
}
