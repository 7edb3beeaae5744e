//! Broker configuration.

use tether_directory::SessionCreateRequest;

/// Connection broker configuration
#[derive(Debug, Clone, Default)]
pub struct BrokerConfig {
    /// Relay fallback settings.
    pub relay: RelayConfig,

    /// Session advertisement used when this instance hosts. Can also be
    /// set later through the broker; hosting fails while it is absent.
    pub session_request: Option<SessionCreateRequest>,
}

/// Relay fallback configuration
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Ask the lookup service for the nearest relay and derive time-boxed
    /// credentials from its clock. When disabled, the static fields below
    /// are passed to the link verbatim.
    pub use_lookup: bool,

    /// Static relay host (only used when `use_lookup` is off).
    pub host: String,

    /// Static relay port.
    pub port: u16,

    /// Relay username. With lookup enabled this is the static half of the
    /// derived username; otherwise it is sent as-is.
    pub username: String,

    /// Static relay password (only used when `use_lookup` is off).
    pub password: String,

    /// Shared secret the relay verifies derived credentials against.
    pub secret: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            use_lookup: true,
            host: String::new(),
            port: 3478,
            username: String::new(),
            password: String::new(),
            secret: String::new(),
        }
    }
}

impl RelayConfig {
    /// Whether the static credential set is complete enough to dial
    /// without a lookup.
    #[must_use]
    pub fn has_static_credentials(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty() && !self.password.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_uses_lookup() {
        let config = RelayConfig::default();
        assert!(config.use_lookup);
        assert_eq!(config.port, 3478);
        assert!(!config.has_static_credentials());
    }

    #[test]
    fn test_static_credentials_require_all_fields() {
        let mut config = RelayConfig {
            use_lookup: false,
            host: "relay.example.net".to_string(),
            port: 3478,
            username: "user".to_string(),
            password: "pass".to_string(),
            secret: String::new(),
        };
        assert!(config.has_static_credentials());

        config.password.clear();
        assert!(!config.has_static_credentials());
    }
}
