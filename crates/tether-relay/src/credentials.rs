//! Time-boxed relay credential derivation.
//!
//! Relay servers following the TURN REST API scheme accept ephemeral
//! credentials: the username embeds an expiry timestamp and the password is
//! an HMAC over that username under a secret shared between the relay and
//! the game backend. No credential is ever stored; one is recomputed for
//! every connection attempt.
//!
//! **Note:** HMAC-SHA1 is what the TURN REST credential scheme specifies,
//! and the relay side verifies exactly that construction. SHA-1 is not used
//! here for collision resistance and must not be borrowed from this module
//! for any other purpose.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// How long a derived credential stays valid, in seconds.
pub const CREDENTIAL_LIFETIME_SECS: u64 = 600;

/// An ephemeral relay credential.
///
/// Valid until `expires_at` (seconds, on the **relay server's** clock).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayCredential {
    /// `"{expiry}:{static_username}"` - the relay recovers the expiry by
    /// splitting on the first colon.
    pub username: String,
    /// Standard base64 of `HMAC-SHA1(shared_secret, username)`.
    pub password: String,
    /// Expiry timestamp in seconds on the relay server's clock.
    pub expires_at: u64,
}

impl RelayCredential {
    /// Whether the credential is still valid at the given server time.
    #[must_use]
    pub fn is_valid_at(&self, server_time: u64) -> bool {
        server_time < self.expires_at
    }
}

/// Derive a time-boxed relay credential.
///
/// Pure and deterministic: the same `(server_time, static_username, secret)`
/// always produces the same credential. `server_time` is the relay server's
/// current clock as reported by the lookup service - using the server's own
/// clock keeps the expiry immune to local clock skew.
#[must_use]
pub fn derive_credentials(server_time: u64, static_username: &str, secret: &str) -> RelayCredential {
    let expires_at = server_time + CREDENTIAL_LIFETIME_SECS;
    let username = format!("{expires_at}:{static_username}");

    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(username.as_bytes());
    let password = STANDARD.encode(mac.finalize().into_bytes());

    tracing::debug!("derived relay credential valid until {expires_at}");

    RelayCredential {
        username,
        password,
        expires_at,
    }
}
