//! # Tether Relay
//!
//! Relay fallback support for the Tether connection broker.
//!
//! When direct NAT traversal fails, peer traffic is forwarded through a
//! third-party relay server. The relay does not hold long-lived accounts
//! for players; instead each connection attempt authenticates with a
//! short-lived credential derived from a shared secret and the relay
//! server's own clock.
//!
//! This crate provides:
//! - [`RelayServer`] - the lookup result describing the nearest relay
//! - [`RelayLookup`] - the capability trait for the lookup service
//! - [`derive_credentials`] - the pure, deterministic credential deriver

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod credentials;
pub mod lookup;

pub use credentials::{CREDENTIAL_LIFETIME_SECS, RelayCredential, derive_credentials};
pub use lookup::{RelayError, RelayLookup, RelayServer};
