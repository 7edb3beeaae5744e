//! # Tether Core
//!
//! Connection broker for peer-to-peer multiplayer game sessions.
//!
//! Peers cannot reach each other directly (NAT), so connections are
//! brokered: negotiation messages travel through an external signaling
//! channel, and when direct connectivity fails, traffic falls back to a
//! relay server reachable with short-lived derived credentials. This crate
//! owns the only stateful part of that arrangement:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    Outer transport adapter                    │
//! │        (Send / Disconnect calls, transport event stream)      │
//! ├──────────────────────────────────────────────────────────────┤
//! │                      Connection broker                        │
//! │   identity ⇄ handle aliasing, per-peer lifecycle, fan-out     │
//! ├──────────────┬─────────────────┬─────────────────────────────┤
//! │  Signaling   │  Relay lookup   │   Session directory          │
//! │  channel     │  + credentials  │   (host advertisement)       │
//! └──────────────┴─────────────────┴─────────────────────────────┘
//! ```
//!
//! The broker is a single logical actor: signaling arrivals, relay-lookup
//! completions and outer-layer calls all converge on one serialized state
//! domain, which is what keeps the alias table's bidirectional invariant
//! and the at-most-one-link-per-peer guarantee intact.
//!
//! The actual NAT-traversal negotiation lives behind the [`PeerLink`]
//! capability and is supplied by a collaborator.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod alias;
pub mod broker;
pub mod config;
pub mod error;
pub mod events;
pub mod link;

pub use alias::{AliasTable, ConnectionHandle};
pub use broker::ConnectionBroker;
pub use config::{BrokerConfig, RelayConfig};
pub use error::{BrokerError, Result};
pub use events::{TransportEvent, TransportEventKind};
pub use link::{LinkEvent, LinkPhase, LinkSignal, PeerLink, PeerLinkFactory};
