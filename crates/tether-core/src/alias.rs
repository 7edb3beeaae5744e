//! Bidirectional peer-identity / connection-handle aliasing.
//!
//! The outer transport layer addresses peers by a numeric handle; the
//! signaling protocol addresses them by their stable identity string. The
//! alias table is the authoritative mapping between the two, plus the link
//! object each pair owns. Both directions live behind one `&mut self`
//! surface so they can never drift apart; serialization across tasks is
//! provided by the broker's state lock, not by this type.

use crate::link::{LinkPhase, PeerLink};
use std::collections::HashMap;
use std::sync::Arc;

/// Transport-local opaque reference to one peer's connection.
///
/// Generated here, unique per peer identity for the lifetime of the table,
/// and meaningless outside this process. Values are drawn from a CSPRNG so
/// they are effectively unguessable, but a handle is a local index, not a
/// credential.
pub type ConnectionHandle = u64;

struct AliasEntry {
    handle: ConnectionHandle,
    link: Arc<dyn PeerLink>,
    phase: LinkPhase,
}

/// The authoritative map `peer identity ⇄ handle ⇄ link`.
#[derive(Default)]
pub struct AliasTable {
    entries: HashMap<String, AliasEntry>,
    // Derived index, maintained in step with `entries` by every mutation.
    handles: HashMap<ConnectionHandle, String>,
}

impl AliasTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a link for `peer` and return the peer's handle.
    ///
    /// Idempotent on the identity: re-registering an already-known peer
    /// replaces its link (and resets its phase), but preserves the handle.
    /// A peer therefore has exactly one handle for as long as its entry
    /// lives.
    pub fn register(&mut self, peer: &str, link: Arc<dyn PeerLink>) -> ConnectionHandle {
        if let Some(entry) = self.entries.get_mut(peer) {
            entry.link = link;
            entry.phase = LinkPhase::Created;
            return entry.handle;
        }

        let handle = self.fresh_handle();
        self.entries.insert(
            peer.to_string(),
            AliasEntry {
                handle,
                link,
                phase: LinkPhase::Created,
            },
        );
        self.handles.insert(handle, peer.to_string());
        handle
    }

    fn fresh_handle(&self) -> ConnectionHandle {
        // A collision in 64 random bits is astronomically unlikely, but a
        // duplicate handle would alias two peers, so loop anyway.
        loop {
            let handle = rand::random::<ConnectionHandle>();
            if !self.handles.contains_key(&handle) {
                return handle;
            }
        }
    }

    /// Look up the link registered for a peer identity.
    #[must_use]
    pub fn link_by_peer(&self, peer: &str) -> Option<Arc<dyn PeerLink>> {
        self.entries.get(peer).map(|entry| Arc::clone(&entry.link))
    }

    /// Look up the link a handle addresses.
    #[must_use]
    pub fn link_by_handle(&self, handle: ConnectionHandle) -> Option<Arc<dyn PeerLink>> {
        self.handles
            .get(&handle)
            .and_then(|peer| self.link_by_peer(peer))
    }

    /// Resolve a peer identity to its handle.
    #[must_use]
    pub fn handle_of(&self, peer: &str) -> Option<ConnectionHandle> {
        self.entries.get(peer).map(|entry| entry.handle)
    }

    /// Resolve a handle to its peer identity.
    #[must_use]
    pub fn peer_of(&self, handle: ConnectionHandle) -> Option<&str> {
        self.handles.get(&handle).map(String::as_str)
    }

    /// Whether a peer identity is registered.
    #[must_use]
    pub fn contains_peer(&self, peer: &str) -> bool {
        self.entries.contains_key(peer)
    }

    /// Whether a handle is live.
    #[must_use]
    pub fn contains_handle(&self, handle: ConnectionHandle) -> bool {
        self.handles.contains_key(&handle)
    }

    /// Current lifecycle phase of a peer's link.
    #[must_use]
    pub fn phase_of(&self, peer: &str) -> Option<LinkPhase> {
        self.entries.get(peer).map(|entry| entry.phase)
    }

    /// Advance a peer's lifecycle phase.
    ///
    /// Returns `false` (leaving the phase unchanged) if the peer is
    /// unknown or the transition is invalid.
    pub fn set_phase(&mut self, peer: &str, phase: LinkPhase) -> bool {
        match self.entries.get_mut(peer) {
            Some(entry) if entry.phase.can_transition(phase) => {
                entry.phase = phase;
                true
            }
            _ => false,
        }
    }

    /// Remove the entry a handle addresses, returning the peer identity
    /// and its link.
    ///
    /// Both directions go atomically; there is no observable half-removed
    /// state. No-op (returns `None`) for an unknown handle.
    pub fn remove(&mut self, handle: ConnectionHandle) -> Option<(String, Arc<dyn PeerLink>)> {
        let peer = self.handles.remove(&handle)?;
        let entry = self.entries.remove(&peer)?;
        Some((peer, entry.link))
    }

    /// Snapshot of all registered peer identities.
    #[must_use]
    pub fn peers(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    /// Snapshot of all live handles.
    #[must_use]
    pub fn handles(&self) -> Vec<ConnectionHandle> {
        self.handles.keys().copied().collect()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Clear the table, returning every link for teardown.
    pub fn drain(&mut self) -> Vec<Arc<dyn PeerLink>> {
        self.handles.clear();
        self.entries
            .drain()
            .map(|(_, entry)| entry.link)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubLink;

    impl PeerLink for StubLink {
        fn process_signaling_message(&self, _raw: &str) {}
        fn request_connect(&self, _host: &str, _port: u16, _username: &str, _password: &str) {}
        fn send(&self, _payload: &[u8]) {}
        fn close(&self) {}
    }

    fn stub() -> Arc<dyn PeerLink> {
        Arc::new(StubLink)
    }

    #[test]
    fn test_register_assigns_one_handle_per_peer() {
        let mut table = AliasTable::new();
        let first = table.register("peer-a", stub());
        let second = table.register("peer-a", stub());
        assert_eq!(first, second);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_register_replaces_link_keeps_handle() {
        let mut table = AliasTable::new();
        let old: Arc<dyn PeerLink> = Arc::new(StubLink);
        let new: Arc<dyn PeerLink> = Arc::new(StubLink);

        let handle = table.register("peer-a", Arc::clone(&old));
        table.set_phase("peer-a", LinkPhase::Negotiating);
        let handle_again = table.register("peer-a", Arc::clone(&new));

        assert_eq!(handle, handle_again);
        let current = table.link_by_peer("peer-a").unwrap();
        assert!(Arc::ptr_eq(&current, &new));
        assert!(!Arc::ptr_eq(&current, &old));
        // A fresh link starts its lifecycle over.
        assert_eq!(table.phase_of("peer-a"), Some(LinkPhase::Created));
    }

    #[test]
    fn test_bidirectional_resolution() {
        let mut table = AliasTable::new();
        let handle = table.register("peer-a", stub());

        assert_eq!(table.handle_of("peer-a"), Some(handle));
        assert_eq!(table.peer_of(handle), Some("peer-a"));
        assert!(table.link_by_handle(handle).is_some());
        assert!(table.contains_peer("peer-a"));
        assert!(table.contains_handle(handle));
    }

    #[test]
    fn test_distinct_peers_distinct_handles() {
        let mut table = AliasTable::new();
        let a = table.register("peer-a", stub());
        let b = table.register("peer-b", stub());
        assert_ne!(a, b);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_remove_clears_both_directions() {
        let mut table = AliasTable::new();
        let handle = table.register("peer-a", stub());

        let (peer, _link) = table.remove(handle).unwrap();
        assert_eq!(peer, "peer-a");
        assert_eq!(table.handle_of("peer-a"), None);
        assert_eq!(table.peer_of(handle), None);
        assert!(table.link_by_handle(handle).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_remove_unknown_handle_is_noop() {
        let mut table = AliasTable::new();
        table.register("peer-a", stub());
        assert!(table.remove(0xDEAD_BEEF).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_snapshots() {
        let mut table = AliasTable::new();
        let a = table.register("peer-a", stub());
        let b = table.register("peer-b", stub());

        let mut peers = table.peers();
        peers.sort();
        assert_eq!(peers, vec!["peer-a".to_string(), "peer-b".to_string()]);

        let mut handles = table.handles();
        handles.sort_unstable();
        let mut expected = vec![a, b];
        expected.sort_unstable();
        assert_eq!(handles, expected);
    }

    #[test]
    fn test_phase_transitions_validated() {
        let mut table = AliasTable::new();
        table.register("peer-a", stub());

        assert!(table.set_phase("peer-a", LinkPhase::Negotiating));
        assert!(table.set_phase("peer-a", LinkPhase::Connected));
        // Cannot go back to negotiating once connected.
        assert!(!table.set_phase("peer-a", LinkPhase::Negotiating));
        assert_eq!(table.phase_of("peer-a"), Some(LinkPhase::Connected));
        assert!(!table.set_phase("peer-unknown", LinkPhase::Closed));
    }

    #[test]
    fn test_drain_returns_all_links() {
        let mut table = AliasTable::new();
        table.register("peer-a", stub());
        table.register("peer-b", stub());
        table.register("peer-c", stub());

        let links = table.drain();
        assert_eq!(links.len(), 3);
        assert!(table.is_empty());
        assert!(table.handles().is_empty());
    }
}
