//! The connection broker.
//!
//! One broker instance orchestrates every peer connection of the local
//! player: it admits peers reactively on first signaling contact, dials
//! the targeted host when acting as a client, advertises the session when
//! acting as a host, and republishes link lifecycle/data events to the
//! outer transport layer under that layer's numeric-handle vocabulary.
//!
//! # Execution model
//!
//! The broker is a single logical actor. Everything that can mutate broker
//! state - inbound signaling, link signals, relay-lookup and directory
//! completions, outer-layer calls - goes through one `Mutex<BrokerState>`.
//! Awaited collaborator calls happen with the lock released; their
//! completions re-acquire it and re-validate that the entry they were
//! working for still exists before acting. A completion for a peer that
//! was disconnected in the meantime is a no-op, never a resurrection.

use crate::alias::{AliasTable, ConnectionHandle};
use crate::config::{BrokerConfig, RelayConfig};
use crate::error::{BrokerError, Result};
use crate::events::{TransportEvent, TransportEventKind};
use crate::link::{LinkEvent, LinkPhase, LinkSignal, PeerLink, PeerLinkFactory};
use std::sync::Arc;
use tether_directory::{SessionCreateRequest, SessionDirectory, SessionRecord};
use tether_relay::{RelayError, RelayLookup, RelayServer, derive_credentials};
use tether_signaling::{SignalingChannel, SignalingMessage};
use tokio::sync::{Mutex, mpsc};

struct BrokerState {
    signaling: Arc<dyn SignalingChannel>,
    relay: Arc<dyn RelayLookup>,
    directory: Arc<dyn SessionDirectory>,
    links: Arc<dyn PeerLinkFactory>,

    table: AliasTable,
    target_host: Option<String>,
    server_handle: Option<ConnectionHandle>,
    hosted_session: Option<SessionRecord>,
    session_request: Option<SessionCreateRequest>,

    // Taken exactly once when the link pump is wired.
    link_rx: Option<mpsc::UnboundedReceiver<LinkSignal>>,
    shut_down: bool,
}

struct Shared {
    relay_config: RelayConfig,
    state: Mutex<BrokerState>,
    events_tx: mpsc::UnboundedSender<TransportEvent>,
    link_tx: mpsc::UnboundedSender<LinkSignal>,
}

/// Brokers peer-to-peer connections for one local player.
///
/// Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct ConnectionBroker {
    shared: Arc<Shared>,
}

impl ConnectionBroker {
    /// Create a broker over the given collaborators.
    ///
    /// Returns the broker and the upward event stream. The stream carries
    /// connect/disconnect/data events in per-handle order; dropping the
    /// receiver silently discards further events.
    #[must_use]
    pub fn new(
        config: BrokerConfig,
        signaling: Arc<dyn SignalingChannel>,
        relay: Arc<dyn RelayLookup>,
        directory: Arc<dyn SessionDirectory>,
        links: Arc<dyn PeerLinkFactory>,
    ) -> (Self, mpsc::UnboundedReceiver<TransportEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (link_tx, link_rx) = mpsc::unbounded_channel();

        let state = BrokerState {
            signaling,
            relay,
            directory,
            links,
            table: AliasTable::new(),
            target_host: None,
            server_handle: None,
            hosted_session: None,
            session_request: config.session_request,
            link_rx: Some(link_rx),
            shut_down: false,
        };

        let broker = Self {
            shared: Arc::new(Shared {
                relay_config: config.relay,
                state: Mutex::new(state),
                events_tx,
                link_tx,
            }),
        };
        (broker, events_rx)
    }

    /// Connect the signaling channel and wire the event pumps.
    ///
    /// Safe to call repeatedly: the inbound subscription is an ownership
    /// transfer that can only succeed once per channel, so repeated calls
    /// can never cause duplicate message delivery.
    ///
    /// # Errors
    ///
    /// Returns an error if the signaling channel cannot connect or the
    /// broker has shut down.
    pub async fn initialize(&self) -> Result<()> {
        let signaling = {
            let state = self.shared.state.lock().await;
            if state.shut_down {
                return Err(BrokerError::invalid_state("broker is shut down"));
            }
            state.signaling.clone()
        };

        if !signaling.is_connected() {
            signaling.connect().await?;
        }

        {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return Err(BrokerError::invalid_state("broker is shut down"));
            }
            if let Some(inbound) = state.signaling.take_inbound() {
                self.spawn_signaling_pump(inbound);
            }
            if let Some(link_rx) = state.link_rx.take() {
                self.spawn_link_pump(link_rx);
            }
        }

        signaling.init();
        Ok(())
    }

    /// Swap the collaborator services and re-run initialization.
    ///
    /// Used when the surrounding platform rebinds its service clients for
    /// a specific session. The link factory is part of the transport
    /// capability and stays fixed.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement signaling channel cannot
    /// connect or the broker has shut down.
    pub async fn rewire(
        &self,
        signaling: Arc<dyn SignalingChannel>,
        relay: Arc<dyn RelayLookup>,
        directory: Arc<dyn SessionDirectory>,
    ) -> Result<()> {
        {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return Err(BrokerError::invalid_state("broker is shut down"));
            }
            state.signaling = signaling;
            state.relay = relay;
            state.directory = directory;
        }
        self.initialize().await
    }

    /// Name the remote peer this instance intends to join.
    ///
    /// Returns `true` exactly once: further calls fail (making no change)
    /// until the target is cleared again by a disconnect of that peer, a
    /// relay-fallback abort, or shutdown. This is the only gate that lets
    /// [`start_as_client`](Self::start_as_client) proceed.
    pub async fn set_target_host(&self, peer: &str) -> bool {
        let mut state = self.shared.state.lock().await;
        if state.shut_down || state.target_host.is_some() {
            return false;
        }
        state.target_host = Some(peer.to_string());
        true
    }

    /// Begin a client-side connection attempt toward the targeted host.
    ///
    /// Returns `false` with no side effects if no target host is set or
    /// the relay configuration cannot support an attempt. Returns `true`
    /// once the attempt is dispatched - completion is reported later as a
    /// [`TransportEventKind::Connected`] (or `Disconnected`) event, not by
    /// this call.
    pub async fn start_as_client(&self) -> bool {
        let (signaling, target) = {
            let state = self.shared.state.lock().await;
            if state.shut_down {
                return false;
            }
            let Some(target) = state.target_host.clone() else {
                tracing::warn!("start_as_client called with no target host set");
                return false;
            };
            (state.signaling.clone(), target)
        };

        let relay_config = &self.shared.relay_config;
        if !relay_config.use_lookup && !relay_config.has_static_credentials() {
            tracing::warn!("cannot join session, relay configuration incomplete");
            return false;
        }

        if !signaling.is_connected() {
            if let Err(e) = signaling.connect().await {
                // Negotiation will fail through the link's own error path;
                // the attempt itself is still dispatched.
                tracing::warn!("signaling connect failed, continuing attempt: {e}");
            }
        }

        let link = {
            let mut state = self.shared.state.lock().await;
            if state.shut_down || state.target_host.as_deref() != Some(target.as_str()) {
                return false;
            }
            let (link, handle) = self.admit_peer(&mut state, &target);
            state.server_handle = Some(handle);
            tracing::info!("dialing host {target} (handle {handle:016x})");
            link
        };

        if relay_config.use_lookup {
            self.spawn_relay_dial(target);
        } else {
            link.request_connect(
                &relay_config.host,
                relay_config.port,
                &relay_config.username,
                &relay_config.password,
            );
        }
        true
    }

    /// Begin hosting: advertise the session and accept inbound peers.
    ///
    /// Returns `false` if no session advertisement is configured.
    /// Otherwise clears any client-side target, fires the directory
    /// create (best-effort: failure is logged, never retried), ensures
    /// the signaling channel is connected, and returns `true`. Inbound
    /// peers appear reactively through signaling; a host never pre-creates
    /// links.
    pub async fn start_as_host(&self) -> bool {
        let (signaling, directory, request) = {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return false;
            }
            let Some(request) = state.session_request.clone() else {
                tracing::warn!("start_as_host called with no session request configured");
                return false;
            };
            state.target_host = None;
            state.server_handle = None;
            (state.signaling.clone(), state.directory.clone(), request)
        };

        let broker = self.clone();
        tokio::spawn(async move {
            match directory.create_session(&request).await {
                Ok(record) => {
                    let mut state = broker.shared.state.lock().await;
                    if state.shut_down {
                        tracing::debug!(
                            "session record {} arrived after shutdown, dropping",
                            record.session_id
                        );
                        return;
                    }
                    tracing::info!("hosted session advertised as {}", record.session_id);
                    state.hosted_session = Some(record);
                }
                Err(e) => tracing::warn!("failed to advertise hosted session: {e}"),
            }
        });

        if !signaling.is_connected() {
            if let Err(e) = signaling.connect().await {
                tracing::warn!("signaling connect failed, continuing as host: {e}");
            }
        }
        true
    }

    /// Feed an inbound signaling message into the broker.
    ///
    /// This is the single entry point by which unknown peers become known:
    /// the first message from an identity admits it (fresh link, fresh
    /// handle), and the raw payload is forwarded to its link either way.
    /// Normally called by the pump wired in
    /// [`initialize`](Self::initialize).
    pub async fn on_signaling_message(&self, from: &str, payload: &str) {
        let link = {
            let mut state = self.shared.state.lock().await;
            if state.shut_down {
                return;
            }
            match state.table.link_by_peer(from) {
                Some(link) => link,
                None => {
                    let (link, handle) = self.admit_peer(&mut state, from);
                    tracing::debug!("first signaling contact from {from}, admitted as {handle:016x}");
                    link
                }
            }
        };
        link.process_signaling_message(payload);
    }

    /// Transmit a payload to the peer a handle addresses.
    ///
    /// Best-effort: a handle with no live entry (already closed, never
    /// existed) drops the payload silently. The peer may legitimately be
    /// gone by the time the outer layer sends.
    pub async fn send(&self, handle: ConnectionHandle, payload: &[u8]) {
        let link = {
            let state = self.shared.state.lock().await;
            state.table.link_by_handle(handle)
        };
        match link {
            Some(link) => link.send(payload),
            None => tracing::trace!("dropping send to unknown handle {handle:016x}"),
        }
    }

    /// Close and forget the connection a handle addresses.
    ///
    /// Clears the target host if the handle aliases it, closes the link,
    /// removes the alias entry, and emits exactly one disconnect event.
    /// No-op for an unknown handle.
    pub async fn disconnect(&self, handle: ConnectionHandle) {
        let (peer, link) = {
            let mut state = self.shared.state.lock().await;
            let Some((peer, link)) = state.table.remove(handle) else {
                return;
            };
            if state.target_host.as_deref() == Some(peer.as_str()) {
                state.target_host = None;
                state.server_handle = None;
            }
            (peer, link)
        };
        link.close();
        tracing::info!("disconnected {peer} (handle {handle:016x})");
        self.emit(handle, TransportEventKind::Disconnected);
    }

    /// Tear the broker down.
    ///
    /// Closes every live link, clears the alias table and the target
    /// host, and fires a best-effort removal of the hosted session record
    /// if one exists. In-flight collaborator completions become no-ops.
    pub async fn shutdown(&self) {
        let (links, record, directory) = {
            let mut state = self.shared.state.lock().await;
            state.shut_down = true;
            state.target_host = None;
            state.server_handle = None;
            let links = state.table.drain();
            (links, state.hosted_session.take(), state.directory.clone())
        };

        let count = links.len();
        for link in links {
            link.close();
        }
        if count > 0 {
            tracing::info!("closed {count} peer links on shutdown");
        }

        if let Some(record) = record {
            tokio::spawn(async move {
                let session_id = record.session_id;
                match directory.remove_session(&session_id).await {
                    Ok(()) => tracing::info!("removed hosted session {session_id}"),
                    Err(e) => {
                        tracing::warn!("failed to remove hosted session {session_id}: {e}");
                    }
                }
            });
        }
    }

    /// Replace the session advertisement used by
    /// [`start_as_host`](Self::start_as_host).
    pub async fn set_session_request(&self, request: SessionCreateRequest) {
        self.shared.state.lock().await.session_request = Some(request);
    }

    /// Handle of the targeted host - the logical "server" of this local
    /// instance when acting as a client.
    pub async fn server_handle(&self) -> Option<ConnectionHandle> {
        self.shared.state.lock().await.server_handle
    }

    /// The currently targeted host identity, if any.
    pub async fn target_host(&self) -> Option<String> {
        self.shared.state.lock().await.target_host.clone()
    }

    /// Directory id of the advertised session, if hosting and the
    /// advertisement succeeded.
    pub async fn hosted_session_id(&self) -> Option<String> {
        self.shared
            .state
            .lock()
            .await
            .hosted_session
            .as_ref()
            .map(|record| record.session_id.clone())
    }

    /// Snapshot of all known peer identities.
    pub async fn peers(&self) -> Vec<String> {
        self.shared.state.lock().await.table.peers()
    }

    /// Snapshot of all live handles.
    pub async fn handles(&self) -> Vec<ConnectionHandle> {
        self.shared.state.lock().await.table.handles()
    }

    // ---- internals ----

    /// Create and register a link for `peer`. Idempotent on the identity:
    /// a known peer keeps its handle and gets a fresh link.
    fn admit_peer(
        &self,
        state: &mut BrokerState,
        peer: &str,
    ) -> (Arc<dyn PeerLink>, ConnectionHandle) {
        let link = state.links.create_link(peer, self.shared.link_tx.clone());
        let handle = state.table.register(peer, Arc::clone(&link));
        state.table.set_phase(peer, LinkPhase::Negotiating);
        (link, handle)
    }

    fn spawn_signaling_pump(&self, mut inbound: mpsc::UnboundedReceiver<SignalingMessage>) {
        let broker = self.clone();
        tokio::spawn(async move {
            while let Some(message) = inbound.recv().await {
                broker
                    .on_signaling_message(&message.from, &message.payload)
                    .await;
            }
            tracing::debug!("signaling inbound stream ended");
        });
    }

    fn spawn_link_pump(&self, mut signals: mpsc::UnboundedReceiver<LinkSignal>) {
        let broker = self.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                broker.handle_link_signal(signal).await;
            }
        });
    }

    fn spawn_relay_dial(&self, peer: String) {
        let broker = self.clone();
        tokio::spawn(async move {
            let relay = { broker.shared.state.lock().await.relay.clone() };
            let result = relay.nearest_server().await;
            broker.finish_relay_dial(&peer, result).await;
        });
    }

    /// Completion of the nearest-relay lookup dispatched by
    /// [`start_as_client`](Self::start_as_client).
    ///
    /// The peer may have been disconnected while the lookup was in
    /// flight; in that case the completion must do nothing rather than
    /// resurrect the removed entry.
    async fn finish_relay_dial(
        &self,
        peer: &str,
        result: std::result::Result<RelayServer, RelayError>,
    ) {
        match result {
            Ok(server) => {
                let link = {
                    let state = self.shared.state.lock().await;
                    if state.shut_down {
                        return;
                    }
                    match state.table.link_by_peer(peer) {
                        Some(link) => link,
                        None => {
                            tracing::debug!(
                                "relay lookup finished after {peer} was removed, ignoring"
                            );
                            return;
                        }
                    }
                };
                let config = &self.shared.relay_config;
                let credential =
                    derive_credentials(server.current_time, &config.username, &config.secret);
                tracing::debug!("connecting to {peer} via relay {}:{}", server.ip, server.port);
                link.request_connect(
                    &server.ip,
                    server.port,
                    &credential.username,
                    &credential.password,
                );
            }
            Err(e) => {
                tracing::warn!("nearest relay lookup failed: {e}");
                let removed = {
                    let mut state = self.shared.state.lock().await;
                    match state.table.handle_of(peer) {
                        Some(handle) => {
                            let link = state.table.remove(handle).map(|(_, link)| link);
                            if state.target_host.as_deref() == Some(peer) {
                                state.target_host = None;
                                state.server_handle = None;
                            }
                            link.map(|link| (handle, link))
                        }
                        None => None,
                    }
                };
                if let Some((handle, link)) = removed {
                    link.close();
                    self.emit(handle, TransportEventKind::Disconnected);
                }
            }
        }
    }

    /// Process one link signal inside the serialized domain.
    async fn handle_link_signal(&self, signal: LinkSignal) {
        let LinkSignal { peer, event } = signal;
        match event {
            LinkEvent::Connected => {
                let handle = {
                    let mut state = self.shared.state.lock().await;
                    let Some(handle) = state.table.handle_of(&peer) else {
                        return;
                    };
                    state.table.set_phase(&peer, LinkPhase::Connected);
                    handle
                };
                tracing::info!("connected to {peer} (handle {handle:016x})");
                self.emit(handle, TransportEventKind::Connected);
            }
            LinkEvent::Data(payload) => {
                // Re-resolved at delivery time; data from a departed peer
                // is dropped.
                let handle = {
                    let state = self.shared.state.lock().await;
                    match state.table.handle_of(&peer) {
                        Some(handle) => handle,
                        None => return,
                    }
                };
                self.emit(handle, TransportEventKind::Data(payload));
            }
            LinkEvent::Closed | LinkEvent::Failed => {
                let failed = matches!(event, LinkEvent::Failed);
                let removed = {
                    let mut state = self.shared.state.lock().await;
                    let Some(handle) = state.table.handle_of(&peer) else {
                        return;
                    };
                    let link = state.table.remove(handle).map(|(_, link)| link);
                    if state.target_host.as_deref() == Some(peer.as_str()) {
                        state.target_host = None;
                        state.server_handle = None;
                    }
                    link.map(|link| (handle, link))
                };
                if let Some((handle, link)) = removed {
                    link.close();
                    if failed {
                        tracing::warn!("link to {peer} failed (handle {handle:016x})");
                    } else {
                        tracing::debug!("link to {peer} closed (handle {handle:016x})");
                    }
                    self.emit(handle, TransportEventKind::Disconnected);
                }
            }
        }
    }

    fn emit(&self, handle: ConnectionHandle, kind: TransportEventKind) {
        if self
            .shared
            .events_tx
            .send(TransportEvent::now(handle, kind))
            .is_err()
        {
            tracing::trace!("transport event receiver dropped, event for {handle:016x} discarded");
        }
    }
}
