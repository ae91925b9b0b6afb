//! The server manager: hosts one session for nearby clients.
//!
//! The manager advertises the session, admits clients up to the
//! configured capacity, keeps the ordered list of connected endpoints
//! and routes client payloads. Admission notices (`CLIENT_CONNECTED`,
//! `ROOM_IS_FULL`) are sent from here; everything the application must
//! decide on goes to its dispatch function as a [`ClientAction`].
//!
//! # Concurrency note
//!
//! Like the client side, `ServerManager` has a single writer. Feed it
//! transport callbacks through [`ServerManager::handle_event`] or
//! [`ServerManager::pump`] from the task that owns it.

use std::collections::HashSet;

use nearplay_protocol::{
    ClientPayloadType, EnvelopeCodec, ServerPayloadType, StateCell,
    TypeAdapters,
};
use nearplay_transport::{
    AdvertisingOptions, ConnectionStatusCode, EndpointId, EventReceiver,
    Transport, TransportEvent,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::{
    ClientAction, ServerConfiguration, ServerError, ServerState, ServerStatus,
};

/// The application's handler for [`ClientAction`]s.
pub type ClientDispatch = Box<dyn FnMut(ClientAction) + Send>;

/// Host-side session manager.
///
/// ## Lifecycle
///
/// ```text
/// start_server() ──→ [Advertising] ──stop_advertising()──→ [Active]
///        │                 │                                   │
///        ▼                 └──────────close_server()───────────┤
/// [AdvertisingFailed]                                          ▼
///                                                          [Closed]
/// ```
pub struct ServerManager<T: Transport> {
    transport: T,
    dispatch: ClientDispatch,
    codec: EnvelopeCodec,
    state: StateCell<ServerState>,

    /// Set by `start_server()`, cleared by `close_server()`.
    config: Option<ServerConfiguration>,

    /// Endpoints we rejected ourselves and whose `Rejected` result is
    /// still to come. Those results are expected, not failures.
    rejected: HashSet<EndpointId>,
}

impl<T: Transport> ServerManager<T> {
    /// Creates a manager with the plain JSON envelope codec.
    pub fn new(
        transport: T,
        dispatch: impl FnMut(ClientAction) + Send + 'static,
    ) -> Self {
        Self::with_codec(transport, EnvelopeCodec::json(), dispatch)
    }

    /// Creates a manager whose envelope codec carries default adapters.
    pub fn with_codec(
        transport: T,
        codec: EnvelopeCodec,
        dispatch: impl FnMut(ClientAction) + Send + 'static,
    ) -> Self {
        Self {
            transport,
            dispatch: Box::new(dispatch),
            codec,
            state: StateCell::default(),
            config: None,
            rejected: HashSet::new(),
        }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> ServerState {
        self.state.get()
    }

    /// Subscribes to the latest state.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.watch()
    }

    /// Subscribes to every state transition from now on.
    pub fn changes(&self) -> broadcast::Receiver<ServerState> {
        self.state.changes()
    }

    /// The configuration of the running (or last failed) session.
    pub fn configuration(&self) -> Option<&ServerConfiguration> {
        self.config.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Starts hosting a session under `service_id`.
    ///
    /// Does nothing while a session is already running. Otherwise any
    /// leftover links are dropped and advertising starts; the status
    /// becomes `ADVERTISING`, or `ADVERTISING_FAILED` if the
    /// configuration is invalid or advertising can't start.
    pub async fn start_server(
        &mut self,
        service_id: &str,
        config: ServerConfiguration,
    ) {
        let status = self.state.read(|state| state.status);
        if status.is_running() {
            tracing::debug!(?status, "start_server ignored, already running");
            return;
        }

        self.rejected.clear();
        if let Err(e) = config.validate() {
            tracing::warn!(error = %e, "refusing to start server");
            self.config = None;
            self.set_status(ServerStatus::AdvertisingFailed);
            return;
        }

        let role = config.role;
        let options = AdvertisingOptions {
            strategy: config.strategy,
        };
        let display_name = config.display_name.clone();
        self.config = Some(config);
        self.state.update(|state| {
            state.role = role;
            state.connected_endpoints.clear();
        });

        self.transport.stop_advertising().await;
        self.transport.stop_all_endpoints().await;

        match self
            .transport
            .start_advertising(&display_name, service_id, options)
            .await
        {
            Ok(()) => {
                tracing::info!(service_id, %role, %display_name, "server advertising");
                self.set_status(ServerStatus::Advertising);
            }
            Err(e) => {
                tracing::warn!(service_id, error = %e, "advertising failed to start");
                self.set_status(ServerStatus::AdvertisingFailed);
            }
        }
    }

    /// Stops accepting newcomers while keeping joined clients connected.
    pub async fn stop_advertising(&mut self) {
        self.transport.stop_advertising().await;

        let status = self.state.read(|state| state.status);
        if matches!(status, ServerStatus::None | ServerStatus::Closed) {
            tracing::debug!(?status, "stop_advertising outside a session");
            return;
        }
        tracing::info!("advertising stopped, session active");
        self.set_status(ServerStatus::Active);
    }

    /// Drops every client and stops all transport activity.
    ///
    /// The state becomes a fresh default with status `CLOSED`; call
    /// `start_server()` again to host another session.
    pub async fn close_server(&mut self) {
        self.transport.stop_all_endpoints().await;
        self.transport.stop_advertising().await;
        self.transport.stop_discovery().await;

        self.config = None;
        self.rejected.clear();
        self.state.replace(ServerState {
            status: ServerStatus::Closed,
            ..ServerState::default()
        });
        tracing::info!("server closed");
    }

    // -----------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------

    /// Sends already-encoded bytes to one connected client.
    ///
    /// Targets that aren't connected are silently skipped.
    ///
    /// # Errors
    /// [`ServerError::Transport`] if the transport refuses the payload.
    pub async fn send_to(
        &self,
        endpoint: &EndpointId,
        bytes: &[u8],
    ) -> Result<(), ServerError> {
        if !self.state.read(|state| state.is_connected(endpoint)) {
            tracing::debug!(%endpoint, "dropping payload for stale endpoint");
            return Ok(());
        }
        self.transport
            .send_payload(std::slice::from_ref(endpoint), bytes)
            .await?;
        Ok(())
    }

    /// Sends already-encoded bytes to every connected client.
    ///
    /// Does nothing when nobody is connected.
    pub async fn broadcast(&self, bytes: &[u8]) -> Result<(), ServerError> {
        let targets = self.state.read(|state| state.connected_endpoints.clone());
        if targets.is_empty() {
            return Ok(());
        }
        self.transport.send_payload(&targets, bytes).await?;
        Ok(())
    }

    /// Encodes `(tag, body)` with this manager's codec and sends it to
    /// one connected client.
    pub async fn send_envelope_to<Tag, B>(
        &self,
        endpoint: &EndpointId,
        tag: &Tag,
        body: Option<&B>,
        adapters: Option<&TypeAdapters>,
    ) -> Result<(), ServerError>
    where
        Tag: Serialize,
        B: Serialize + 'static,
    {
        let bytes = self.codec.encode(tag, body, adapters)?;
        self.send_to(endpoint, &bytes).await
    }

    /// Encodes `(tag, body)` with this manager's codec and sends it to
    /// every connected client.
    pub async fn broadcast_envelope<Tag, B>(
        &self,
        tag: &Tag,
        body: Option<&B>,
        adapters: Option<&TypeAdapters>,
    ) -> Result<(), ServerError>
    where
        Tag: Serialize,
        B: Serialize + 'static,
    {
        let bytes = self.codec.encode(tag, body, adapters)?;
        self.broadcast(&bytes).await
    }

    // -----------------------------------------------------------------
    // Transport callbacks
    // -----------------------------------------------------------------

    /// Handles every event already queued on `events` and returns how
    /// many there were. Never waits.
    pub async fn pump(&mut self, events: &mut EventReceiver) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.handle_event(event).await;
            handled += 1;
        }
        handled
    }

    /// Waits for the next event and handles it.
    ///
    /// Returns `false` once the transport has closed the channel.
    pub async fn next_event(&mut self, events: &mut EventReceiver) -> bool {
        match events.recv().await {
            Some(event) => {
                self.handle_event(event).await;
                true
            }
            None => false,
        }
    }

    /// Applies one transport callback to the session.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionInitiated { endpoint, name, .. } => {
                self.on_connection_initiated(endpoint, &name).await;
            }
            TransportEvent::ConnectionResult { endpoint, status } => {
                self.on_connection_result(endpoint, status).await;
            }
            TransportEvent::Disconnected { endpoint } => {
                self.client_disconnected(&endpoint);
            }
            TransportEvent::PayloadReceived { endpoint, bytes } => {
                self.on_payload(endpoint, bytes);
            }
            // Discovery isn't used on the host side.
            TransportEvent::EndpointFound { .. }
            | TransportEvent::EndpointLost { .. } => {}
        }
    }

    fn capacity(&self) -> Option<usize> {
        self.config.as_ref().map(|config| config.max_connections)
    }

    fn is_full(&self) -> bool {
        match self.capacity() {
            Some(max) => self.state.read(|state| state.connected_count() >= max),
            None => true,
        }
    }

    async fn on_connection_initiated(&mut self, endpoint: EndpointId, name: &str) {
        if self.is_full() {
            tracing::info!(%endpoint, name, "rejecting connection, room is full");
            match self.transport.reject_connection(&endpoint).await {
                Ok(()) => {
                    self.rejected.insert(endpoint);
                }
                Err(e) => tracing::warn!(%endpoint, error = %e, "reject failed"),
            }
            return;
        }

        tracing::debug!(%endpoint, name, "accepting connection");
        if let Err(e) = self.transport.accept_connection(&endpoint).await {
            tracing::warn!(%endpoint, error = %e, "accept failed");
        }
    }

    async fn on_connection_result(
        &mut self,
        endpoint: EndpointId,
        status: ConnectionStatusCode,
    ) {
        let rejected_by_us = self.rejected.remove(&endpoint);
        match status {
            ConnectionStatusCode::Ok => self.client_connected(endpoint).await,
            ConnectionStatusCode::Rejected if rejected_by_us => {
                tracing::debug!(%endpoint, "rejection delivered");
            }
            status => {
                tracing::warn!(%endpoint, ?status, "connection negotiation failed");
                self.set_status(ServerStatus::AdvertisingFailed);
            }
        }
    }

    /// Admits `endpoint`, or turns it away if the room filled up while
    /// the connection was being negotiated.
    async fn client_connected(&mut self, endpoint: EndpointId) {
        if self.is_full() {
            tracing::info!(%endpoint, "room filled up during negotiation");
            self.turn_away(&endpoint).await;
            return;
        }

        self.state
            .update(|state| state.connected_endpoints.push(endpoint.clone()));
        let role = self.state.read(|state| state.role);
        tracing::info!(%endpoint, %role, "client connected");

        let sent = self
            .send_envelope_to(
                &endpoint,
                &ServerPayloadType::ClientConnected,
                Some(&role),
                None,
            )
            .await;
        if let Err(e) = sent {
            tracing::warn!(%endpoint, error = %e, "admission notice not sent");
        }
    }

    /// Sends `ROOM_IS_FULL` straight through the transport (the endpoint
    /// was never admitted) and drops the link. Best effort.
    async fn turn_away(&mut self, endpoint: &EndpointId) {
        let notice = self
            .codec
            .encode::<_, ()>(&ServerPayloadType::RoomIsFull, None, None);
        match notice {
            Ok(bytes) => {
                let sent = self
                    .transport
                    .send_payload(std::slice::from_ref(endpoint), &bytes)
                    .await;
                if let Err(e) = sent {
                    tracing::warn!(%endpoint, error = %e, "room-full notice not sent");
                }
            }
            Err(e) => tracing::warn!(%endpoint, error = %e, "room-full notice not encoded"),
        }
        self.transport.disconnect_from_endpoint(endpoint).await;
    }

    /// Removes `endpoint` and tells the application, at most once per
    /// admission.
    fn client_disconnected(&mut self, endpoint: &EndpointId) {
        let removed = self.state.update(|state| {
            state.connected_endpoints.retain(|connected| connected != endpoint);
        });
        if !removed {
            tracing::debug!(%endpoint, "disconnect for unknown endpoint");
            return;
        }
        tracing::info!(%endpoint, "client disconnected");
        (self.dispatch)(ClientAction::Disconnect(endpoint.clone()));
    }

    fn on_payload(&mut self, endpoint: EndpointId, bytes: Vec<u8>) {
        let tag = match self.codec.decode::<ClientPayloadType, Value>(&bytes, None) {
            Ok(envelope) => envelope.tag,
            Err(e) => {
                tracing::debug!(%endpoint, error = %e, "opaque payload");
                (self.dispatch)(ClientAction::PayloadAction(endpoint, bytes));
                return;
            }
        };

        match tag {
            ClientPayloadType::EstablishConnection => {
                if !self.state.read(|state| state.is_connected(&endpoint)) {
                    tracing::debug!(%endpoint, "establishment from unadmitted endpoint");
                }
                (self.dispatch)(ClientAction::EstablishConnection(endpoint, bytes));
            }
            ClientPayloadType::ActionDisconnected => {
                self.client_disconnected(&endpoint);
            }
        }
    }

    fn set_status(&mut self, status: ServerStatus) {
        if self.state.update(|state| state.status = status) {
            tracing::debug!(?status, "server status changed");
        }
    }
}
