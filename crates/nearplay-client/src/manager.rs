//! The client manager: drives one device's connection to a host.
//!
//! The manager owns the client-side state machine. It asks the transport
//! to discover hosts, requests a link to the first one found, introduces
//! itself with an `ESTABLISH_CONNECTION` envelope and then routes every
//! inbound server payload: protocol notices are handled here, everything
//! else goes to the application's dispatch function.
//!
//! # Concurrency note
//!
//! `ClientManager` is driven from a single task. Transport callbacks are
//! fed in as [`TransportEvent`]s through [`ClientManager::handle_event`]
//! (or [`ClientManager::pump`]), and every method takes `&mut self`, so
//! the state has exactly one writer. Readers use
//! [`ClientManager::subscribe`] or [`ClientManager::changes`].

use nearplay_protocol::{
    ClientPayloadType, EnvelopeCodec, PlayerConnectionState, ServerPayloadType,
    ServerRole, StateCell, TypeAdapters,
};
use nearplay_transport::{
    ConnectionStatusCode, DiscoveryOptions, EndpointId, EventReceiver,
    Transport, TransportEvent,
};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{broadcast, watch};

use crate::{ClientError, ClientState, ConnectionStatus, ServerAction};

/// The application's handler for [`ServerAction`]s.
pub type ServerDispatch = Box<dyn FnMut(ServerAction) + Send>;

/// Client-side session manager.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──→ EndpointFound ──→ request ──→ ConnectionInitiated ──→ accept
///                                                                      │
///     ESTABLISH_CONNECTION sent, discovery stopped ←── ConnectionResult OK
/// ```
pub struct ClientManager<T: Transport> {
    transport: T,
    dispatch: ServerDispatch,
    codec: EnvelopeCodec,
    state: StateCell<ClientState>,
    /// Remembered from the last `connect()`.
    identity: Option<PlayerConnectionState>,
    /// The endpoint we asked to connect to and haven't heard back from.
    pending: Option<EndpointId>,
}

impl<T: Transport> ClientManager<T> {
    /// Creates a manager with the plain JSON envelope codec.
    pub fn new(
        transport: T,
        dispatch: impl FnMut(ServerAction) + Send + 'static,
    ) -> Self {
        Self::with_codec(transport, EnvelopeCodec::json(), dispatch)
    }

    /// Creates a manager whose envelope codec carries default adapters.
    pub fn with_codec(
        transport: T,
        codec: EnvelopeCodec,
        dispatch: impl FnMut(ServerAction) + Send + 'static,
    ) -> Self {
        Self {
            transport,
            dispatch: Box::new(dispatch),
            codec,
            state: StateCell::default(),
            identity: None,
            pending: None,
        }
    }

    /// Returns a snapshot of the current state.
    pub fn state(&self) -> ClientState {
        self.state.get()
    }

    /// Subscribes to the latest state.
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.watch()
    }

    /// Subscribes to every state transition from now on.
    pub fn changes(&self) -> broadcast::Receiver<ClientState> {
        self.state.changes()
    }

    /// The identity passed to the last `connect()`.
    pub fn identity(&self) -> Option<&PlayerConnectionState> {
        self.identity.as_ref()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Starts looking for a host advertising `service_id`.
    ///
    /// Does nothing while a connection is in progress or live. Otherwise
    /// the state is reset and discovery (re)starts; the status becomes
    /// `CONNECTING`, or `CONNECTING_FAILED` if discovery can't start.
    ///
    /// A connection request that is still being negotiated (for example
    /// after `ENDPOINT_LOST`) is kept: its result still establishes the
    /// session.
    pub async fn connect(
        &mut self,
        service_id: &str,
        identity: PlayerConnectionState,
    ) {
        let status = self.state.read(|state| state.status);
        if status.is_in_progress() {
            tracing::debug!(?status, "connect ignored, already in progress");
            return;
        }

        self.identity = Some(identity);
        if let Some(endpoint) = &self.pending {
            tracing::debug!(%endpoint, "negotiation still pending, keeping it");
        }
        self.transport.stop_discovery().await;

        let status = match self
            .transport
            .start_discovery(service_id, DiscoveryOptions::default())
            .await
        {
            Ok(()) => {
                tracing::info!(service_id, "discovery started");
                ConnectionStatus::Connecting
            }
            Err(e) => {
                tracing::warn!(service_id, error = %e, "discovery failed to start");
                ConnectionStatus::ConnectingFailed
            }
        };
        self.state.replace(ClientState {
            status,
            ..ClientState::default()
        });
    }

    /// Drops the link to the server and stops all transport activity.
    ///
    /// Always safe to call, any number of times.
    pub async fn disconnect(&mut self) {
        let server = self.state.read(|state| state.server_endpoint_id.clone());
        self.pending = None;
        self.state.replace(ClientState {
            status: ConnectionStatus::Disconnected,
            ..ClientState::default()
        });

        if let Some(endpoint) = &server {
            self.transport.disconnect_from_endpoint(endpoint).await;
        }
        self.transport.stop_discovery().await;
        self.transport.stop_all_endpoints().await;
        tracing::info!(server = ?server, "client disconnected");
    }

    /// Sends already-encoded bytes to the server.
    ///
    /// # Errors
    /// - [`ClientError::NotConnected`] — no server endpoint is known yet
    /// - [`ClientError::Transport`] — the transport refused the payload
    pub async fn send(&self, bytes: &[u8]) -> Result<(), ClientError> {
        let server = self
            .state
            .read(|state| state.server_endpoint_id.clone())
            .ok_or(ClientError::NotConnected)?;
        self.transport.send_payload(&[server], bytes).await?;
        Ok(())
    }

    /// Encodes `(tag, body)` with this manager's codec and sends it.
    pub async fn send_envelope<Tag, B>(
        &self,
        tag: &Tag,
        body: Option<&B>,
        adapters: Option<&TypeAdapters>,
    ) -> Result<(), ClientError>
    where
        Tag: Serialize,
        B: Serialize + 'static,
    {
        let bytes = self.codec.encode(tag, body, adapters)?;
        self.send(&bytes).await
    }

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

    /// Applies one transport callback to the state machine.
    pub async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::EndpointFound { endpoint, name, .. } => {
                self.on_endpoint_found(endpoint, &name).await;
            }
            TransportEvent::EndpointLost { endpoint } => {
                self.on_endpoint_lost(&endpoint);
            }
            TransportEvent::ConnectionInitiated { endpoint, .. } => {
                self.on_connection_initiated(&endpoint).await;
            }
            TransportEvent::ConnectionResult { endpoint, status } => {
                self.on_connection_result(endpoint, status).await;
            }
            TransportEvent::Disconnected { endpoint } => {
                self.on_disconnected(&endpoint);
            }
            TransportEvent::PayloadReceived { endpoint, bytes } => {
                self.on_payload(&endpoint, bytes);
            }
        }
    }

    // -----------------------------------------------------------------
    // Transport callbacks
    // -----------------------------------------------------------------

    /// Whether an `EndpointFound` should turn into a connection request.
    fn is_searching(&self) -> bool {
        self.pending.is_none()
            && self.identity.is_some()
            && self.state.read(|state| {
                state.server_endpoint_id.is_none()
                    && !matches!(
                        state.status,
                        ConnectionStatus::None | ConnectionStatus::Disconnected
                    )
            })
    }

    async fn on_endpoint_found(&mut self, endpoint: EndpointId, name: &str) {
        if !self.is_searching() {
            tracing::debug!(%endpoint, name, "endpoint found, not searching");
            return;
        }
        let nickname = self
            .identity
            .as_ref()
            .map(|identity| identity.nickname.clone())
            .unwrap_or_default();

        tracing::info!(%endpoint, name, "host found, requesting connection");
        match self.transport.request_connection(&nickname, &endpoint).await {
            Ok(()) => self.pending = Some(endpoint),
            Err(e) => {
                tracing::warn!(%endpoint, error = %e, "connection request failed");
                self.set_status(ConnectionStatus::ConnectingFailed);
            }
        }
    }

    fn on_endpoint_lost(&mut self, endpoint: &EndpointId) {
        let connected = self.state.read(|state| state.server_endpoint_id.is_some());
        if connected {
            return;
        }
        // A negotiation already under way still settles through its
        // `ConnectionResult`, so `pending` stays as it is.
        tracing::info!(%endpoint, "endpoint lost before connecting");
        self.set_status(ConnectionStatus::EndpointLost);
    }

    async fn on_connection_initiated(&mut self, endpoint: &EndpointId) {
        if self.pending.as_ref() != Some(endpoint) {
            tracing::debug!(%endpoint, "rejecting unrequested connection");
            if let Err(e) = self.transport.reject_connection(endpoint).await {
                tracing::warn!(%endpoint, error = %e, "reject failed");
            }
            return;
        }
        if let Err(e) = self.transport.accept_connection(endpoint).await {
            tracing::warn!(%endpoint, error = %e, "accept failed");
            self.pending = None;
            self.set_status(ConnectionStatus::ConnectingFailed);
        }
    }

    async fn on_connection_result(
        &mut self,
        endpoint: EndpointId,
        status: ConnectionStatusCode,
    ) {
        if self.pending.as_ref() != Some(&endpoint) {
            tracing::debug!(%endpoint, ?status, "result for unrequested endpoint");
            return;
        }
        self.pending = None;

        match status {
            ConnectionStatusCode::Ok => self.establish(endpoint).await,
            ConnectionStatusCode::Rejected => {
                tracing::info!(%endpoint, "connection rejected");
                self.set_status(ConnectionStatus::ConnectingRejected);
            }
            ConnectionStatusCode::Error(code) => {
                tracing::warn!(%endpoint, code, "connection failed");
                self.set_status(ConnectionStatus::ConnectingFailed);
            }
        }
    }

    /// Records the server, introduces ourselves and stops discovery.
    async fn establish(&mut self, endpoint: EndpointId) {
        self.state.update(|state| {
            state.status = ConnectionStatus::Connected;
            state.server_endpoint_id = Some(endpoint.clone());
        });
        tracing::info!(%endpoint, "connected to host");

        let identity = self.identity.clone().unwrap_or_default();
        let sent = self
            .send_envelope(
                &ClientPayloadType::EstablishConnection,
                Some(&identity),
                None,
            )
            .await;
        if let Err(e) = sent {
            tracing::warn!(%endpoint, error = %e, "establishment failed");
            self.transport.disconnect_from_endpoint(&endpoint).await;
            self.state.replace(ClientState {
                status: ConnectionStatus::ConnectingFailed,
                ..ClientState::default()
            });
            return;
        }

        self.set_status(ConnectionStatus::ConnectionEstablished);
        self.transport.stop_discovery().await;
    }

    fn on_disconnected(&mut self, endpoint: &EndpointId) {
        let ours = self
            .state
            .read(|state| state.server_endpoint_id.as_ref() == Some(endpoint));
        if !ours {
            tracing::debug!(%endpoint, "disconnect from unknown endpoint");
            return;
        }
        tracing::info!(%endpoint, "host dropped the link");
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Routes one inbound payload. Protocol notices change state; the
    /// rest is forwarded untouched.
    fn on_payload(&mut self, endpoint: &EndpointId, bytes: Vec<u8>) {
        let envelope = match self.codec.decode::<ServerPayloadType, Value>(&bytes, None) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::debug!(%endpoint, error = %e, "opaque payload");
                (self.dispatch)(ServerAction::PayloadAction(bytes));
                return;
            }
        };

        match envelope.tag {
            ServerPayloadType::ClientConnected => {
                let role = envelope
                    .body
                    .and_then(|body| self.codec.convert::<ServerRole>(body, None).ok());
                match role {
                    Some(role) => {
                        tracing::info!(%endpoint, %role, "admitted by host");
                        self.state.update(|state| state.server_role = role);
                    }
                    None => (self.dispatch)(ServerAction::PayloadAction(bytes)),
                }
            }
            ServerPayloadType::RoomIsFull => {
                tracing::info!(%endpoint, "room is full");
                self.set_status(ConnectionStatus::RoomIsFull);
            }
            ServerPayloadType::UpdatePlayerState => {
                (self.dispatch)(ServerAction::UpdatePlayerState(bytes));
            }
            ServerPayloadType::UpdateGameState => {
                (self.dispatch)(ServerAction::UpdateGameState(bytes));
            }
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.state.update(|state| state.status = status) {
            tracing::debug!(?status, "client status changed");
        }
    }
}
