//! # Nearplay
//!
//! Local multiplayer sessions for games played by devices in the same
//! room.
//!
//! One device hosts a session with a [`ServerManager`](prelude::ServerManager);
//! the others join with a [`ClientManager`](prelude::ClientManager). Both
//! drive an abstract proximity [`Transport`](prelude::Transport), keep an
//! observable connection state, and hand game payloads to a single
//! dispatch function supplied by the application.
//!
//! ## Quick Start
//!
//! ```rust
//! use nearplay::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let network = MemoryNetwork::new();
//!
//! let (host_transport, mut host_events) = network.join().await;
//! let mut server = ServerManager::new(host_transport, |action| {
//!     println!("host got {action:?}");
//! });
//! server.start_server("tic-tac-toe", ServerConfiguration::default()).await;
//!
//! let (client_transport, mut client_events) = network.join().await;
//! let mut client = ClientManager::new(client_transport, |action| {
//!     println!("client got {action:?}");
//! });
//! client
//!     .connect("tic-tac-toe", PlayerConnectionState::new("Ann", None))
//!     .await;
//!
//! // Drive both sides until the link settles.
//! while client.pump(&mut client_events).await + server.pump(&mut host_events).await > 0 {}
//!
//! assert_eq!(client.state().status, ConnectionStatus::ConnectionEstablished);
//! assert_eq!(server.state().connected_count(), 1);
//! # }
//! ```

mod error;
mod logging;

pub use error::NearplayError;
pub use logging::init_tracing;

pub use nearplay_client as client;
pub use nearplay_protocol as protocol;
pub use nearplay_server as server;
pub use nearplay_transport as transport;

pub mod prelude {
    //! Everything an application needs to host or join a session.

    pub use crate::{NearplayError, init_tracing};
    pub use nearplay_client::{
        ClientManager, ClientState, ConnectionStatus, ServerAction,
    };
    pub use nearplay_protocol::{
        ClientPayloadType, Envelope, EnvelopeCodec, PlayerConnectionState,
        PlayerState, ResourceText, ServerPayloadType, ServerRole, TypeAdapter,
        TypeAdapters, decode, encode, encode_tag,
    };
    pub use nearplay_server::{
        ClientAction, ServerConfiguration, ServerManager, ServerState,
        ServerStatus,
    };
    #[cfg(feature = "memory")]
    pub use nearplay_transport::{MemoryNetwork, MemoryTransport};
    pub use nearplay_transport::{
        ConnectionStatusCode, EndpointId, EventReceiver, Transport,
        TransportEvent,
    };
}
