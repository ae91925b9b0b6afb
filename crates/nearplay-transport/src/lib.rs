//! Transport capability for Nearplay.
//!
//! Nearplay doesn't talk to a radio itself. Everything physical
//! (advertising, endpoint discovery, connection negotiation and raw byte
//! delivery) is consumed through the [`Transport`] trait. Callbacks from
//! the radio arrive as [`TransportEvent`] values on an event channel that
//! the session managers drain one at a time, which keeps every state
//! transition on a single logical owner.
//!
//! # Feature Flags
//!
//! - `memory` (default) — [`MemoryNetwork`], an in-process transport
//! - `testing` — [`testing::RecordingTransport`], a scripted mock

#![allow(async_fn_in_trait)]

mod error;
#[cfg(feature = "memory")]
mod memory;
#[cfg(feature = "testing")]
pub mod testing;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{MemoryNetwork, MemoryTransport};

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Transport-assigned identifier for a discovered or connected peer.
///
/// Endpoint ids are owned by the transport. Session managers only store
/// and compare them.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EndpointId(String);

impl EndpointId {
    /// Creates a new `EndpointId` from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EndpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EndpointId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for EndpointId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Outcome of a connection negotiation, as reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatusCode {
    /// Both sides accepted; the link is live.
    Ok,
    /// One side rejected the connection.
    Rejected,
    /// Any other transport-specific failure code.
    Error(i32),
}

impl ConnectionStatusCode {
    /// Returns `true` for [`ConnectionStatusCode::Ok`].
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Topology the radio should negotiate.
///
/// Nearplay sessions are star shaped: one host, many leaves.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    /// One hub, many leaves. No leaf-to-leaf links.
    #[default]
    P2pStar,
    /// Any device may link to any other (M-to-N).
    P2pCluster,
    /// Exactly one peer on each side.
    P2pPointToPoint,
}

/// Options passed when advertising.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdvertisingOptions {
    pub strategy: Strategy,
}

/// Options passed when discovering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryOptions {
    pub strategy: Strategy,
}

/// A callback from the transport, delivered as a value.
///
/// Discovery callbacks (`EndpointFound`, `EndpointLost`), lifecycle
/// callbacks (`ConnectionInitiated`, `ConnectionResult`, `Disconnected`)
/// and the payload callback (`PayloadReceived`) all travel on the same
/// ordered channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// An advertiser with a matching service id was discovered.
    EndpointFound {
        endpoint: EndpointId,
        name: String,
        service_id: String,
    },

    /// A previously discovered advertiser disappeared.
    EndpointLost { endpoint: EndpointId },

    /// A connection negotiation started. `incoming` is `true` on the side
    /// that did not call `request_connection`.
    ConnectionInitiated {
        endpoint: EndpointId,
        name: String,
        incoming: bool,
    },

    /// A connection negotiation finished.
    ConnectionResult {
        endpoint: EndpointId,
        status: ConnectionStatusCode,
    },

    /// The remote side dropped the link.
    Disconnected { endpoint: EndpointId },

    /// A whole byte payload arrived over an accepted link.
    PayloadReceived { endpoint: EndpointId, bytes: Vec<u8> },
}

/// Receiving half of a transport's event channel.
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

/// Sending half of a transport's event channel.
pub type EventSender = mpsc::UnboundedSender<TransportEvent>;

/// The proximity transport capability.
///
/// Implementations are expected to serialize their own callbacks onto the
/// event channel handed out at construction time. Every operation is
/// asynchronous; connection timeouts, retries and cancellation belong to
/// the implementation, not to the session managers.
///
/// ## Trait bounds explained
///
/// - `Send + Sync` → a manager holding the transport can live on any
///   Tokio worker thread, and `&self` methods may be called from
///   several tasks at once. Implementations guard their own state
///   (the in-memory one uses a `tokio::sync::Mutex`).
/// - `'static` → the transport owns everything it needs, so a manager
///   can keep it for the whole session.
///
/// ## Async methods in a trait
///
/// The methods are plain `async fn`s (stable since Rust 1.75). The
/// futures they return aren't declared `Send`, which is what the
/// `async_fn_in_trait` lint warns about; the managers await them
/// directly, so that's fine here.
///
/// ## Requests vs. events
///
/// Methods only *start* things. Their outcome arrives later as a
/// [`TransportEvent`]: `request_connection` succeeding means the
/// request went out, and the link exists only once a
/// [`TransportEvent::ConnectionResult`] with
/// [`ConnectionStatusCode::Ok`] shows up on the channel.
pub trait Transport: Send + Sync + 'static {
    /// The id other devices see for this device.
    fn local_endpoint(&self) -> &EndpointId;

    /// Starts scanning for advertisers of `service_id`.
    async fn start_discovery(
        &self,
        service_id: &str,
        options: DiscoveryOptions,
    ) -> Result<(), TransportError>;

    /// Stops scanning. Safe to call when not discovering.
    async fn stop_discovery(&self);

    /// Starts advertising `service_id` under `display_name`.
    async fn start_advertising(
        &self,
        display_name: &str,
        service_id: &str,
        options: AdvertisingOptions,
    ) -> Result<(), TransportError>;

    /// Stops advertising. Existing links stay open.
    async fn stop_advertising(&self);

    /// Asks `endpoint` for a connection, introducing ourselves as
    /// `display_name`.
    async fn request_connection(
        &self,
        display_name: &str,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError>;

    /// Accepts a pending connection. Payloads from `endpoint` are
    /// delivered only after this.
    async fn accept_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError>;

    /// Rejects a pending connection.
    async fn reject_connection(
        &self,
        endpoint: &EndpointId,
    ) -> Result<(), TransportError>;

    /// Sends `bytes` to every endpoint in `endpoints`.
    async fn send_payload(
        &self,
        endpoints: &[EndpointId],
        bytes: &[u8],
    ) -> Result<(), TransportError>;

    /// Drops the link to `endpoint`. The local side gets no
    /// `Disconnected` event.
    async fn disconnect_from_endpoint(&self, endpoint: &EndpointId);

    /// Drops every link and pending negotiation, and stops advertising
    /// and discovery.
    async fn stop_all_endpoints(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_id_display() {
        assert_eq!(EndpointId::from("ab12").to_string(), "ab12");
    }

    #[test]
    fn test_endpoint_id_serializes_as_plain_string() {
        // Host and clients exchange endpoint ids inside game payloads,
        // so the wire form must be a bare string.
        let json = serde_json::to_string(&EndpointId::new("ep1")).unwrap();
        assert_eq!(json, "\"ep1\"");
    }

    #[test]
    fn test_connection_status_code_is_ok() {
        assert!(ConnectionStatusCode::Ok.is_ok());
        assert!(!ConnectionStatusCode::Rejected.is_ok());
        assert!(!ConnectionStatusCode::Error(13).is_ok());
    }

    #[test]
    fn test_strategy_default_is_star() {
        assert_eq!(AdvertisingOptions::default().strategy, Strategy::P2pStar);
        assert_eq!(DiscoveryOptions::default().strategy, Strategy::P2pStar);
    }

    #[test]
    fn test_strategy_serializes_screaming_snake_case() {
        let json = serde_json::to_string(&Strategy::P2pStar).unwrap();
        assert_eq!(json, "\"P2P_STAR\"");
    }
}
