//! Error types for the client session layer.

use nearplay_protocol::ProtocolError;
use nearplay_transport::TransportError;

/// Errors returned by the client manager's send helpers.
///
/// Connection lifecycle failures never show up here; they become
/// [`ConnectionStatus`](crate::ConnectionStatus) transitions instead.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// There is no server endpoint to send to.
    #[error("not connected to a server")]
    NotConnected,

    /// The envelope could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport refused the payload.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
