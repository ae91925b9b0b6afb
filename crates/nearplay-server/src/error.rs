//! Error types for the server session layer.

use nearplay_protocol::ProtocolError;
use nearplay_transport::TransportError;

/// Errors returned by the server manager's send helpers and by
/// configuration validation.
///
/// Advertising and connection failures never show up here; they become
/// [`ServerStatus`](crate::ServerStatus) transitions instead.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The configuration can't be used to host a session.
    #[error("invalid server configuration: {0}")]
    InvalidConfiguration(String),

    /// The envelope could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The transport refused the payload.
    #[error(transparent)]
    Transport(#[from] TransportError),
}
