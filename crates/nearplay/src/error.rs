//! Unified error type for Nearplay.

use nearplay_client::ClientError;
use nearplay_protocol::ProtocolError;
use nearplay_server::ServerError;
use nearplay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// When using the `nearplay` crate you deal with this single error type
/// instead of importing errors from each sub-crate; `?` converts them.
#[derive(Debug, thiserror::Error)]
pub enum NearplayError {
    /// A transport-level error (advertising, negotiation, delivery).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope could not be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A client-side send failed.
    #[error(transparent)]
    Client(#[from] ClientError),

    /// A server-side send failed or the configuration was invalid.
    #[error(transparent)]
    Server(#[from] ServerError),
}
