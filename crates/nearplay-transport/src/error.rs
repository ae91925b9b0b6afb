use crate::EndpointId;

/// Errors that can occur in the transport layer.
///
/// These mirror the failure continuations of the proximity radio: a
/// discovery or advertising start that cannot begin, a connection request
/// to an endpoint that has vanished, or a send to a link that is gone.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Advertising was requested while already advertising.
    #[error("already advertising")]
    AlreadyAdvertising,

    /// Discovery was requested while already discovering.
    #[error("already discovering")]
    AlreadyDiscovering,

    /// The endpoint is not known to the transport (never seen or gone).
    #[error("unknown endpoint {0}")]
    UnknownEndpoint(EndpointId),

    /// A link to this endpoint already exists.
    #[error("already connected to endpoint {0}")]
    AlreadyConnected(EndpointId),

    /// A connection negotiation with this endpoint is already in flight.
    #[error("connection to endpoint {0} already pending")]
    ConnectionPending(EndpointId),

    /// Accept/reject was called without a pending negotiation.
    #[error("no pending connection with endpoint {0}")]
    NoPendingConnection(EndpointId),

    /// The payload could not be delivered because there is no link.
    #[error("endpoint {0} is not connected")]
    NotConnected(EndpointId),

    /// The transport was shut down.
    #[error("transport shut down")]
    Shutdown,
}
