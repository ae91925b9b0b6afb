//! Actions the server manager hands to the application.

use nearplay_transport::EndpointId;

/// Client events the server manager doesn't interpret itself.
///
/// Byte payloads are the raw envelopes exactly as received; the
/// application decodes them against its own payload schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// A connected client introduced itself. The envelope body is its
    /// [`PlayerConnectionState`](nearplay_protocol::PlayerConnectionState).
    EstablishConnection(EndpointId, Vec<u8>),
    /// A client left, either by saying so or by losing the link.
    Disconnect(EndpointId),
    /// Anything else a client sent, including bytes that aren't an
    /// envelope at all.
    PayloadAction(EndpointId, Vec<u8>),
}

impl ClientAction {
    /// The endpoint the action came from.
    pub fn endpoint(&self) -> &EndpointId {
        match self {
            Self::EstablishConnection(endpoint, _)
            | Self::Disconnect(endpoint)
            | Self::PayloadAction(endpoint, _) => endpoint,
        }
    }
}
