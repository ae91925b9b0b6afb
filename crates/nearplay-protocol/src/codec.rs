//! Codec trait and the JSON implementation.
//!
//! A codec turns a serde value into bytes for the transport and back.
//! Envelopes only need a self-describing format, because bodies are
//! carried as loose values until the receiver picks a concrete type.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` lets a manager own its codec for the lifetime
/// of a session without borrowing anything.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// ```rust
/// use nearplay_protocol::{Codec, JsonCodec, ServerRole};
///
/// let codec = JsonCodec;
/// let bytes = codec.encode(&ServerRole::Player).unwrap();
/// assert_eq!(bytes, br#""PLAYER""#);
///
/// let role: ServerRole = codec.decode(&bytes).unwrap();
/// assert_eq!(role, ServerRole::Player);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
