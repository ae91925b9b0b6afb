//! Error types for the protocol layer.
//!
//! Decode failures are kept distinct from encode failures: the session
//! managers treat "these bytes are not an envelope I understand" as a
//! signal to hand the raw payload to the application instead.

/// Errors that can occur in the protocol layer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: the bytes are not a valid encoded pair,
    /// the tag is not one the receiver expects, or the body doesn't match
    /// the requested type.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A registered type adapter refused the value.
    #[error("type adapter for {type_name} failed: {message}")]
    Adapter {
        type_name: &'static str,
        message: String,
    },
}

impl ProtocolError {
    /// Returns `true` for [`ProtocolError::Decode`].
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Builds an [`ProtocolError::Adapter`] error for type `B`.
    pub fn adapter<B: ?Sized>(message: impl Into<String>) -> Self {
        Self::Adapter {
            type_name: std::any::type_name::<B>(),
            message: message.into(),
        }
    }
}
