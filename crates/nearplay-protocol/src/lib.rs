//! Wire protocol for Nearplay.
//!
//! This crate defines what clients and servers say to each other over
//! the transport's opaque payload bytes:
//!
//! - **Envelopes** ([`Envelope`], [`EnvelopeCodec`], [`encode`],
//!   [`decode`]) — the `(tag, body)` pair every payload is wrapped in.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how values become
//!   bytes and back.
//! - **Types** ([`ClientPayloadType`], [`ServerPayloadType`],
//!   [`ServerRole`], [`PlayerConnectionState`], ...) — data shared by
//!   both sides of a session.
//! - **State** ([`StateCell`]) — observable state with a single writer.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw bytes) and the session
//! managers. It doesn't know about endpoints being connected or not; it
//! only knows how to wrap and unwrap payloads.
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope) → Client/Server managers
//! ```

// ---------------------------------------------------------------------------
// Module declarations
// ---------------------------------------------------------------------------

mod codec;
mod envelope;
mod error;
mod state;
mod types;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use codec::{Codec, JsonCodec};
pub use envelope::{
    Envelope, EnvelopeCodec, TypeAdapter, TypeAdapters, decode, encode,
    encode_tag,
};
pub use error::ProtocolError;
pub use state::StateCell;
pub use types::{
    ClientPayloadType, PlayerConnectionState, PlayerState, ResourceText,
    ServerPayloadType, ServerRole,
};

/// Service id used when the application doesn't pick its own.
pub const DEFAULT_SERVICE_ID: &str = "nearplay";
