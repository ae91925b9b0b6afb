//! The `(tag, body)` envelope that rides on the transport's opaque bytes.
//!
//! On the wire an envelope is an ordered pair: `[tag, body]`, where `body`
//! is `null` when absent. The receiver chooses the static types of both
//! halves when decoding. If the tag isn't one of the receiver's variants
//! (or the bytes aren't a pair at all) decoding fails with
//! [`ProtocolError::Decode`], and the caller can fall back to treating
//! the payload as raw application data.
//!
//! # Type adapters
//!
//! Most bodies just use their serde representation. When a body type
//! needs a different wire shape, register a [`TypeAdapter`] for it in a
//! [`TypeAdapters`] table. An [`EnvelopeCodec`] carries a default table,
//! and every call can pass an extra table that takes priority. Adapters
//! apply to the top-level body type only.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{Codec, JsonCodec, ProtocolError};

/// A decoded envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope<T, B = Value> {
    /// Payload-type discriminator.
    pub tag: T,
    /// Optional application data.
    pub body: Option<B>,
}

impl<T, B> Envelope<T, B> {
    pub fn new(tag: T, body: Option<B>) -> Self {
        Self { tag, body }
    }

    /// Splits into the `(tag, body)` pair.
    pub fn into_parts(self) -> (T, Option<B>) {
        (self.tag, self.body)
    }
}

/// A custom (de)serialization strategy for one body type.
pub trait TypeAdapter<B>: Send + Sync + 'static {
    /// Converts the body into its wire value.
    fn to_value(&self, body: &B) -> Result<Value, ProtocolError>;

    /// Rebuilds the body from its wire value.
    fn from_value(&self, value: Value) -> Result<B, ProtocolError>;
}

/// An explicit table of [`TypeAdapter`]s keyed by body type.
#[derive(Clone, Default)]
pub struct TypeAdapters {
    // Each value is an `Arc<dyn TypeAdapter<B>>` for the `B` of its key.
    adapters: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

impl TypeAdapters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `adapter` for body type `B`, replacing any previous one.
    pub fn register<B, A>(&mut self, adapter: A) -> &mut Self
    where
        B: 'static,
        A: TypeAdapter<B>,
    {
        let adapter: Arc<dyn TypeAdapter<B>> = Arc::new(adapter);
        self.adapters.insert(TypeId::of::<B>(), Arc::new(adapter));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<B, A>(mut self, adapter: A) -> Self
    where
        B: 'static,
        A: TypeAdapter<B>,
    {
        self.register::<B, A>(adapter);
        self
    }

    /// Looks up the adapter for body type `B`.
    pub fn get<B: 'static>(&self) -> Option<&Arc<dyn TypeAdapter<B>>> {
        self.adapters
            .get(&TypeId::of::<B>())
            .and_then(|entry| entry.downcast_ref::<Arc<dyn TypeAdapter<B>>>())
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

impl fmt::Debug for TypeAdapters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAdapters")
            .field("len", &self.adapters.len())
            .finish()
    }
}

/// Encodes and decodes envelopes with a codec and a default adapter table.
///
/// ## How a body is encoded
///
/// For a body of type `B`, the codec looks for an adapter in this order:
///
/// 1. the `adapters` table passed to the call,
/// 2. the codec's own default table,
/// 3. none, so `B`'s serde `Serialize` impl is used.
///
/// The result is a loose [`Value`], paired with the tag and handed to
/// the underlying [`Codec`] as a two-element array.
///
/// ## How a body is decoded
///
/// Decoding runs the same lookup backwards. The bytes are first read as
/// `(T, Value)`; the tag must be one of `T`'s variants. The body is then
/// turned into `B` by the adapter that wins the lookup, or by serde.
/// Decoding with `B = Value` keeps the body loose, which is how the
/// managers peek at the tag before deciding who owns the payload.
/// [`convert`](Self::convert) finishes the job later.
///
/// ## Generic over the codec
///
/// `C` defaults to [`JsonCodec`]. Any [`Codec`] works, as long as it can
/// round-trip a `serde_json::Value`: envelope bodies stay
/// self-describing until the receiver picks their type.
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec<C: Codec = JsonCodec> {
    codec: C,
    defaults: TypeAdapters,
}

impl EnvelopeCodec<JsonCodec> {
    /// A JSON envelope codec with no default adapters.
    pub fn json() -> Self {
        Self::default()
    }
}

impl<C: Codec> EnvelopeCodec<C> {
    pub fn new(codec: C, defaults: TypeAdapters) -> Self {
        Self { codec, defaults }
    }

    /// The default adapter table used by every call.
    pub fn defaults(&self) -> &TypeAdapters {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut TypeAdapters {
        &mut self.defaults
    }

    /// Encodes `(tag, body)` into bytes.
    ///
    /// `extra` adapters take priority over the codec's defaults.
    pub fn encode<T, B>(
        &self,
        tag: &T,
        body: Option<&B>,
        extra: Option<&TypeAdapters>,
    ) -> Result<Vec<u8>, ProtocolError>
    where
        T: Serialize,
        B: Serialize + 'static,
    {
        let body = match body {
            Some(body) => match self.adapter_for::<B>(extra) {
                Some(adapter) => adapter.to_value(body)?,
                None => serde_json::to_value(body).map_err(ProtocolError::Encode)?,
            },
            None => Value::Null,
        };
        self.codec.encode(&(tag, body))
    }

    /// Decodes bytes into an envelope with the expected tag and body types.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] if the bytes are not an encoded pair or
    /// either half doesn't match its expected type.
    pub fn decode<T, B>(
        &self,
        bytes: &[u8],
        extra: Option<&TypeAdapters>,
    ) -> Result<Envelope<T, B>, ProtocolError>
    where
        T: DeserializeOwned,
        B: DeserializeOwned + 'static,
    {
        let (tag, body): (T, Value) = self.codec.decode(bytes)?;
        let body = match body {
            Value::Null => None,
            value => Some(self.convert::<B>(value, extra)?),
        };
        Ok(Envelope { tag, body })
    }

    /// Converts a loosely decoded body into a concrete type.
    ///
    /// Useful after decoding with `B = Value` to peek at the tag first.
    pub fn convert<B>(
        &self,
        value: Value,
        extra: Option<&TypeAdapters>,
    ) -> Result<B, ProtocolError>
    where
        B: DeserializeOwned + 'static,
    {
        match self.adapter_for::<B>(extra) {
            Some(adapter) => adapter.from_value(value),
            None => serde_json::from_value(value).map_err(ProtocolError::Decode),
        }
    }

    fn adapter_for<'a, B: 'static>(
        &'a self,
        extra: Option<&'a TypeAdapters>,
    ) -> Option<&'a Arc<dyn TypeAdapter<B>>> {
        extra
            .and_then(|adapters| adapters.get::<B>())
            .or_else(|| self.defaults.get::<B>())
    }
}

/// Encodes `(tag, body)` with JSON and no default adapters.
///
/// ```rust
/// use nearplay_protocol::{decode, encode, ClientPayloadType, PlayerConnectionState};
///
/// let who = PlayerConnectionState::new("Ann", None);
/// let bytes = encode(&ClientPayloadType::EstablishConnection, Some(&who), None).unwrap();
/// assert!(bytes.starts_with(br#"["ESTABLISH_CONNECTION",{"#));
///
/// let env = decode::<ClientPayloadType, PlayerConnectionState>(&bytes, None).unwrap();
/// assert_eq!(env.tag, ClientPayloadType::EstablishConnection);
/// assert_eq!(env.body, Some(who));
/// ```
pub fn encode<T, B>(
    tag: &T,
    body: Option<&B>,
    adapters: Option<&TypeAdapters>,
) -> Result<Vec<u8>, ProtocolError>
where
    T: Serialize,
    B: Serialize + 'static,
{
    EnvelopeCodec::json().encode(tag, body, adapters)
}

/// Encodes an envelope that has only a tag.
pub fn encode_tag<T: Serialize>(tag: &T) -> Result<Vec<u8>, ProtocolError> {
    encode::<T, ()>(tag, None, None)
}

/// Decodes bytes with JSON and no default adapters.
pub fn decode<T, B>(
    bytes: &[u8],
    adapters: Option<&TypeAdapters>,
) -> Result<Envelope<T, B>, ProtocolError>
where
    T: DeserializeOwned,
    B: DeserializeOwned + 'static,
{
    EnvelopeCodec::json().decode(bytes, adapters)
}
