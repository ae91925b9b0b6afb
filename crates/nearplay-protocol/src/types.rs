//! Shared protocol types: payload tags, roles, and player identity.
//!
//! Tags serialize as their SCREAMING_SNAKE_CASE names (`"ROOM_IS_FULL"`),
//! so an application can decode an envelope's tag either as one of these
//! enums or as a plain `String` for its own tag set.

use nearplay_transport::EndpointId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Payload tags
// ---------------------------------------------------------------------------

/// Tags of envelopes sent client → server.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientPayloadType {
    /// Carries the [`PlayerConnectionState`] right after linking.
    EstablishConnection,
    /// The client is leaving; handled like a link loss.
    ActionDisconnected,
}

/// Tags of envelopes sent server → client.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerPayloadType {
    /// Admission notice; body is the server's [`ServerRole`].
    ClientConnected,
    /// Capacity notice; no body. The server drops the link right after.
    RoomIsFull,
    /// Application data for one player's state.
    UpdatePlayerState,
    /// Application data for the shared game state.
    UpdateGameState,
}

// ---------------------------------------------------------------------------
// Roles and identity
// ---------------------------------------------------------------------------

/// What the hosting device is in the game.
///
/// A `Table` host only shows the shared game (a board on a tablet in the
/// middle); a `Player` host also takes part as a player.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerRole {
    Player,
    #[default]
    Table,
}

impl std::fmt::Display for ServerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Player => write!(f, "PLAYER"),
            Self::Table => write!(f, "TABLE"),
        }
    }
}

/// The identity a client presents once, at connection establishment.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerConnectionState {
    /// Display name. Also used as the name in connection requests.
    pub nickname: String,
    /// Optional application resource id for the player's avatar.
    pub avatar_id: Option<u32>,
}

impl PlayerConnectionState {
    pub fn new(nickname: impl Into<String>, avatar_id: Option<u32>) -> Self {
        Self {
            nickname: nickname.into(),
            avatar_id,
        }
    }
}

/// A player as the host's game state tracks it.
///
/// Built by the application when it admits an
/// `EstablishConnection` action; `id` is the endpoint the player
/// connected from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub nickname: String,
    pub id: EndpointId,
    pub is_server: bool,
    pub avatar_id: Option<u32>,
}

impl PlayerState {
    /// Builds the record for a player who connected from `id`.
    pub fn from_connection(id: EndpointId, identity: PlayerConnectionState) -> Self {
        Self {
            nickname: identity.nickname,
            id,
            is_server: false,
            avatar_id: identity.avatar_id,
        }
    }

    /// Builds the record for the host itself when it plays.
    pub fn host(id: EndpointId, identity: PlayerConnectionState) -> Self {
        Self {
            is_server: true,
            ..Self::from_connection(id, identity)
        }
    }
}

// ---------------------------------------------------------------------------
// ResourceText
// ---------------------------------------------------------------------------

/// A reference to localized text, resolved by the receiving device.
///
/// Hosts send these instead of rendered strings so every device shows
/// text in its own locale. Resolving the resource ids is up to the
/// application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all_fields = "camelCase")]
pub enum ResourceText {
    /// A single string with format arguments.
    StringResource {
        res_id: u32,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// A quantity-dependent string with format arguments.
    PluralResource {
        res_id: u32,
        quantity: u32,
        #[serde(default)]
        args: Vec<Value>,
    },
    /// One entry of a string array.
    ArrayResource {
        res_id: u32,
        #[serde(default)]
        index: usize,
    },
}

impl ResourceText {
    /// The resource id, whatever the variant.
    pub fn res_id(&self) -> u32 {
        match self {
            Self::StringResource { res_id, .. }
            | Self::PluralResource { res_id, .. }
            | Self::ArrayResource { res_id, .. } => *res_id,
        }
    }
}
