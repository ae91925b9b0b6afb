//! Actions the client manager hands to the application.

/// Server payloads the client manager doesn't interpret itself.
///
/// Each variant carries the raw envelope bytes exactly as received. The
/// application decodes them against its own payload schema; the manager
/// only looks at the tag to pick the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// An `UPDATE_GAME_STATE` envelope.
    UpdateGameState(Vec<u8>),
    /// An `UPDATE_PLAYER_STATE` envelope.
    UpdatePlayerState(Vec<u8>),
    /// Anything else, including bytes that aren't an envelope at all.
    PayloadAction(Vec<u8>),
}

impl ServerAction {
    /// The raw payload, whatever the variant.
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::UpdateGameState(bytes)
            | Self::UpdatePlayerState(bytes)
            | Self::PayloadAction(bytes) => bytes,
        }
    }
}
