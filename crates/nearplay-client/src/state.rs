//! Client connection state.

use nearplay_protocol::ServerRole;
use nearplay_transport::EndpointId;
use serde::{Deserialize, Serialize};

/// Where the client is in its connection lifecycle.
///
/// ```text
/// NONE ──connect()──→ CONNECTING ──result OK──→ CONNECTED ──→ CONNECTION_ESTABLISHED
///                        │                                          │
///                        ├──→ CONNECTING_FAILED                     ├──→ ROOM_IS_FULL
///                        ├──→ CONNECTING_REJECTED                   └──→ DISCONNECTED
///                        └──→ ENDPOINT_LOST
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    #[default]
    None,
    Connecting,
    ConnectingFailed,
    ConnectingRejected,
    EndpointLost,
    RoomIsFull,
    Connected,
    ConnectionEstablished,
    Disconnected,
}

impl ConnectionStatus {
    /// Returns `true` while a connection attempt or link is live.
    /// `connect()` is a no-op in these states.
    pub fn is_in_progress(self) -> bool {
        matches!(
            self,
            Self::Connecting | Self::Connected | Self::ConnectionEstablished
        )
    }

    /// Returns `true` once a link to the server exists.
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected | Self::ConnectionEstablished)
    }
}

/// Snapshot of the client's connection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientState {
    pub status: ConnectionStatus,
    /// The server's endpoint, once a connection result came back OK.
    pub server_endpoint_id: Option<EndpointId>,
    /// Learned from the server's `CLIENT_CONNECTED` notice.
    pub server_role: ServerRole,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_state_is_none_with_table_role() {
        let state = ClientState::default();
        assert_eq!(state.status, ConnectionStatus::None);
        assert_eq!(state.server_endpoint_id, None);
        assert_eq!(state.server_role, ServerRole::Table);
    }

    #[test]
    fn test_is_in_progress_covers_blocking_states_only() {
        use ConnectionStatus::*;
        let blocking = [Connecting, Connected, ConnectionEstablished];
        for status in [
            None,
            Connecting,
            ConnectingFailed,
            ConnectingRejected,
            EndpointLost,
            RoomIsFull,
            Connected,
            ConnectionEstablished,
            Disconnected,
        ] {
            assert_eq!(status.is_in_progress(), blocking.contains(&status));
        }
    }

    #[test]
    fn test_status_serializes_as_screaming_snake_case() {
        let json = serde_json::to_string(&ConnectionStatus::ConnectingRejected).unwrap();
        assert_eq!(json, "\"CONNECTING_REJECTED\"");
    }
}
