//! Server session state.

use nearplay_protocol::ServerRole;
use nearplay_transport::EndpointId;
use serde::{Deserialize, Serialize};

/// Where the host is in its lifecycle.
///
/// - `None` — nothing started yet.
/// - `AdvertisingFailed` — advertising couldn't start, or a connection
///   negotiation failed. A `Rejected` result for an endpoint the server
///   turned away itself (room full, or no configuration) is expected and
///   doesn't land here.
/// - `Advertising` — clients can find and join the session.
/// - `Active` — advertising stopped, joined clients stay connected.
/// - `Closed` — the server was shut down.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerStatus {
    #[default]
    None,
    AdvertisingFailed,
    Advertising,
    Active,
    Closed,
}

impl ServerStatus {
    /// Returns `true` while the server hosts a session.
    /// `start_server()` is a no-op in these states.
    pub fn is_running(self) -> bool {
        matches!(self, Self::Advertising | Self::Active)
    }
}

/// Snapshot of the host's session.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerState {
    pub status: ServerStatus,
    pub role: ServerRole,
    /// Admitted clients in join order. Never holds duplicates.
    pub connected_endpoints: Vec<EndpointId>,
}

impl ServerState {
    pub fn connected_count(&self) -> usize {
        self.connected_endpoints.len()
    }

    pub fn is_connected(&self, endpoint: &EndpointId) -> bool {
        self.connected_endpoints.contains(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_running_only_when_advertising_or_active() {
        assert!(ServerStatus::Advertising.is_running());
        assert!(ServerStatus::Active.is_running());
        assert!(!ServerStatus::None.is_running());
        assert!(!ServerStatus::AdvertisingFailed.is_running());
        assert!(!ServerStatus::Closed.is_running());
    }

    #[test]
    fn test_state_json_shape() {
        let state = ServerState {
            status: ServerStatus::Active,
            role: ServerRole::Player,
            connected_endpoints: vec![EndpointId::from("ep1")],
        };
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "status": "ACTIVE",
                "role": "PLAYER",
                "connectedEndpoints": ["ep1"],
            })
        );
        assert_eq!(state.connected_count(), 1);
        assert!(state.is_connected(&EndpointId::from("ep1")));
    }
}
