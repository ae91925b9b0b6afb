//! Server configuration.

use nearplay_protocol::ServerRole;
use nearplay_transport::Strategy;
use serde::{Deserialize, Serialize};

use crate::ServerError;

/// Configuration for hosting one session.
///
/// Supplied to [`ServerManager::start_server`](crate::ServerManager::start_server)
/// and kept unchanged until the server is closed.
///
/// # Example
///
/// ```rust
/// use nearplay_protocol::ServerRole;
/// use nearplay_server::ServerConfiguration;
///
/// let config = ServerConfiguration {
///     role: ServerRole::Player,
///     max_connections: 3,
///     ..ServerConfiguration::default()
/// };
/// assert_eq!(config.display_name, "server");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfiguration {
    /// Whether the host also plays. Sent to every client on admission.
    pub role: ServerRole,

    /// Most clients that may be connected at once.
    pub max_connections: usize,

    /// Name shown to discovering clients.
    pub display_name: String,

    /// Topology requested from the transport when advertising.
    pub strategy: Strategy,
}

impl Default for ServerConfiguration {
    fn default() -> Self {
        Self {
            role: ServerRole::Table,
            max_connections: 4,
            display_name: "server".into(),
            strategy: Strategy::P2pStar,
        }
    }
}

impl ServerConfiguration {
    /// Checks that a session can be hosted with this configuration.
    ///
    /// # Errors
    /// [`ServerError::InvalidConfiguration`] if `max_connections` is zero
    /// or `display_name` is empty.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.max_connections == 0 {
            return Err(ServerError::InvalidConfiguration(
                "max_connections must be at least 1".into(),
            ));
        }
        if self.display_name.trim().is_empty() {
            return Err(ServerError::InvalidConfiguration(
                "display_name must not be empty".into(),
            ));
        }
        Ok(())
    }
}
