//! Client-side session management for Nearplay.
//!
//! A [`ClientManager`] finds a host advertising a service id, links to
//! it, sends the player's [`PlayerConnectionState`] and then routes the
//! host's payloads. Protocol notices (`CLIENT_CONNECTED`,
//! `ROOM_IS_FULL`) update [`ClientState`]; game data is handed to the
//! application as [`ServerAction`]s.
//!
//! ```text
//! Transport events → ClientManager → ClientState (observable)
//!                                  → ServerAction (dispatch fn)
//! ```
//!
//! [`PlayerConnectionState`]: nearplay_protocol::PlayerConnectionState

mod action;
mod error;
mod manager;
mod state;

pub use action::ServerAction;
pub use error::ClientError;
pub use manager::{ClientManager, ServerDispatch};
pub use state::{ClientState, ConnectionStatus};
