//! Host-side session management for Nearplay.
//!
//! A [`ServerManager`] advertises a session, admits clients up to
//! [`ServerConfiguration::max_connections`], tells each admitted client
//! the host's role and routes client payloads to the application as
//! [`ClientAction`]s. The ordered list of connected endpoints lives in
//! the observable [`ServerState`].
//!
//! ```text
//! Transport events → ServerManager → ServerState (observable)
//!                                  → ClientAction (dispatch fn)
//! ```

mod action;
mod config;
mod error;
mod manager;
mod state;

pub use action::ClientAction;
pub use config::ServerConfiguration;
pub use error::ServerError;
pub use manager::{ClientDispatch, ServerManager};
pub use state::{ServerState, ServerStatus};
