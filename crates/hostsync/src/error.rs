//! Unified error type for hostsync.

use hostsync_engine::EngineError;
use hostsync_protocol::ProtocolError;
use hostsync_room::SessionError;
use hostsync_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum HostsyncError {
    /// Joining or sending on a room failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Encoding, decoding or action validation failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A simulation backend reported an error.
    ///
    /// Sessions never return this: the engine adapter absorbs backend
    /// failures and reports "no update" instead. It exists for code that
    /// drives a [`Simulation`](hostsync_engine::Simulation) directly, such
    /// as backend setup or tooling, so it can use `?` into `HostsyncError`.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A session is missing, already open, or has stopped.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// An environment variable had an invalid value.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
