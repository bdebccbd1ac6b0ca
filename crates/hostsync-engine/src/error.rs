//! Error types for simulation backends.

use hostsync_protocol::PeerId;

use crate::InstanceId;

/// Errors a [`Simulation`](crate::Simulation) backend may report.
///
/// The [`EngineAdapter`](crate::EngineAdapter) never lets these escape:
/// they are logged and turned into `None` / `false`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The handle doesn't name a live instance.
    #[error("unknown instance {0}")]
    UnknownInstance(InstanceId),

    /// The player isn't part of the instance.
    #[error("unknown player {0}")]
    UnknownPlayer(PeerId),

    /// The backend produced state it couldn't serialize, or was fed
    /// state it couldn't read.
    #[error("malformed state: {0}")]
    MalformedState(String),

    /// The action is valid on the wire but rejected by the game rules.
    #[error("action rejected: {0}")]
    Rejected(String),

    /// Anything else the backend wants to report.
    #[error("backend failure: {0}")]
    Backend(String),
}
