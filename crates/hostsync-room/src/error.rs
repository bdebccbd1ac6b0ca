//! Error types for the session layer.

use hostsync_protocol::{ProtocolError, RoomId};
use hostsync_transport::TransportError;

/// Errors that can occur during session operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// No session is open for the room.
    #[error("no session for room {0}")]
    NotFound(RoomId),

    /// A session for the room is already open.
    #[error("session for room {0} already open")]
    AlreadyOpen(RoomId),

    /// The session actor has stopped.
    #[error("session for room {0} is unavailable")]
    Unavailable(RoomId),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
