//! Error types for the transport layer.

use hostsync_protocol::{PeerId, RoomId};

/// Errors that can occur while talking to a room.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The local peer already left the room.
    #[error("room {0} is closed")]
    Closed(RoomId),

    /// A point-to-point send named a peer that isn't in the room.
    #[error("peer {0} is not in the room")]
    UnknownPeer(PeerId),

    /// A peer with this id is already present in the room.
    #[error("peer {0} already joined room {1}")]
    DuplicatePeer(PeerId, RoomId),
}
