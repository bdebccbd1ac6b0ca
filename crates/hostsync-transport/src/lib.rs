//! Room transport abstraction for hostsync.
//!
//! A [`PeerRoom`] is the local peer's view of one P2P room: it reports peers
//! joining and leaving, delivers messages on named [`Channel`]s, and sends
//! fire-and-forget to one peer or to everyone else. Connection setup,
//! signaling, and NAT traversal all live behind this trait.
//!
//! [`MemoryHub`] is an in-process mesh implementing the trait, used by the
//! tests and the demo.

mod error;
mod memory;

pub use error::TransportError;
pub use memory::{MemoryHub, MemoryRoom};

use std::future::Future;

use hostsync_protocol::{Channel, PeerId, RoomId};

/// Something that happened in the room, as seen by the local peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// A remote peer is now reachable. Also fired once per peer that was
    /// already present when the local peer joined.
    PeerJoined(PeerId),

    /// A remote peer left cleanly. This is the only failure signal the
    /// transport gives; a peer that silently stops responding never
    /// produces it.
    PeerLeft(PeerId),

    /// A message arrived on `channel`.
    Message {
        from: PeerId,
        channel: Channel,
        data: Vec<u8>,
    },
}

/// The local peer's membership in a P2P room.
///
/// Delivery is assumed reliable and ordered per sender. Sends never block
/// and are never acknowledged.
pub trait PeerRoom: Send + 'static {
    /// The room this handle belongs to.
    fn room_id(&self) -> &RoomId;

    /// The local peer's identity.
    fn local_peer(&self) -> &PeerId;

    /// Remote peers currently in the room, in the order they joined.
    fn peers(&self) -> Vec<PeerId>;

    /// Sends `data` on `channel` to every remote peer. The local peer does
    /// not receive its own broadcast.
    fn broadcast(&self, channel: Channel, data: Vec<u8>) -> Result<(), TransportError>;

    /// Sends `data` on `channel` to a single remote peer.
    fn send_to(
        &self,
        peer: &PeerId,
        channel: Channel,
        data: Vec<u8>,
    ) -> Result<(), TransportError>;

    /// Waits for the next room event. Resolves to `None` once the local
    /// peer has left.
    fn next_event(&mut self) -> impl Future<Output = Option<RoomEvent>> + Send;

    /// Leaves the room. Remote peers observe [`RoomEvent::PeerLeft`].
    /// Calling it twice is a no-op.
    fn leave(&mut self);
}
