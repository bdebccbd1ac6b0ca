//! In-process mesh: every peer of a room gets an unbounded channel and the
//! hub fans messages out to it.
//!
//! Join order is preserved per room, which makes election by join order
//! reproducible in tests.

use std::collections::HashMap;
use std::sync::Arc;

use hostsync_protocol::{Channel, PeerId, RoomId};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::{PeerRoom, RoomEvent, TransportError};

struct Member {
    peer: PeerId,
    tx: mpsc::UnboundedSender<RoomEvent>,
}

/// Shared registry of rooms and their members.
///
/// Cheap to clone; all clones see the same rooms.
#[derive(Clone, Default)]
pub struct MemoryHub {
    rooms: Arc<Mutex<HashMap<RoomId, Vec<Member>>>>,
}

impl MemoryHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins `peer` to `room_id`, creating the room on first join.
    ///
    /// Existing members get [`RoomEvent::PeerJoined`] for the newcomer, and
    /// the newcomer gets one for each existing member, in join order.
    ///
    /// # Errors
    /// [`TransportError::DuplicatePeer`] if `peer` is already a member.
    pub fn join(
        &self,
        room_id: impl Into<RoomId>,
        peer: impl Into<PeerId>,
    ) -> Result<MemoryRoom, TransportError> {
        let room_id = room_id.into();
        let peer = peer.into();
        let (tx, rx) = mpsc::unbounded_channel();

        let mut rooms = self.rooms.lock();
        let members = rooms.entry(room_id.clone()).or_default();
        if members.iter().any(|m| m.peer == peer) {
            return Err(TransportError::DuplicatePeer(peer, room_id));
        }

        for member in members.iter() {
            let _ = member.tx.send(RoomEvent::PeerJoined(peer.clone()));
            let _ = tx.send(RoomEvent::PeerJoined(member.peer.clone()));
        }
        members.push(Member {
            peer: peer.clone(),
            tx,
        });
        tracing::debug!(%room_id, %peer, members = members.len(), "peer joined mesh");
        drop(rooms);

        Ok(MemoryRoom {
            hub: self.clone(),
            room_id,
            local: peer,
            rx,
            open: true,
        })
    }

    /// Number of peers currently in `room_id`.
    pub fn peer_count(&self, room_id: &RoomId) -> usize {
        self.rooms.lock().get(room_id).map_or(0, Vec::len)
    }

    fn remove(&self, room_id: &RoomId, peer: &PeerId) {
        let mut rooms = self.rooms.lock();
        let Some(members) = rooms.get_mut(room_id) else {
            return;
        };
        let before = members.len();
        members.retain(|m| &m.peer != peer);
        if members.len() == before {
            return;
        }
        for member in members.iter() {
            let _ = member.tx.send(RoomEvent::PeerLeft(peer.clone()));
        }
        tracing::debug!(%room_id, %peer, members = members.len(), "peer left mesh");
        if members.is_empty() {
            rooms.remove(room_id);
        }
    }

    fn deliver(
        &self,
        room_id: &RoomId,
        from: &PeerId,
        to: Option<&PeerId>,
        channel: Channel,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        let rooms = self.rooms.lock();
        let members = rooms
            .get(room_id)
            .ok_or_else(|| TransportError::Closed(room_id.clone()))?;

        match to {
            Some(target) => {
                let member = members
                    .iter()
                    .find(|m| &m.peer == target)
                    .ok_or_else(|| TransportError::UnknownPeer(target.clone()))?;
                let _ = member.tx.send(RoomEvent::Message {
                    from: from.clone(),
                    channel,
                    data,
                });
            }
            None => {
                for member in members.iter().filter(|m| &m.peer != from) {
                    let _ = member.tx.send(RoomEvent::Message {
                        from: from.clone(),
                        channel,
                        data: data.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// One peer's handle on a [`MemoryHub`] room. Leaves the room on drop.
pub struct MemoryRoom {
    hub: MemoryHub,
    room_id: RoomId,
    local: PeerId,
    rx: mpsc::UnboundedReceiver<RoomEvent>,
    open: bool,
}

impl PeerRoom for MemoryRoom {
    fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    fn local_peer(&self) -> &PeerId {
        &self.local
    }

    fn peers(&self) -> Vec<PeerId> {
        let rooms = self.hub.rooms.lock();
        rooms
            .get(&self.room_id)
            .map(|members| {
                members
                    .iter()
                    .filter(|m| m.peer != self.local)
                    .map(|m| m.peer.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    fn broadcast(&self, channel: Channel, data: Vec<u8>) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed(self.room_id.clone()));
        }
        self.hub.deliver(&self.room_id, &self.local, None, channel, data)
    }

    fn send_to(
        &self,
        peer: &PeerId,
        channel: Channel,
        data: Vec<u8>,
    ) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::Closed(self.room_id.clone()));
        }
        self.hub
            .deliver(&self.room_id, &self.local, Some(peer), channel, data)
    }

    async fn next_event(&mut self) -> Option<RoomEvent> {
        if !self.open {
            return None;
        }
        self.rx.recv().await
    }

    fn leave(&mut self) {
        if self.open {
            self.open = false;
            self.hub.remove(&self.room_id, &self.local);
            self.rx.close();
        }
    }
}

impl Drop for MemoryRoom {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn joined(hub: &MemoryHub, peer: &str) -> MemoryRoom {
        hub.join("R1", peer).unwrap()
    }

    #[tokio::test]
    async fn test_newcomer_sees_existing_peers_in_join_order() {
        let hub = MemoryHub::new();
        let _a = joined(&hub, "a");
        let _b = joined(&hub, "b");
        let mut c = joined(&hub, "c");

        assert_eq!(c.next_event().await, Some(RoomEvent::PeerJoined("a".into())));
        assert_eq!(c.next_event().await, Some(RoomEvent::PeerJoined("b".into())));
        assert_eq!(c.peers(), vec![PeerId::from("a"), PeerId::from("b")]);
    }

    #[tokio::test]
    async fn test_existing_peer_notified_of_newcomer() {
        let hub = MemoryHub::new();
        let mut a = joined(&hub, "a");
        let _b = joined(&hub, "b");
        assert_eq!(a.next_event().await, Some(RoomEvent::PeerJoined("b".into())));
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let hub = MemoryHub::new();
        let mut a = joined(&hub, "a");
        let mut b = joined(&hub, "b");
        let _ = a.next_event().await; // b joined
        let _ = b.next_event().await; // a present

        a.broadcast(Channel::HostTransfer, b"\"a\"".to_vec()).unwrap();

        let event = b.next_event().await.unwrap();
        assert_eq!(
            event,
            RoomEvent::Message {
                from: "a".into(),
                channel: Channel::HostTransfer,
                data: b"\"a\"".to_vec(),
            }
        );
        assert!(a.rx.try_recv().is_err(), "sender must not get its own broadcast");
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer_fails() {
        let hub = MemoryHub::new();
        let a = joined(&hub, "a");
        let result = a.send_to(&"ghost".into(), Channel::StateSync, vec![]);
        assert!(matches!(result, Err(TransportError::UnknownPeer(_))));
    }

    #[tokio::test]
    async fn test_leave_notifies_remaining_peers() {
        let hub = MemoryHub::new();
        let mut a = joined(&hub, "a");
        let b = joined(&hub, "b");
        let _ = a.next_event().await;

        drop(b);

        assert_eq!(a.next_event().await, Some(RoomEvent::PeerLeft("b".into())));
        assert_eq!(hub.peer_count(&"R1".into()), 1);
    }

    #[tokio::test]
    async fn test_leave_twice_is_noop_and_closes_events() {
        let hub = MemoryHub::new();
        let mut a = joined(&hub, "a");
        a.leave();
        a.leave();
        assert_eq!(a.next_event().await, None);
        assert!(a.broadcast(Channel::PlayerLeave, vec![]).is_err());
        assert_eq!(hub.peer_count(&"R1".into()), 0);
    }

    #[test]
    fn test_duplicate_peer_rejected() {
        let hub = MemoryHub::new();
        let _a = joined(&hub, "a");
        assert!(matches!(
            hub.join("R1", "a"),
            Err(TransportError::DuplicatePeer(..))
        ));
    }
}
