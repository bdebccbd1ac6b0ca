//! Session manager: one session per room the local peer is in.

use std::collections::HashMap;

use hostsync_protocol::{Codec, RoomId};
use hostsync_transport::PeerRoom;

use crate::session::spawn_session;
use crate::{EventReceiver, SessionError, SessionHandle, SessionInfo, SessionOptions};

/// Tracks the sessions of a single local peer, keyed by room.
///
/// Replaces any process-wide registry: callers own the manager and pass
/// it where it is needed.
pub struct SessionManager<C: Codec + Clone> {
    codec: C,
    sessions: HashMap<RoomId, SessionHandle>,
}

impl<C: Codec + Clone> SessionManager<C> {
    /// Creates an empty manager; every session it opens uses `codec`.
    pub fn new(codec: C) -> Self {
        Self {
            codec,
            sessions: HashMap::new(),
        }
    }

    /// Opens a session on `room`.
    ///
    /// Fails with [`SessionError::AlreadyOpen`] if a live session for the
    /// same room exists. A session whose actor has stopped is replaced.
    pub fn open<R: PeerRoom>(
        &mut self,
        room: R,
        options: SessionOptions,
    ) -> Result<EventReceiver, SessionError> {
        let room_id = room.room_id().clone();
        if let Some(existing) = self.sessions.get(&room_id) {
            if !existing.is_closed() {
                return Err(SessionError::AlreadyOpen(room_id));
            }
        }

        let (handle, events) = spawn_session(room, self.codec.clone(), options);
        self.sessions.insert(room_id.clone(), handle);
        tracing::info!(%room_id, "session opened");
        Ok(events)
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&SessionHandle> {
        self.sessions.get(room_id)
    }

    /// Returns info about a specific session.
    pub async fn info(&self, room_id: &RoomId) -> Result<SessionInfo, SessionError> {
        let handle = self
            .sessions
            .get(room_id)
            .ok_or_else(|| SessionError::NotFound(room_id.clone()))?;
        handle.info().await
    }

    /// Shuts a session down and forgets it.
    pub async fn close(&mut self, room_id: &RoomId) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .remove(room_id)
            .ok_or_else(|| SessionError::NotFound(room_id.clone()))?;

        // An actor that already stopped has nothing left to shut down.
        let _ = handle.shutdown().await;

        tracing::info!(%room_id, "session closed");
        Ok(())
    }

    /// Shuts every session down.
    pub async fn close_all(&mut self) {
        for (room_id, handle) in self.sessions.drain() {
            let _ = handle.shutdown().await;
            tracing::info!(%room_id, "session closed");
        }
    }

    pub fn room_ids(&self) -> Vec<RoomId> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
