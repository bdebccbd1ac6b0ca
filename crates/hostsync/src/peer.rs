//! `Peer`: the local participant, with one session per joined room.

use hostsync_engine::GameConfig;
use hostsync_protocol::{Codec, JsonCodec, PeerId, RoomId};
use hostsync_room::{EventReceiver, SessionHandle, SessionManager, SessionOptions};
use hostsync_transport::PeerRoom;

use crate::{HostsyncError, Settings};

/// Builder for a [`Peer`].
///
/// ```rust
/// use hostsync::prelude::*;
///
/// let peer = Peer::builder()
///     .tick_rate(30)
///     .sync_interval_ms(50)
///     .build();
/// assert_eq!(peer.game_config().tick_rate, 30);
/// ```
pub struct PeerBuilder {
    game: GameConfig,
}

impl PeerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            game: GameConfig::default(),
        }
    }

    /// Starts from loaded [`Settings`].
    pub fn settings(mut self, settings: &Settings) -> Self {
        self.game = settings.game.clone();
        self
    }

    /// Replaces the whole game config.
    pub fn game_config(mut self, game: GameConfig) -> Self {
        self.game = game;
        self
    }

    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.game.tick_rate = hz;
        self
    }

    pub fn sync_interval_ms(mut self, ms: u64) -> Self {
        self.game.sync_interval = ms;
        self
    }

    pub fn max_players(mut self, max: usize) -> Self {
        self.game.max_players = max;
        self
    }

    pub fn prediction(mut self, on: bool) -> Self {
        self.game.prediction = on;
        self
    }

    pub fn auto_start(mut self, on: bool) -> Self {
        self.game.auto_start = on;
        self
    }

    /// Builds a peer that encodes messages as JSON.
    pub fn build(self) -> Peer<JsonCodec> {
        self.build_with_codec(JsonCodec)
    }

    /// Builds a peer with a custom codec. Every peer in a room must use
    /// the same one.
    pub fn build_with_codec<C: Codec + Clone>(self, codec: C) -> Peer<C> {
        Peer {
            game: self.game.validated(),
            sessions: SessionManager::new(codec),
        }
    }
}

impl Default for PeerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The local participant.
///
/// Owns a [`SessionManager`]; each joined room runs its own session actor.
pub struct Peer<C: Codec + Clone = JsonCodec> {
    game: GameConfig,
    sessions: SessionManager<C>,
}

impl Peer<JsonCodec> {
    /// Creates a new builder.
    pub fn builder() -> PeerBuilder {
        PeerBuilder::new()
    }
}

impl<C: Codec + Clone> Peer<C> {
    /// Default config for sessions opened with [`join`](Self::join).
    pub fn game_config(&self) -> &GameConfig {
        &self.game
    }

    /// Opens a session on `room` with the peer's default config and no
    /// simulation backend.
    pub fn join<R: PeerRoom>(
        &mut self,
        room: R,
    ) -> Result<(SessionHandle, EventReceiver), HostsyncError> {
        self.join_with(room, SessionOptions::new(self.game.clone()))
    }

    /// Opens a session on `room` with explicit options.
    pub fn join_with<R: PeerRoom>(
        &mut self,
        room: R,
        options: SessionOptions,
    ) -> Result<(SessionHandle, EventReceiver), HostsyncError> {
        let room_id = room.room_id().clone();
        let local = room.local_peer().clone();
        let events = self.sessions.open(room, options)?;
        let handle = self
            .sessions
            .get(&room_id)
            .cloned()
            .ok_or_else(|| hostsync_room::SessionError::NotFound(room_id.clone()))?;
        tracing::info!(%room_id, peer = %local, "joined room");
        Ok((handle, events))
    }

    pub fn session(&self, room_id: &RoomId) -> Option<&SessionHandle> {
        self.sessions.get(room_id)
    }

    /// Leaves one room.
    pub async fn leave(&mut self, room_id: &RoomId) -> Result<(), HostsyncError> {
        self.sessions.close(room_id).await?;
        Ok(())
    }

    /// Leaves every room.
    pub async fn leave_all(&mut self) {
        self.sessions.close_all().await;
    }

    pub fn rooms(&self) -> Vec<RoomId> {
        self.sessions.room_ids()
    }

    /// Local peer id in `room_id`, if joined.
    pub fn local_id(&self, room_id: &RoomId) -> Option<&PeerId> {
        self.sessions.get(room_id).map(SessionHandle::local_peer)
    }
}
