//! Session actor: one Tokio task per room.
//!
//! The actor owns everything the local peer knows about the room: the
//! engine instance, the host coordinator, the action queue, the sync
//! bookkeeping and the player roster. A single `select!` loop multiplexes
//! consumer commands, transport events, the simulation timer and the sync
//! timer, so none of that state needs a lock.

use hostsync_engine::{ActionOutcome, EngineAdapter, GameConfig, InstanceId, Lifecycle, Simulation};
use hostsync_protocol::{
    Action, ActionMessage, Channel, Codec, Message, PeerId, PlayerJoinMessage, RoomId, Snapshot,
    unix_millis,
};
use hostsync_tick::{Fire, IntervalTimer, TimerConfig};
use hostsync_transport::{PeerRoom, RoomEvent};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{
    ActionQueue, CoordinatorEffect, EventReceiver, GameEvent, HostCoordinator, HostRole,
    PlayerRoster, SessionError, StateSync,
};

/// Command channel size for session actors.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// Everything needed to open a session besides the room itself.
pub struct SessionOptions {
    pub config: GameConfig,
    /// Sent to the other peers in the local `playerJoin`.
    pub player_data: Value,
    /// `None` runs the engine adapter in degraded mode.
    pub simulation: Option<Box<dyn Simulation>>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::new(GameConfig::default())
    }
}

impl SessionOptions {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            player_data: Value::Null,
            simulation: None,
        }
    }

    pub fn with_simulation(mut self, simulation: impl Simulation) -> Self {
        self.simulation = Some(Box::new(simulation));
        self
    }

    pub fn with_player_data(mut self, data: Value) -> Self {
        self.player_data = data;
        self
    }
}

/// Snapshot of session metadata (not the game state itself).
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub room_id: RoomId,
    pub local_peer: PeerId,
    /// `None` if the backend failed to create an instance.
    pub instance: Option<InstanceId>,
    pub role: HostRole,
    pub host: Option<PeerId>,
    pub lifecycle: Lifecycle,
    pub tick: u64,
    /// Admitted players, local peer included, in admission order.
    pub players: Vec<PeerId>,
    pub queued_actions: usize,
    pub syncs_sent: u64,
    pub syncs_received: u64,
    pub last_synced_tick: Option<u64>,
    pub degraded: bool,
}

impl SessionInfo {
    pub fn is_host(&self) -> bool {
        self.role.is_host()
    }
}

pub(crate) enum SessionCommand {
    Start {
        reply: oneshot::Sender<bool>,
    },
    Stop {
        reply: oneshot::Sender<bool>,
    },
    Submit {
        action: Action,
        reply: oneshot::Sender<Option<ActionOutcome>>,
    },
    BecomeHost {
        reply: oneshot::Sender<()>,
    },
    GetState {
        reply: oneshot::Sender<Option<Snapshot>>,
    },
    GetInfo {
        reply: oneshot::Sender<SessionInfo>,
    },
    RequestSave {
        reply: oneshot::Sender<()>,
    },
    AddPlayer {
        peer: PeerId,
        data: Value,
        reply: oneshot::Sender<bool>,
    },
    RemovePlayer {
        peer: PeerId,
        reply: oneshot::Sender<bool>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running session actor.
///
/// Cheap to clone. When every handle is dropped the session shuts down as
/// if [`SessionHandle::shutdown`] had been called.
#[derive(Clone, Debug)]
pub struct SessionHandle {
    room_id: RoomId,
    local_peer: PeerId,
    sender: mpsc::Sender<SessionCommand>,
}

impl SessionHandle {
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    pub fn local_peer(&self) -> &PeerId {
        &self.local_peer
    }

    /// `true` once the actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(command(reply_tx))
            .await
            .map_err(|_| SessionError::Unavailable(self.room_id.clone()))?;
        reply_rx
            .await
            .map_err(|_| SessionError::Unavailable(self.room_id.clone()))
    }

    /// Starts ticking. `false` if already playing.
    pub async fn start(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Start { reply }).await
    }

    /// Stops ticking and requests a save. `false` if not playing.
    pub async fn stop(&self) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::Stop { reply }).await
    }

    /// Submits a local action. Returns the predicted outcome when
    /// prediction is on and the engine produced one.
    pub async fn submit(&self, action: Action) -> Result<Option<ActionOutcome>, SessionError> {
        self.request(|reply| SessionCommand::Submit { action, reply }).await
    }

    /// Claims the host role. Idempotent.
    pub async fn become_host(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::BecomeHost { reply }).await
    }

    /// Current game state: the engine's while host, the latest synced
    /// snapshot while following (falling back to the engine's).
    pub async fn state(&self) -> Result<Option<Snapshot>, SessionError> {
        self.request(|reply| SessionCommand::GetState { reply }).await
    }

    pub async fn info(&self) -> Result<SessionInfo, SessionError> {
        self.request(|reply| SessionCommand::GetInfo { reply }).await
    }

    /// Emits [`GameEvent::SaveRequested`] with the current state.
    pub async fn request_save(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::RequestSave { reply }).await
    }

    /// Admits a player directly. `false` when the instance is full.
    pub async fn add_player(&self, peer: PeerId, data: Value) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::AddPlayer { peer, data, reply }).await
    }

    /// Removes a player and tells the other peers. `false` if unknown.
    pub async fn remove_player(&self, peer: PeerId) -> Result<bool, SessionError> {
        self.request(|reply| SessionCommand::RemovePlayer { peer, reply }).await
    }

    /// Leaves the room and stops the actor.
    pub async fn shutdown(&self) -> Result<(), SessionError> {
        self.request(|reply| SessionCommand::Shutdown { reply }).await
    }
}

/// The internal session state. Runs inside a Tokio task.
struct GameSession<R: PeerRoom, C: Codec> {
    room: R,
    codec: C,
    room_id: RoomId,
    local: PeerId,
    config: GameConfig,
    player_data: Value,
    engine: EngineAdapter,
    instance: Option<InstanceId>,
    lifecycle: Lifecycle,
    tick: u64,
    coordinator: HostCoordinator,
    queue: ActionQueue,
    sync: StateSync,
    roster: PlayerRoster,
    sim_timer: IntervalTimer,
    sync_timer: IntervalTimer,
    commands: mpsc::Receiver<SessionCommand>,
    events: mpsc::UnboundedSender<GameEvent>,
}

/// Whether the actor loop keeps going.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

impl<R: PeerRoom, C: Codec> GameSession<R, C> {
    /// Runs the actor loop until shutdown or until the transport closes.
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, peer = %self.local, "session actor started");

        loop {
            let flow = tokio::select! {
                cmd = self.commands.recv() => match cmd {
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        tracing::debug!(room_id = %self.room_id, "all handles dropped");
                        self.leave();
                        Flow::Exit
                    }
                },
                event = self.room.next_event() => match event {
                    Some(event) => {
                        self.handle_room_event(event);
                        Flow::Continue
                    }
                    None => {
                        tracing::info!(room_id = %self.room_id, "transport closed");
                        self.teardown();
                        Flow::Exit
                    }
                },
                fire = self.sim_timer.wait() => {
                    self.on_sim_tick(fire);
                    Flow::Continue
                }
                _ = self.sync_timer.wait() => {
                    self.on_sync_timer();
                    Flow::Continue
                }
            };
            if flow == Flow::Exit {
                break;
            }
        }

        tracing::info!(room_id = %self.room_id, peer = %self.local, "session actor stopped");
    }

    /// Creates the instance, admits the local player and runs the first
    /// election. Runs before the actor task is spawned, so a peer alone in
    /// the room is host by the time `spawn_session` returns.
    fn initialize(&mut self) {
        self.instance = self.engine.create_instance(&self.room_id, &self.config);
        if self.instance.is_none() {
            tracing::warn!(room_id = %self.room_id, "no engine instance, session runs without a simulation");
        }

        self.admit_player(self.local.clone(), self.player_data.clone());

        let existing = self.room.peers();
        let effects = self.coordinator.on_instance_created(&existing);
        self.apply(effects);

        self.broadcast(Message::PlayerJoin(PlayerJoinMessage {
            player_id: self.local.clone(),
            player_data: self.player_data.clone(),
        }));

        if self.config.auto_start {
            self.start();
        }
    }

    // -----------------------------------------------------------------
    // Commands
    // -----------------------------------------------------------------

    fn handle_command(&mut self, cmd: SessionCommand) -> Flow {
        match cmd {
            SessionCommand::Start { reply } => {
                let _ = reply.send(self.start());
            }
            SessionCommand::Stop { reply } => {
                let _ = reply.send(self.stop());
            }
            SessionCommand::Submit { action, reply } => {
                let _ = reply.send(self.submit(action));
            }
            SessionCommand::BecomeHost { reply } => {
                let effects = self.coordinator.become_host();
                self.apply(effects);
                let _ = reply.send(());
            }
            SessionCommand::GetState { reply } => {
                let _ = reply.send(self.current_state());
            }
            SessionCommand::GetInfo { reply } => {
                let _ = reply.send(self.info());
            }
            SessionCommand::RequestSave { reply } => {
                self.request_save();
                let _ = reply.send(());
            }
            SessionCommand::AddPlayer { peer, data, reply } => {
                let _ = reply.send(self.admit_player(peer, data));
            }
            SessionCommand::RemovePlayer { peer, reply } => {
                let removed = self.evict_player(&peer);
                if removed {
                    self.broadcast(Message::PlayerLeave(peer));
                }
                let _ = reply.send(removed);
            }
            SessionCommand::Shutdown { reply } => {
                self.leave();
                let _ = reply.send(());
                return Flow::Exit;
            }
        }
        Flow::Continue
    }

    fn start(&mut self) -> bool {
        if self.lifecycle.is_playing() {
            return false;
        }
        self.lifecycle = Lifecycle::Playing;
        if let Some(instance) = self.instance {
            self.engine.set_lifecycle(instance, Lifecycle::Playing);
        }
        self.sim_timer.start();
        if self.coordinator.is_host() {
            self.sync_timer.start();
        }
        tracing::info!(
            room_id = %self.room_id,
            tick = self.tick,
            tick_rate = self.config.tick_rate,
            host = self.coordinator.is_host(),
            "game started"
        );
        self.emit(GameEvent::Started { tick: self.tick });
        true
    }

    fn stop(&mut self) -> bool {
        if !self.lifecycle.is_playing() {
            return false;
        }
        self.lifecycle = Lifecycle::Waiting;
        if let Some(instance) = self.instance {
            self.engine.set_lifecycle(instance, Lifecycle::Waiting);
        }
        self.sim_timer.stop();
        self.sync_timer.stop();
        let dropped = self.queue.len();
        self.queue.clear();
        tracing::info!(room_id = %self.room_id, tick = self.tick, dropped, "game stopped");
        self.emit(GameEvent::Stopped { tick: self.tick });
        self.request_save();
        true
    }

    fn submit(&mut self, action: Action) -> Option<ActionOutcome> {
        if let Err(e) = action.validate() {
            tracing::debug!(room_id = %self.room_id, error = %e, "rejecting local action");
            return None;
        }
        let now = unix_millis();
        let prediction = self.config.prediction;
        let is_host = self.coordinator.is_host();

        let outcome = if prediction {
            self.instance
                .and_then(|instance| self.engine.apply_action(instance, &self.local, &action))
        } else {
            None
        };
        if let Some(outcome) = &outcome {
            self.emit(GameEvent::LocalActionApplied {
                action: action.clone(),
                outcome: outcome.clone(),
            });
            if is_host && outcome.broadcast {
                self.broadcast_state(false);
            }
        }

        self.broadcast(Message::GameAction(ActionMessage {
            action: action.clone(),
            timestamp: now,
            player_id: self.local.clone(),
        }));

        // Only a ticking peer ever drains its queue.
        if self.lifecycle.is_playing() && (!is_host || !prediction) {
            self.queue.enqueue(self.local.clone(), action, now);
        }
        outcome
    }

    fn request_save(&self) {
        self.emit(GameEvent::SaveRequested {
            state: self.current_state(),
            tick: self.tick,
        });
    }

    /// Announces departure, gives up the host role and leaves the room.
    fn leave(&mut self) {
        self.broadcast(Message::PlayerLeave(self.local.clone()));
        self.teardown();
        self.room.leave();
    }

    fn teardown(&mut self) {
        self.stop();
        let effects = self.coordinator.on_local_leave();
        self.apply(effects);
        self.sync_timer.stop();
        if let Some(instance) = self.instance.take() {
            self.engine.destroy_instance(instance);
        }
        self.queue.clear();
    }

    // -----------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------

    fn handle_room_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::PeerJoined(peer) => self.on_peer_joined(peer),
            RoomEvent::PeerLeft(peer) => self.on_peer_left(peer),
            RoomEvent::Message { from, channel, data } => self.on_message(from, channel, &data),
        }
    }

    fn on_peer_joined(&mut self, peer: PeerId) {
        tracing::debug!(room_id = %self.room_id, %peer, "peer connected");
        let effects = self.coordinator.on_peer_joined(&peer);

        if self.coordinator.is_host() {
            self.broadcast_state(true);
        }
        self.apply(effects);

        // The newcomer missed our broadcast join.
        self.send_to(
            &peer,
            Message::PlayerJoin(PlayerJoinMessage {
                player_id: self.local.clone(),
                player_data: self.player_data.clone(),
            }),
        );
    }

    fn on_peer_left(&mut self, peer: PeerId) {
        tracing::debug!(room_id = %self.room_id, %peer, "peer disconnected");
        self.evict_player(&peer);
        let effects = self.coordinator.on_peer_left(&peer);
        self.apply(effects);
    }

    fn on_message(&mut self, from: PeerId, channel: Channel, data: &[u8]) {
        let message = match Message::decode(&self.codec, channel, data) {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(
                    room_id = %self.room_id,
                    %from,
                    %channel,
                    error = %e,
                    "dropping malformed payload"
                );
                return;
            }
        };

        match message {
            Message::GameAction(msg) => self.on_remote_action(from, msg),
            Message::StateSync(msg) => {
                let role = self.coordinator.role();
                if let Some(update) = self.sync.incoming(role, msg, unix_millis()) {
                    if !update.stale {
                        self.roster.update_from_state(&update.state);
                    }
                    self.emit(GameEvent::StateSynced(update));
                }
            }
            Message::PlayerJoin(msg) => {
                if msg.player_id != from {
                    tracing::debug!(room_id = %self.room_id, %from, claimed = %msg.player_id, "playerJoin for another peer");
                }
                self.admit_player(from, msg.player_data);
            }
            Message::PlayerLeave(peer) => {
                if peer == self.local {
                    tracing::debug!(room_id = %self.room_id, %from, "ignoring playerLeave naming us");
                    return;
                }
                self.evict_player(&peer);
            }
            Message::HostTransfer(host) => {
                tracing::debug!(room_id = %self.room_id, %from, %host, "host announcement");
                let effects = self.coordinator.on_host_announced(&host);
                self.apply(effects);
            }
        }
    }

    fn on_remote_action(&mut self, from: PeerId, msg: ActionMessage) {
        if let Err(e) = msg.action.validate() {
            tracing::debug!(room_id = %self.room_id, %from, error = %e, "dropping invalid remote action");
            return;
        }
        if msg.player_id != from {
            tracing::debug!(room_id = %self.room_id, %from, claimed = %msg.player_id, "action attributed to sender");
        }
        self.emit(GameEvent::RemoteActionReceived {
            from: from.clone(),
            action: msg.action.clone(),
            timestamp: msg.timestamp,
        });
        if self.lifecycle.is_playing() {
            self.queue.enqueue(from, msg.action, msg.timestamp);
        }
    }

    // -----------------------------------------------------------------
    // Players
    // -----------------------------------------------------------------

    fn admit_player(&mut self, peer: PeerId, data: Value) -> bool {
        let accepted = match self.instance {
            Some(instance) => self.engine.add_player(instance, &peer, &data),
            None => true,
        };
        if !accepted {
            tracing::warn!(
                room_id = %self.room_id,
                %peer,
                max_players = self.config.max_players,
                "player rejected"
            );
            self.emit(GameEvent::PlayerRejected { player: peer });
            return false;
        }

        if self.roster.insert(peer.clone(), data.clone(), unix_millis()) {
            tracing::info!(
                room_id = %self.room_id,
                %peer,
                players = self.roster.len(),
                "player joined"
            );
            self.emit(GameEvent::PlayerJoined { player: peer, data });
        }
        true
    }

    fn evict_player(&mut self, peer: &PeerId) -> bool {
        if let Some(instance) = self.instance {
            self.engine.remove_player(instance, peer);
        }
        if self.roster.remove(peer).is_none() {
            return false;
        }
        tracing::info!(
            room_id = %self.room_id,
            %peer,
            players = self.roster.len(),
            "player left"
        );
        self.emit(GameEvent::PlayerLeft { player: peer.clone() });
        true
    }

    // -----------------------------------------------------------------
    // Timers
    // -----------------------------------------------------------------

    fn on_sim_tick(&mut self, fire: Fire) {
        let now = unix_millis();
        let applied = match self.instance {
            Some(instance) => self
                .queue
                .drain(now, self.config.prediction, &mut self.engine, instance),
            None => {
                self.queue.clear();
                Vec::new()
            }
        };
        let urgent = self.coordinator.is_host()
            && applied
                .iter()
                .any(|a| a.outcome.as_ref().is_some_and(|o| o.broadcast));

        self.tick += 1;
        let state = self
            .instance
            .and_then(|instance| self.engine.tick(instance, fire.elapsed));
        if let Some(state) = &state {
            self.roster.update_from_state(state);
        }
        tracing::trace!(room_id = %self.room_id, tick = self.tick, actions = applied.len(), "tick");
        self.emit(GameEvent::Tick {
            tick: self.tick,
            state,
        });

        if urgent {
            self.broadcast_state(false);
        }
        self.sim_timer.record_work_end();
    }

    fn on_sync_timer(&mut self) {
        if self.coordinator.is_host() && self.lifecycle.is_playing() {
            self.broadcast_state(false);
        }
    }

    // -----------------------------------------------------------------
    // Effects and output
    // -----------------------------------------------------------------

    fn apply(&mut self, effects: Vec<CoordinatorEffect>) {
        for effect in effects {
            match effect {
                CoordinatorEffect::StartTickLoop => {
                    // Tick numbering is room-wide: a new host carries on from
                    // the newest tick it has seen.
                    if let Some(newest) = self.sync.newest_tick() {
                        self.tick = self.tick.max(newest);
                    }
                    self.start();
                }
                CoordinatorEffect::StartSyncTimer => {
                    if self.lifecycle.is_playing() {
                        self.sync_timer.start();
                    }
                }
                CoordinatorEffect::StopSyncTimer => self.sync_timer.stop(),
                CoordinatorEffect::AnnounceHost(host) => {
                    self.broadcast(Message::HostTransfer(host));
                }
                CoordinatorEffect::HostChanged(host) => {
                    let is_local = host.as_ref() == Some(&self.local);
                    self.emit(GameEvent::HostChanged { host, is_local });
                }
            }
        }
    }

    fn broadcast_state(&mut self, full_sync: bool) {
        let Some(state) = self
            .instance
            .and_then(|instance| self.engine.get_state(instance))
        else {
            tracing::debug!(room_id = %self.room_id, "no state to broadcast");
            return;
        };
        let msg = self.sync.outgoing(state, self.tick, full_sync, unix_millis());
        self.broadcast(Message::StateSync(msg));
    }

    fn broadcast(&self, message: Message) {
        let channel = message.channel();
        match message.encode(&self.codec) {
            Ok(data) => {
                if let Err(e) = self.room.broadcast(channel, data) {
                    tracing::debug!(room_id = %self.room_id, %channel, error = %e, "broadcast failed");
                }
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, %channel, error = %e, "failed to encode message");
            }
        }
    }

    fn send_to(&self, peer: &PeerId, message: Message) {
        let channel = message.channel();
        match message.encode(&self.codec) {
            Ok(data) => {
                if let Err(e) = self.room.send_to(peer, channel, data) {
                    tracing::debug!(room_id = %self.room_id, %peer, %channel, error = %e, "send failed");
                }
            }
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, %channel, error = %e, "failed to encode message");
            }
        }
    }

    /// Drops silently if the consumer is gone.
    fn emit(&self, event: GameEvent) {
        let _ = self.events.send(event);
    }

    fn current_state(&self) -> Option<Snapshot> {
        let engine_state = || self.instance.and_then(|i| self.engine.get_state(i));
        match self.coordinator.role() {
            HostRole::Host => engine_state(),
            HostRole::Follower => self.sync.last_state().cloned().or_else(engine_state),
        }
    }

    fn info(&self) -> SessionInfo {
        SessionInfo {
            room_id: self.room_id.clone(),
            local_peer: self.local.clone(),
            instance: self.instance,
            role: self.coordinator.role(),
            host: self.coordinator.current_host().cloned(),
            lifecycle: self.lifecycle,
            tick: self.tick,
            players: self.roster.ids(),
            queued_actions: self.queue.len(),
            syncs_sent: self.sync.sent(),
            syncs_received: self.sync.received(),
            last_synced_tick: self.sync.newest_tick(),
            degraded: self.engine.is_degraded(),
        }
    }
}

/// Opens a session on `room` and spawns its actor.
///
/// Returns the handle and the event stream. Must be called from within a
/// Tokio runtime.
pub fn spawn_session<R: PeerRoom, C: Codec>(
    room: R,
    codec: C,
    options: SessionOptions,
) -> (SessionHandle, EventReceiver) {
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
    let (events_tx, events_rx) = mpsc::unbounded_channel();

    let room_id = room.room_id().clone();
    let local = room.local_peer().clone();
    let config = options.config.validated().seeded_for(&room_id);

    let mut session = GameSession {
        sim_timer: IntervalTimer::new(TimerConfig::from_rate_hz(config.tick_rate)),
        sync_timer: IntervalTimer::new(TimerConfig::from_period(config.sync_period())),
        coordinator: HostCoordinator::new(local.clone(), config.election, config.require_host),
        sync: StateSync::new(config.interpolation),
        engine: EngineAdapter::from_backend(options.simulation),
        instance: None,
        lifecycle: Lifecycle::Waiting,
        tick: 0,
        queue: ActionQueue::new(),
        roster: PlayerRoster::new(),
        player_data: options.player_data,
        commands: rx,
        events: events_tx,
        room,
        codec,
        room_id: room_id.clone(),
        local: local.clone(),
        config,
    };
    session.initialize();

    tokio::spawn(session.run());

    let handle = SessionHandle {
        room_id,
        local_peer: local,
        sender: tx,
    };
    (handle, events_rx)
}
