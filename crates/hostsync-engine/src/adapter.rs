//! `EngineAdapter`: the only way the session layer touches a simulation.
//!
//! Two jobs:
//!
//! 1. Absorb backend failures. Every `Err` from the backend is logged and
//!    turned into `None` / `false`; nothing is raised past this point.
//! 2. Run without a backend at all (degraded mode). Mutating calls become
//!    no-ops that report success, and `get_state` returns a small record
//!    the adapter keeps itself, so peer join/leave and host election keep
//!    working with nothing to simulate.

use std::collections::HashMap;
use std::time::Duration;

use hostsync_protocol::{Action, PeerId, RoomId, Snapshot};
use serde::Serialize;
use tracing::{debug, warn};

use crate::{ActionOutcome, EngineError, GameConfig, InstanceId, Lifecycle, Simulation};

/// What the adapter remembers about each instance, in both modes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct InstanceRecord {
    room_id: RoomId,
    config: GameConfig,
    /// Player ids in the order they were added.
    players: Vec<PeerId>,
    player_count: usize,
    lifecycle: Lifecycle,
    tick: u64,
}

impl InstanceRecord {
    fn snapshot(&self) -> Option<Snapshot> {
        match serde_json::to_value(self) {
            Ok(value) => Some(Snapshot::new(value)),
            Err(e) => {
                debug!(error = %e, "failed to serialize instance record");
                None
            }
        }
    }
}

/// Wraps an optional [`Simulation`] backend.
pub struct EngineAdapter {
    backend: Option<Box<dyn Simulation>>,
    records: HashMap<InstanceId, InstanceRecord>,
    /// Handle counter for degraded mode.
    next_local_id: u64,
}

impl EngineAdapter {
    /// Adapter over a real backend.
    pub fn new(backend: Box<dyn Simulation>) -> Self {
        Self::from_backend(Some(backend))
    }

    /// Adapter with no backend.
    pub fn degraded() -> Self {
        Self::from_backend(None)
    }

    /// Adapter over an optional backend.
    pub fn from_backend(backend: Option<Box<dyn Simulation>>) -> Self {
        if backend.is_none() {
            debug!("engine adapter running without a simulation backend");
        }
        Self {
            backend,
            records: HashMap::new(),
            next_local_id: 1,
        }
    }

    /// `true` when no backend was supplied.
    pub fn is_degraded(&self) -> bool {
        self.backend.is_none()
    }

    /// Creates an instance. Returns `None` only if the backend failed.
    pub fn create_instance(&mut self, room_id: &RoomId, config: &GameConfig) -> Option<InstanceId> {
        let instance = match self.backend.as_mut() {
            Some(backend) => match backend.create_instance(room_id, config) {
                Ok(id) => id,
                Err(e) => {
                    warn!(%room_id, error = %e, "backend failed to create instance");
                    return None;
                }
            },
            None => {
                let id = InstanceId(self.next_local_id);
                self.next_local_id += 1;
                id
            }
        };

        self.records.insert(
            instance,
            InstanceRecord {
                room_id: room_id.clone(),
                config: config.clone(),
                players: Vec::new(),
                player_count: 0,
                lifecycle: Lifecycle::Waiting,
                tick: 0,
            },
        );
        debug!(%room_id, %instance, degraded = self.is_degraded(), "instance created");
        Some(instance)
    }

    /// Applies an action for `peer`.
    ///
    /// `None` when the instance is unknown, the action fails schema
    /// validation, or the backend rejects it.
    pub fn apply_action(
        &mut self,
        instance: InstanceId,
        peer: &PeerId,
        action: &Action,
    ) -> Option<ActionOutcome> {
        if let Err(e) = action.validate() {
            debug!(%instance, %peer, error = %e, "dropping invalid action");
            return None;
        }
        let record = self.records.get(&instance)?;

        match self.backend.as_mut() {
            Some(backend) => ok_or_log(backend.apply_action(instance, peer, action), "apply_action"),
            None => Some(ActionOutcome {
                state: record.snapshot()?,
                broadcast: false,
            }),
        }
    }

    /// Advances the simulation by `elapsed`.
    pub fn tick(&mut self, instance: InstanceId, elapsed: Duration) -> Option<Snapshot> {
        let record = self.records.get_mut(&instance)?;
        record.tick += 1;

        match self.backend.as_mut() {
            Some(backend) => ok_or_log(backend.tick(instance, elapsed), "tick"),
            None => record.snapshot(),
        }
    }

    /// Adds a player. `false` when the instance is unknown, full, or the
    /// backend refuses. Adding a player twice is a no-op that succeeds.
    pub fn add_player(&mut self, instance: InstanceId, peer: &PeerId, data: &serde_json::Value) -> bool {
        let Some(record) = self.records.get_mut(&instance) else {
            debug!(%instance, %peer, "add_player on unknown instance");
            return false;
        };
        if record.players.contains(peer) {
            return true;
        }
        if record.players.len() >= record.config.max_players {
            debug!(%instance, %peer, max = record.config.max_players, "instance full");
            return false;
        }

        let accepted = match self.backend.as_mut() {
            Some(backend) => ok_or_log(backend.add_player(instance, peer, data), "add_player").unwrap_or(false),
            None => true,
        };
        if accepted {
            record.players.push(peer.clone());
            record.player_count = record.players.len();
        }
        accepted
    }

    /// Removes a player. `false` when the instance or player is unknown.
    pub fn remove_player(&mut self, instance: InstanceId, peer: &PeerId) -> bool {
        let Some(record) = self.records.get_mut(&instance) else {
            return false;
        };
        let Some(pos) = record.players.iter().position(|p| p == peer) else {
            return false;
        };
        record.players.remove(pos);
        record.player_count = record.players.len();

        match self.backend.as_mut() {
            Some(backend) => ok_or_log(backend.remove_player(instance, peer), "remove_player").unwrap_or(false),
            None => true,
        }
    }

    /// Destroys the instance. Unknown handles are ignored.
    pub fn destroy_instance(&mut self, instance: InstanceId) {
        if self.records.remove(&instance).is_none() {
            return;
        }
        if let Some(backend) = self.backend.as_mut() {
            backend.destroy_instance(instance);
        }
        debug!(%instance, "instance destroyed");
    }

    /// Current state. In degraded mode this is the adapter's own record:
    /// `{roomId, config, players, playerCount, lifecycle, tick}`.
    pub fn get_state(&self, instance: InstanceId) -> Option<Snapshot> {
        let record = self.records.get(&instance)?;
        match self.backend.as_ref() {
            Some(backend) => ok_or_log(backend.get_state(instance), "get_state"),
            None => record.snapshot(),
        }
    }

    /// Records the lifecycle change. `false` for unknown instances.
    pub fn set_lifecycle(&mut self, instance: InstanceId, lifecycle: Lifecycle) -> bool {
        match self.records.get_mut(&instance) {
            Some(record) => {
                record.lifecycle = lifecycle;
                true
            }
            None => false,
        }
    }

    /// Players the adapter has accepted into `instance`.
    pub fn player_count(&self, instance: InstanceId) -> Option<usize> {
        self.records.get(&instance).map(|r| r.players.len())
    }
}

fn ok_or_log<T>(result: Result<T, EngineError>, op: &'static str) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            debug!(op, error = %e, "simulation call failed, no update");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use hostsync_protocol::ActionKind;
    use serde_json::json;

    use super::*;

    fn peer(id: &str) -> PeerId {
        PeerId::from(id)
    }

    /// Backend whose every call fails.
    struct BrokenBackend;

    impl Simulation for BrokenBackend {
        fn create_instance(&mut self, _: &RoomId, _: &GameConfig) -> Result<InstanceId, EngineError> {
            Ok(InstanceId(99))
        }
        fn apply_action(&mut self, i: InstanceId, _: &PeerId, _: &Action) -> Result<ActionOutcome, EngineError> {
            Err(EngineError::UnknownInstance(i))
        }
        fn tick(&mut self, _: InstanceId, _: Duration) -> Result<Snapshot, EngineError> {
            Err(EngineError::MalformedState("truncated".into()))
        }
        fn add_player(&mut self, _: InstanceId, p: &PeerId, _: &serde_json::Value) -> Result<bool, EngineError> {
            Err(EngineError::UnknownPlayer(p.clone()))
        }
        fn remove_player(&mut self, _: InstanceId, _: &PeerId) -> Result<bool, EngineError> {
            Err(EngineError::Backend("boom".into()))
        }
        fn destroy_instance(&mut self, _: InstanceId) {}
        fn get_state(&self, _: InstanceId) -> Result<Snapshot, EngineError> {
            Err(EngineError::MalformedState("bad json".into()))
        }
    }

    #[test]
    fn test_degraded_add_player_and_state() {
        let mut engine = EngineAdapter::degraded();
        let room = RoomId::from("R1");
        let id = engine.create_instance(&room, &GameConfig::default()).unwrap();

        assert!(engine.add_player(id, &peer("p1"), &json!({"name": "ann"})));

        let state = engine.get_state(id).unwrap().into_value();
        assert_eq!(state["roomId"], "R1");
        assert_eq!(state["playerCount"], 1);
        assert_eq!(state["players"], json!(["p1"]));
        assert_eq!(state["lifecycle"], "waiting");
    }

    #[test]
    fn test_degraded_handles_are_unique() {
        let mut engine = EngineAdapter::degraded();
        let a = engine.create_instance(&"A".into(), &GameConfig::default()).unwrap();
        let b = engine.create_instance(&"B".into(), &GameConfig::default()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_degraded_capacity_enforced() {
        let mut engine = EngineAdapter::degraded();
        let config = GameConfig { max_players: 2, ..GameConfig::default() };
        let id = engine.create_instance(&"R".into(), &config).unwrap();

        assert!(engine.add_player(id, &peer("a"), &json!(null)));
        assert!(engine.add_player(id, &peer("b"), &json!(null)));
        assert!(!engine.add_player(id, &peer("c"), &json!(null)));
        // Re-adding a present player is not a capacity violation.
        assert!(engine.add_player(id, &peer("a"), &json!(null)));
        assert_eq!(engine.player_count(id), Some(2));
    }

    #[test]
    fn test_unknown_instance_degrades_to_none_and_false() {
        let mut engine = EngineAdapter::degraded();
        let ghost = InstanceId(404);
        assert!(engine.get_state(ghost).is_none());
        assert!(engine.tick(ghost, Duration::from_millis(16)).is_none());
        assert!(!engine.add_player(ghost, &peer("a"), &json!(null)));
        assert!(!engine.remove_player(ghost, &peer("a")));
        assert!(!engine.set_lifecycle(ghost, Lifecycle::Playing));
        let action = Action::new(ActionKind::Wait);
        assert!(engine.apply_action(ghost, &peer("a"), &action).is_none());
    }

    #[test]
    fn test_invalid_action_rejected_at_boundary() {
        let mut engine = EngineAdapter::degraded();
        let id = engine.create_instance(&"R".into(), &GameConfig::default()).unwrap();
        let bad = Action::new(ActionKind::Move { dx: 5, dy: 0 });
        assert!(engine.apply_action(id, &peer("a"), &bad).is_none());

        let good = Action::new(ActionKind::Move { dx: 1, dy: 0 });
        let outcome = engine.apply_action(id, &peer("a"), &good).unwrap();
        assert!(!outcome.broadcast);
    }

    #[test]
    fn test_degraded_tick_and_lifecycle_show_in_state() {
        let mut engine = EngineAdapter::degraded();
        let id = engine.create_instance(&"R".into(), &GameConfig::default()).unwrap();
        engine.set_lifecycle(id, Lifecycle::Playing);
        engine.tick(id, Duration::from_millis(16));
        let state = engine.tick(id, Duration::from_millis(16)).unwrap().into_value();
        assert_eq!(state["tick"], 2);
        assert_eq!(state["lifecycle"], "playing");
    }

    #[test]
    fn test_backend_errors_never_escape() {
        let mut engine = EngineAdapter::new(Box::new(BrokenBackend));
        let id = engine.create_instance(&"R".into(), &GameConfig::default()).unwrap();
        assert_eq!(id, InstanceId(99));

        assert!(!engine.add_player(id, &peer("a"), &json!(null)));
        assert_eq!(engine.player_count(id), Some(0));
        assert!(engine.tick(id, Duration::from_millis(16)).is_none());
        assert!(engine.get_state(id).is_none());
        let action = Action::new(ActionKind::Interact);
        assert!(engine.apply_action(id, &peer("a"), &action).is_none());
    }

    #[test]
    fn test_destroy_forgets_instance() {
        let mut engine = EngineAdapter::degraded();
        let id = engine.create_instance(&"R".into(), &GameConfig::default()).unwrap();
        engine.destroy_instance(id);
        assert!(engine.get_state(id).is_none());
        engine.destroy_instance(id);
    }
}
