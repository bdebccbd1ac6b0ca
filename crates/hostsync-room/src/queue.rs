//! FIFO buffer of actions waiting for the next simulation step.
//!
//! Actions reach a session at arbitrary moments (a local `submit`, a
//! `gameAction` message from another peer) but the simulation only moves
//! on ticks. The queue bridges the two: actions are appended as they
//! arrive and the whole queue is drained, in arrival order, at the start
//! of the next tick.
//!
//! # Ordering
//!
//! Order is arrival order at this peer, not the sender's timestamp. Two
//! peers may therefore see remote actions in a different order; only the
//! host's order matters, because only the host's state is broadcast.
//! Nothing is deduplicated.
//!
//! # Who enqueues
//!
//! The session decides. A peer only queues while its simulation is
//! ticking, since an idle peer would never drain. The host with
//! prediction on applies its own actions immediately and skips the queue.
//!
//! # Latency compensation
//!
//! With prediction on, each drained action is stamped with how long it
//! waited (`now - enqueued_at`, saturating at zero for clocks that run
//! ahead). The simulation may use it to rewind or extrapolate; the queue
//! itself never interprets it.

use std::collections::VecDeque;

use hostsync_engine::{ActionOutcome, EngineAdapter, InstanceId};
use hostsync_protocol::{Action, PeerId};

/// An action waiting to be applied.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedAction {
    /// Peer the action is applied on behalf of.
    pub origin: PeerId,
    pub action: Action,
    /// Unix milliseconds when the action was submitted.
    pub enqueued_at: u64,
}

/// Result of applying one queued action.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedAction {
    pub origin: PeerId,
    /// The action as applied, including any latency compensation.
    pub action: Action,
    /// `None` when the engine produced no update.
    pub outcome: Option<ActionOutcome>,
}

/// Pending actions, applied in enqueue order.
#[derive(Debug, Default)]
pub struct ActionQueue {
    pending: VecDeque<QueuedAction>,
}

impl ActionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an action.
    pub fn enqueue(&mut self, origin: PeerId, action: Action, enqueued_at: u64) {
        self.pending.push_back(QueuedAction {
            origin,
            action,
            enqueued_at,
        });
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drops every pending action without applying it.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Applies every pending action to `instance` in FIFO order and empties
    /// the queue. Returns exactly one entry per action.
    ///
    /// With `prediction` on, each action carries
    /// `latency_compensation = now - enqueued_at` so the simulation can
    /// account for the delay.
    pub fn drain(
        &mut self,
        now: u64,
        prediction: bool,
        engine: &mut EngineAdapter,
        instance: InstanceId,
    ) -> Vec<AppliedAction> {
        self.pending
            .drain(..)
            .map(|queued| {
                let action = if prediction {
                    queued
                        .action
                        .with_latency_compensation(now.saturating_sub(queued.enqueued_at))
                } else {
                    queued.action
                };
                let outcome = engine.apply_action(instance, &queued.origin, &action);
                AppliedAction {
                    origin: queued.origin,
                    action,
                    outcome,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hostsync_engine::{EngineError, GameConfig, Simulation};
    use hostsync_protocol::{ActionKind, RoomId, Snapshot};
    use parking_lot::Mutex;
    use serde_json::json;

    use super::*;

    /// Backend that records every action it is handed.
    struct Recorder {
        seen: Arc<Mutex<Vec<(PeerId, Action)>>>,
    }

    impl Simulation for Recorder {
        fn create_instance(&mut self, _: &RoomId, _: &GameConfig) -> Result<InstanceId, EngineError> {
            Ok(InstanceId(1))
        }
        fn apply_action(&mut self, _: InstanceId, peer: &PeerId, action: &Action) -> Result<ActionOutcome, EngineError> {
            self.seen.lock().push((peer.clone(), action.clone()));
            let broadcast = matches!(action.kind, ActionKind::Attack { .. });
            Ok(ActionOutcome {
                state: Snapshot::new(json!({ "applied": self.seen.lock().len() })),
                broadcast,
            })
        }
        fn tick(&mut self, _: InstanceId, _: Duration) -> Result<Snapshot, EngineError> {
            Ok(Snapshot::default())
        }
        fn add_player(&mut self, _: InstanceId, _: &PeerId, _: &serde_json::Value) -> Result<bool, EngineError> {
            Ok(true)
        }
        fn remove_player(&mut self, _: InstanceId, _: &PeerId) -> Result<bool, EngineError> {
            Ok(true)
        }
        fn destroy_instance(&mut self, _: InstanceId) {}
        fn get_state(&self, _: InstanceId) -> Result<Snapshot, EngineError> {
            Ok(Snapshot::default())
        }
    }

    fn recording_engine() -> (EngineAdapter, InstanceId, Arc<Mutex<Vec<(PeerId, Action)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut engine = EngineAdapter::new(Box::new(Recorder { seen: seen.clone() }));
        let id = engine
            .create_instance(&RoomId::from("R"), &GameConfig::default())
            .unwrap();
        (engine, id, seen)
    }

    fn step(dx: i32) -> Action {
        Action::new(ActionKind::Move { dx, dy: 0 })
    }

    #[test]
    fn test_drain_applies_in_fifo_order() {
        let (mut engine, id, seen) = recording_engine();
        let mut queue = ActionQueue::new();
        queue.enqueue("a".into(), step(1), 100);
        queue.enqueue("b".into(), step(-1), 101);
        queue.enqueue("a".into(), Action::new(ActionKind::Wait), 102);

        let applied = queue.drain(110, false, &mut engine, id);

        assert_eq!(applied.len(), 3);
        assert!(queue.is_empty());
        let order: Vec<(PeerId, Action)> = seen.lock().clone();
        assert_eq!(
            order,
            vec![
                (PeerId::from("a"), step(1)),
                (PeerId::from("b"), step(-1)),
                (PeerId::from("a"), Action::new(ActionKind::Wait)),
            ]
        );
    }

    #[test]
    fn test_drain_with_prediction_sets_latency_compensation() {
        let (mut engine, id, seen) = recording_engine();
        let mut queue = ActionQueue::new();
        queue.enqueue("a".into(), step(1), 1_000);

        let applied = queue.drain(1_040, true, &mut engine, id);

        assert_eq!(applied[0].action.latency_compensation, Some(40));
        assert_eq!(seen.lock()[0].1.latency_compensation, Some(40));
    }

    #[test]
    fn test_drain_without_prediction_leaves_action_untouched() {
        let (mut engine, id, _) = recording_engine();
        let mut queue = ActionQueue::new();
        queue.enqueue("a".into(), step(1), 1_000);

        let applied = queue.drain(1_040, false, &mut engine, id);
        assert_eq!(applied[0].action.latency_compensation, None);
    }

    #[test]
    fn test_clock_skew_never_underflows() {
        let (mut engine, id, _) = recording_engine();
        let mut queue = ActionQueue::new();
        queue.enqueue("a".into(), step(1), 5_000);

        let applied = queue.drain(4_000, true, &mut engine, id);
        assert_eq!(applied[0].action.latency_compensation, Some(0));
    }

    #[test]
    fn test_one_result_per_action_even_when_engine_declines() {
        let mut engine = EngineAdapter::degraded();
        let mut queue = ActionQueue::new();
        // No instance was created, so every apply yields None.
        queue.enqueue("a".into(), step(1), 0);
        queue.enqueue("b".into(), step(1), 0);

        let applied = queue.drain(0, true, &mut engine, InstanceId(7));
        assert_eq!(applied.len(), 2);
        assert!(applied.iter().all(|a| a.outcome.is_none()));
    }

    #[test]
    fn test_broadcast_flag_surfaces_per_action() {
        let (mut engine, id, _) = recording_engine();
        let mut queue = ActionQueue::new();
        queue.enqueue("a".into(), step(1), 0);
        queue.enqueue("a".into(), Action::new(ActionKind::Attack { target: "b".into() }), 0);

        let applied = queue.drain(0, false, &mut engine, id);
        let flags: Vec<bool> = applied
            .iter()
            .map(|a| a.outcome.as_ref().is_some_and(|o| o.broadcast))
            .collect();
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_drain_empty_queue() {
        let mut engine = EngineAdapter::degraded();
        let mut queue = ActionQueue::new();
        assert!(queue.drain(0, true, &mut engine, InstanceId(1)).is_empty());
    }
}
