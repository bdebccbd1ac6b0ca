//! The `Simulation` trait: the contract a game backend implements.
//!
//! The session layer treats the game as a deterministic state-transition
//! function behind this trait. Instances are addressed by an opaque
//! [`InstanceId`] handed out by the backend, so one backend can serve
//! several rooms.

use std::fmt;
use std::time::Duration;

use hostsync_protocol::{Action, PeerId, RoomId, Snapshot};
use serde::{Deserialize, Serialize};

use crate::{EngineError, GameConfig};

/// Opaque handle to one simulation instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(pub u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "I-{}", self.0)
    }
}

/// Result of applying one action.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    /// State after the action.
    pub state: Snapshot,
    /// Whether the authoritative peer should push this state to the
    /// others right away instead of waiting for the next sync.
    pub broadcast: bool,
}

/// A game backend.
///
/// Every method may fail; the [`EngineAdapter`](crate::EngineAdapter)
/// absorbs the failure so callers only ever see "no update available".
pub trait Simulation: Send + 'static {
    /// Creates an instance for `room_id`.
    fn create_instance(
        &mut self,
        room_id: &RoomId,
        config: &GameConfig,
    ) -> Result<InstanceId, EngineError>;

    /// Applies `action` on behalf of `peer`.
    fn apply_action(
        &mut self,
        instance: InstanceId,
        peer: &PeerId,
        action: &Action,
    ) -> Result<ActionOutcome, EngineError>;

    /// Advances the instance by `elapsed` and returns the new state.
    fn tick(&mut self, instance: InstanceId, elapsed: Duration) -> Result<Snapshot, EngineError>;

    /// Adds a player. `Ok(false)` means the instance is full.
    fn add_player(
        &mut self,
        instance: InstanceId,
        peer: &PeerId,
        data: &serde_json::Value,
    ) -> Result<bool, EngineError>;

    /// Removes a player. `Ok(false)` means the player wasn't there.
    fn remove_player(&mut self, instance: InstanceId, peer: &PeerId) -> Result<bool, EngineError>;

    /// Tears the instance down. Unknown handles are ignored.
    fn destroy_instance(&mut self, instance: InstanceId);

    /// Current state of the instance.
    fn get_state(&self, instance: InstanceId) -> Result<Snapshot, EngineError>;
}
