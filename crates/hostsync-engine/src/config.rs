//! Game configuration and lifecycle state.

use std::time::Duration;

use hostsync_protocol::RoomId;
use serde::{Deserialize, Serialize};
use tracing::warn;

// ---------------------------------------------------------------------------
// ElectionPolicy
// ---------------------------------------------------------------------------

/// How the successor host is picked when the current host leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ElectionPolicy {
    /// Lowest peer id (lexicographic) among the remaining members.
    /// Every peer reaches the same answer regardless of the order in
    /// which it saw the others join.
    #[default]
    LowestPeerId,

    /// First remaining member in local join order. Depends on each
    /// peer's own view of join order, so two peers can disagree.
    JoinOrder,
}

// ---------------------------------------------------------------------------
// GameConfig
// ---------------------------------------------------------------------------

/// Options for one game instance.
///
/// Deserializes from a camelCase JSON options object where every field
/// is optional:
///
/// ```rust
/// use hostsync_engine::GameConfig;
///
/// let config: GameConfig = serde_json::from_str(r#"{"tickRate": 30}"#).unwrap();
/// assert_eq!(config.tick_rate, 30);
/// assert_eq!(config.sync_interval, 100);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GameConfig {
    /// Simulation updates per second.
    pub tick_rate: u32,

    /// Milliseconds between authoritative state broadcasts.
    pub sync_interval: u64,

    /// Maximum players in the instance.
    pub max_players: usize,

    /// Start ticking as soon as the instance exists.
    pub auto_start: bool,

    /// Elect a host automatically on creation and on host loss.
    pub require_host: bool,

    /// Surface sync latency to the consumer for smoothing.
    pub interpolation: bool,

    /// Apply local actions immediately, before the host confirms.
    pub prediction: bool,

    /// Seed for procedural content. Derived from the room id when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_seed: Option<u64>,

    /// Successor selection on host loss.
    pub election: ElectionPolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            sync_interval: 100,
            max_players: 8,
            auto_start: false,
            require_host: true,
            interpolation: true,
            prediction: true,
            map_seed: None,
            election: ElectionPolicy::default(),
        }
    }
}

impl GameConfig {
    /// Highest accepted tick rate.
    pub const MAX_TICK_RATE: u32 = 128;

    /// Clamps out-of-range values:
    /// - `tick_rate` into `1..=MAX_TICK_RATE`
    /// - `sync_interval` to at least 1 ms
    /// - `max_players` to at least 1
    pub fn validated(mut self) -> Self {
        if self.tick_rate == 0 || self.tick_rate > Self::MAX_TICK_RATE {
            let clamped = self.tick_rate.clamp(1, Self::MAX_TICK_RATE);
            warn!(rate = self.tick_rate, clamped, "tick_rate out of range, clamping");
            self.tick_rate = clamped;
        }
        if self.sync_interval == 0 {
            warn!("sync_interval of 0 ms, using 1 ms");
            self.sync_interval = 1;
        }
        if self.max_players == 0 {
            warn!("max_players of 0, using 1");
            self.max_players = 1;
        }
        self
    }

    /// Fills in `map_seed` from the room id if it was not given.
    pub fn seeded_for(mut self, room_id: &RoomId) -> Self {
        if self.map_seed.is_none() {
            self.map_seed = Some(room_id.derived_seed());
        }
        self
    }

    /// Duration of one simulation tick.
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    /// Period of the state broadcast timer.
    pub fn sync_period(&self) -> Duration {
        Duration::from_millis(self.sync_interval.max(1))
    }
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

/// Whether the instance is ticking.
///
/// ```text
/// Waiting ⇄ Playing
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Lifecycle {
    #[default]
    Waiting,
    Playing,
}

impl Lifecycle {
    pub fn is_playing(&self) -> bool {
        matches!(self, Self::Playing)
    }
}

impl std::fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Waiting => write!(f, "waiting"),
            Self::Playing => write!(f, "playing"),
        }
    }
}
