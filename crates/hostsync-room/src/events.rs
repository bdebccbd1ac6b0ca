//! Events a session reports to its consumer.

use hostsync_engine::ActionOutcome;
use hostsync_protocol::{Action, PeerId, Snapshot};
use tokio::sync::mpsc;

use crate::SyncUpdate;

/// Receiving end of a session's event stream.
pub type EventReceiver = mpsc::UnboundedReceiver<GameEvent>;

#[derive(Debug, Clone, PartialEq)]
pub enum GameEvent {
    /// The simulation started ticking.
    Started { tick: u64 },

    /// The simulation stopped ticking.
    Stopped { tick: u64 },

    /// One simulation step ran. `state` is `None` when the engine produced
    /// no update.
    Tick { tick: u64, state: Option<Snapshot> },

    /// A local action was applied ahead of the host (prediction).
    LocalActionApplied { action: Action, outcome: ActionOutcome },

    /// An action from another peer arrived and was queued.
    RemoteActionReceived {
        from: PeerId,
        action: Action,
        timestamp: u64,
    },

    /// An authoritative snapshot arrived from the host.
    StateSynced(SyncUpdate),

    /// The known host changed. `host` is `None` while nobody is host.
    HostChanged { host: Option<PeerId>, is_local: bool },

    PlayerJoined {
        player: PeerId,
        data: serde_json::Value,
    },

    PlayerLeft { player: PeerId },

    /// The instance had no room for the player.
    PlayerRejected { player: PeerId },

    /// The consumer should persist this state. Emitted on stop and on
    /// request; nothing is written by the session itself.
    SaveRequested { state: Option<Snapshot>, tick: u64 },
}

impl GameEvent {
    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Started { .. } => "started",
            Self::Stopped { .. } => "stopped",
            Self::Tick { .. } => "tick",
            Self::LocalActionApplied { .. } => "localActionApplied",
            Self::RemoteActionReceived { .. } => "remoteActionReceived",
            Self::StateSynced(_) => "stateSynced",
            Self::HostChanged { .. } => "hostChanged",
            Self::PlayerJoined { .. } => "playerJoined",
            Self::PlayerLeft { .. } => "playerLeft",
            Self::PlayerRejected { .. } => "playerRejected",
            Self::SaveRequested { .. } => "saveRequested",
        }
    }
}
