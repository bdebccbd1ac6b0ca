//! # hostsync
//!
//! Host-authoritative state synchronization for peer-to-peer game rooms.
//!
//! One peer in each room is the host: it runs the simulation at a fixed
//! tick rate and broadcasts the full game state every sync interval. The
//! others predict their own actions locally, forward them to everyone, and
//! display whatever the host last sent. When the host leaves, the remaining
//! peers elect a successor.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hostsync::prelude::*;
//!
//! # async fn run() -> Result<(), HostsyncError> {
//! let settings = Settings::from_env()?;
//! hostsync::telemetry::init_tracing(&settings.log_level);
//!
//! let hub = MemoryHub::new();
//! let mut peer = Peer::builder().settings(&settings).build();
//! let (session, mut events) = peer.join(hub.join("lobby", "alice")?)?;
//!
//! session.submit(Action::new(ActionKind::Move { dx: 1, dy: 0 })).await?;
//! while let Some(event) = events.recv().await {
//!     if let GameEvent::StateSynced(update) = event {
//!         println!("tick {}", update.tick);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod peer;

pub mod config;
pub mod telemetry;

pub use config::{ConfigError, Settings};
pub use error::HostsyncError;
pub use peer::{Peer, PeerBuilder};

pub use hostsync_engine as engine;
pub use hostsync_protocol as protocol;
pub use hostsync_room as room;
pub use hostsync_tick as tick;
pub use hostsync_transport as transport;

pub mod prelude {
    pub use crate::config::Settings;
    pub use crate::{HostsyncError, Peer, PeerBuilder};

    pub use hostsync_engine::{
        ActionOutcome, EngineAdapter, EngineError, GameConfig, InstanceId, Lifecycle, Simulation,
    };
    pub use hostsync_protocol::{
        Action, ActionKind, Channel, Codec, JsonCodec, PeerId, RoomId, Snapshot,
    };
    pub use hostsync_room::{
        GameEvent, HostRole, SessionHandle, SessionInfo, SessionOptions, SyncUpdate,
    };
    pub use hostsync_transport::{MemoryHub, PeerRoom};
}
