//! Host-authoritative game sessions over P2P rooms.
//!
//! Each room the local peer joins gets a session actor (a Tokio task) that
//! decides who is host, runs the simulation at a fixed rate, and keeps the
//! other peers in sync with periodic full-state broadcasts.
//!
//! # Key types
//!
//! - [`SessionManager`]: opens/closes sessions, one per room
//! - [`SessionHandle`]: send commands to a running session
//! - [`GameEvent`]: what a session reports back
//! - [`HostCoordinator`]: host election and failover state machine
//! - [`ActionQueue`]: FIFO buffer drained every tick
//! - [`StateSync`]: sync message construction and receipt
//! - [`PlayerRoster`]: admitted players and their last known view

mod coordinator;
mod error;
mod events;
mod manager;
mod players;
mod queue;
mod session;
mod sync;

pub use coordinator::{CoordinatorEffect, HostCoordinator, HostRole};
pub use error::SessionError;
pub use events::{EventReceiver, GameEvent};
pub use manager::SessionManager;
pub use players::{PlayerRecord, PlayerRoster, PlayerView, Position};
pub use queue::{ActionQueue, AppliedAction, QueuedAction};
pub use session::{SessionHandle, SessionInfo, SessionOptions, spawn_session};
pub use sync::{StateSync, SyncUpdate};
