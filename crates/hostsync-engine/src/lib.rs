//! Simulation backend contract for hostsync.
//!
//! # Key types
//!
//! - [`Simulation`]: the trait a game backend implements
//! - [`EngineAdapter`]: wraps an optional backend; never raises
//! - [`GameConfig`]: per-instance options (tick rate, sync interval, ...)
//! - [`Lifecycle`]: `Waiting` / `Playing`

mod adapter;
mod config;
mod error;
mod simulation;

pub use adapter::EngineAdapter;
pub use config::{ElectionPolicy, GameConfig, Lifecycle};
pub use error::EngineError;
pub use simulation::{ActionOutcome, InstanceId, Simulation};
