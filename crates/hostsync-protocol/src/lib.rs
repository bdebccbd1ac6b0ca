//! Wire protocol for hostsync.
//!
//! Defines what peers of a room say to each other:
//!
//! - **Types** ([`PeerId`], [`RoomId`], [`Channel`], [`Snapshot`]): identity
//!   and the opaque simulation state.
//! - **Actions** ([`Action`], [`ActionKind`]): the tagged set of things a
//!   player can do.
//! - **Messages** ([`Message`] and one payload struct per channel).
//! - **Codec** ([`Codec`], [`JsonCodec`]): bytes in, bytes out.
//!
//! ```text
//! Transport (channel, bytes) → Protocol (Message) → Session (roles, queue, sync)
//! ```

mod action;
mod codec;
mod error;
mod message;
mod types;

pub use action::{Action, ActionKind};
pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use message::{ActionMessage, Message, PlayerJoinMessage, SyncMessage};
pub use types::{Channel, PeerId, RoomId, Snapshot, unix_millis};
