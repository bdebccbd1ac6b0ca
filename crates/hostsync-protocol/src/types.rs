//! Identity types, channel names, and the opaque state snapshot.
//!
//! Everything in this module travels on the wire between peers of a room.
//! Peer and room identifiers come from the P2P layer as strings, so they are
//! wrapped in newtypes rather than parsed into numbers.

use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identity of one participant in a room, as assigned by the P2P layer.
///
/// `Ord` is derived on purpose: host election under the `LowestPeerId`
/// policy relies on every peer sorting ids the same way, and the derived
/// impl is a plain lexicographic comparison of the inner string.
///
/// `#[serde(transparent)]` keeps the JSON shape a bare string
/// (`"peer-a"`), which is what the other peers put on the wire.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub String);

impl PeerId {
    /// Creates a peer id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Identity of a room. One room hosts exactly one game instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(pub String);

impl RoomId {
    /// Creates a room id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrows the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Deterministic 64-bit seed derived from the room id (FNV-1a).
    ///
    /// Every peer in a room computes the same value, so procedural content
    /// seeded from it stays identical across peers without coordination.
    pub fn derived_seed(&self) -> u64 {
        const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const PRIME: u64 = 0x0000_0100_0000_01b3;
        self.0.bytes().fold(OFFSET, |hash, byte| {
            (hash ^ u64::from(byte)).wrapping_mul(PRIME)
        })
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Channel: named logical channels over the room transport
// ---------------------------------------------------------------------------

/// The named channels a room multiplexes over its transport.
///
/// Each channel carries exactly one payload shape (see [`crate::Message`]).
/// The wire names are camelCase so they line up with the action names the
/// P2P layer registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    /// any → all: an action submitted by a peer.
    GameAction,
    /// host → all: an authoritative state snapshot.
    StateSync,
    /// any → all: a peer announcing itself and its player data.
    PlayerJoin,
    /// any → all: a peer announcing that it leaves the game.
    PlayerLeave,
    /// any → all: a peer claiming (or handing over) the host role.
    HostTransfer,
}

impl Channel {
    /// All channels, in declaration order.
    pub const ALL: [Channel; 5] = [
        Self::GameAction,
        Self::StateSync,
        Self::PlayerJoin,
        Self::PlayerLeave,
        Self::HostTransfer,
    ];

    /// The wire name of this channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GameAction => "gameAction",
            Self::StateSync => "stateSync",
            Self::PlayerJoin => "playerJoin",
            Self::PlayerLeave => "playerLeave",
            Self::HostTransfer => "hostTransfer",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Snapshot: opaque simulation state
// ---------------------------------------------------------------------------

/// A simulation state snapshot.
///
/// The protocol never looks inside: whatever JSON the simulation backend
/// produces is carried as-is, which keeps every layer above the engine
/// backend-agnostic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub serde_json::Value);

impl Snapshot {
    /// Wraps a JSON value.
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Borrows the underlying JSON.
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Unwraps into the underlying JSON.
    pub fn into_value(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for Snapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch.
///
/// Timestamps on the wire are wall-clock so that a receiver can estimate
/// one-way latency against its own clock.
pub fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
