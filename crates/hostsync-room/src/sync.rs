//! Authoritative state broadcast and receipt.
//!
//! The host builds [`SyncMessage`]s from the engine state; followers turn
//! incoming ones into [`SyncUpdate`]s for the consumer. Snapshots replace
//! local state wholesale, there is no delta encoding.

use hostsync_protocol::{Snapshot, SyncMessage};
use tracing::{debug, trace};

use crate::HostRole;

/// A received snapshot, as surfaced to the consumer.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    pub state: Snapshot,
    /// Host tick the snapshot was taken at.
    pub tick: u64,
    /// `now - timestamp` in ms, present only when interpolation is on.
    pub latency: Option<u64>,
    /// Catch-up snapshot sent on join.
    pub full_sync: bool,
    /// Older than a snapshot already received. Still delivered; the
    /// consumer decides whether to use it.
    pub stale: bool,
}

/// Per-session sync bookkeeping.
#[derive(Debug)]
pub struct StateSync {
    interpolation: bool,
    newest_tick: Option<u64>,
    last_state: Option<Snapshot>,
    sent: u64,
    received: u64,
}

impl StateSync {
    pub fn new(interpolation: bool) -> Self {
        Self {
            interpolation,
            newest_tick: None,
            last_state: None,
            sent: 0,
            received: 0,
        }
    }

    /// Builds the message for a broadcast of `state` at `tick`.
    pub fn outgoing(&mut self, state: Snapshot, tick: u64, full_sync: bool, now: u64) -> SyncMessage {
        self.sent += 1;
        trace!(tick, full_sync, "sync out");
        SyncMessage {
            state,
            timestamp: now,
            tick,
            full_sync,
        }
    }

    /// Handles a received message. Hosts ignore syncs and get `None`.
    pub fn incoming(&mut self, role: HostRole, msg: SyncMessage, now: u64) -> Option<SyncUpdate> {
        if role.is_host() {
            debug!(tick = msg.tick, "host ignoring state sync");
            return None;
        }
        self.received += 1;

        let stale = self.newest_tick.is_some_and(|newest| msg.tick < newest);
        if stale {
            debug!(tick = msg.tick, newest = ?self.newest_tick, "stale snapshot");
        } else {
            self.newest_tick = Some(msg.tick);
            self.last_state = Some(msg.state.clone());
        }

        let latency = self
            .interpolation
            .then(|| now.saturating_sub(msg.timestamp));

        Some(SyncUpdate {
            state: msg.state,
            tick: msg.tick,
            latency,
            full_sync: msg.full_sync,
            stale,
        })
    }

    /// Most recent non-stale snapshot received.
    pub fn last_state(&self) -> Option<&Snapshot> {
        self.last_state.as_ref()
    }

    /// Tick of the most recent non-stale snapshot received.
    pub fn newest_tick(&self) -> Option<u64> {
        self.newest_tick
    }

    /// Broadcasts built so far.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Snapshots accepted as follower so far, stale ones included.
    pub fn received(&self) -> u64 {
        self.received
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn msg(tick: u64, timestamp: u64) -> SyncMessage {
        SyncMessage {
            state: Snapshot::new(json!({ "tick": tick })),
            timestamp,
            tick,
            full_sync: false,
        }
    }

    #[test]
    fn test_outgoing_stamps_time_and_tick() {
        let mut sync = StateSync::new(true);
        let out = sync.outgoing(Snapshot::new(json!({"a": 1})), 42, true, 9_000);
        assert_eq!(out.tick, 42);
        assert_eq!(out.timestamp, 9_000);
        assert!(out.full_sync);
        assert_eq!(sync.sent(), 1);
    }

    #[test]
    fn test_follower_receives_with_latency() {
        let mut sync = StateSync::new(true);
        let update = sync.incoming(HostRole::Follower, msg(5, 1_000), 1_030).unwrap();
        assert_eq!(update.latency, Some(30));
        assert_eq!(update.tick, 5);
        assert!(!update.stale);
        assert_eq!(sync.last_state(), Some(&Snapshot::new(json!({"tick": 5}))));
    }

    #[test]
    fn test_latency_omitted_without_interpolation() {
        let mut sync = StateSync::new(false);
        let update = sync.incoming(HostRole::Follower, msg(1, 1_000), 1_030).unwrap();
        assert_eq!(update.latency, None);
    }

    #[test]
    fn test_host_ignores_incoming_sync() {
        let mut sync = StateSync::new(true);
        assert!(sync.incoming(HostRole::Host, msg(1, 0), 0).is_none());
        assert_eq!(sync.received(), 0);
        assert!(sync.last_state().is_none());
    }

    #[test]
    fn test_older_tick_flagged_stale_but_delivered() {
        let mut sync = StateSync::new(true);
        sync.incoming(HostRole::Follower, msg(10, 0), 0);
        let update = sync.incoming(HostRole::Follower, msg(8, 0), 0).unwrap();
        assert!(update.stale);
        assert_eq!(sync.newest_tick(), Some(10));
        assert_eq!(sync.last_state(), Some(&Snapshot::new(json!({"tick": 10}))));
    }

    #[test]
    fn test_future_timestamp_gives_zero_latency() {
        let mut sync = StateSync::new(true);
        let update = sync.incoming(HostRole::Follower, msg(1, 2_000), 1_000).unwrap();
        assert_eq!(update.latency, Some(0));
    }
}
