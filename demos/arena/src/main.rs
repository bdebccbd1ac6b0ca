//! Arena demo: three peers share a room over the in-memory hub.
//!
//! Alice joins first and hosts. Carol walks up to Bob and hits him, then
//! Alice leaves and Bob takes over as host.
//!
//! Run with `cargo run -p arena`; set `HOSTSYNC_LOG=debug` for more detail.

mod arena;

use std::time::Duration;

use hostsync::prelude::*;
use hostsync::room::EventReceiver;
use serde_json::json;

use crate::arena::ArenaBackend;

const ROOM: &str = "arena-1";

// ---------------------------------------------------------------------------
// Event logging
// ---------------------------------------------------------------------------

async fn watch(name: &'static str, mut events: EventReceiver) {
    while let Some(event) = events.recv().await {
        match event {
            GameEvent::Tick { .. } => {}
            GameEvent::StateSynced(update) if !update.full_sync => {
                tracing::trace!(peer = name, tick = update.tick, "sync");
            }
            GameEvent::StateSynced(update) => {
                tracing::info!(peer = name, tick = update.tick, "full sync received");
            }
            GameEvent::HostChanged { host, is_local } => {
                tracing::info!(peer = name, host = ?host, is_local, "host changed");
            }
            GameEvent::PlayerJoined { player, data } => {
                tracing::info!(peer = name, %player, %data, "player joined");
            }
            GameEvent::PlayerLeft { player } => {
                tracing::info!(peer = name, %player, "player left");
            }
            other => tracing::debug!(peer = name, event = other.kind(), "event"),
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn position_of(state: &Snapshot, peer: &str) -> Option<(i32, i32)> {
    let pos = state.as_value().get("players")?.get(peer)?.get("position")?;
    Some((pos.get("x")?.as_i64()? as i32, pos.get("y")?.as_i64()? as i32))
}

/// Steps `walker` towards `target` until adjacent, trying the other axis
/// when a cell is blocked.
async fn approach(walker: &SessionHandle, target: &str) -> Result<bool, HostsyncError> {
    let me = walker.local_peer().as_str().to_string();
    let Some(mut state) = walker.state().await? else {
        return Ok(false);
    };
    for _ in 0..32 {
        let (Some(from), Some(to)) = (position_of(&state, &me), position_of(&state, target)) else {
            return Ok(false);
        };
        let (dx, dy) = ((to.0 - from.0).signum(), (to.1 - from.1).signum());
        if (to.0 - from.0).abs() <= 1 && (to.1 - from.1).abs() <= 1 {
            return Ok(true);
        }
        let mut moved = false;
        for (sx, sy) in [(dx, 0), (0, dy), (dx, dy)] {
            if sx == 0 && sy == 0 {
                continue;
            }
            if let Some(outcome) = walker.submit(Action::new(ActionKind::Move { dx: sx, dy: sy })).await? {
                state = outcome.state;
                moved = true;
                break;
            }
        }
        if !moved {
            return Ok(false);
        }
    }
    Ok(false)
}

async fn report(label: &str, session: &SessionHandle) -> Result<(), HostsyncError> {
    let info = session.info().await?;
    tracing::info!(
        peer = %info.local_peer,
        role = %info.role,
        host = ?info.host,
        tick = info.tick,
        players = info.players.len(),
        syncs_sent = info.syncs_sent,
        syncs_received = info.syncs_received,
        "{label}"
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), HostsyncError> {
    let settings = Settings::from_env()?;
    hostsync::telemetry::init_tracing(&settings.log_level);

    let hub = MemoryHub::new();
    let mut peers = Vec::new();
    let mut sessions = Vec::new();

    for name in ["alice", "bob", "carol"] {
        let mut peer = Peer::builder().settings(&settings).build();
        let options = SessionOptions::new(peer.game_config().clone())
            .with_simulation(ArenaBackend::new())
            .with_player_data(json!({ "name": name }));
        let (session, events) = peer.join_with(hub.join(ROOM, name)?, options)?;
        tokio::spawn(watch(name, events));
        peers.push(peer);
        sessions.push(session);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    // Let the host's full sync reach everyone.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let (alice, bob, carol) = (&sessions[0], &sessions[1], &sessions[2]);

    if approach(carol, "bob").await? {
        for _ in 0..3 {
            let hit = carol
                .submit(Action::new(ActionKind::Attack { target: "bob".into() }))
                .await?;
            tracing::info!(landed = hit.is_some(), "carol attacks bob");
        }
    } else {
        tracing::warn!("carol could not reach bob");
    }
    bob.submit(Action::new(ActionKind::UseItem { item: "potion".into() })).await?;

    tokio::time::sleep(Duration::from_millis(300)).await;
    for session in [alice, bob, carol] {
        report("before failover", session).await?;
    }

    let room_id = RoomId::from(ROOM);
    peers[0].leave(&room_id).await?;
    tokio::time::sleep(Duration::from_millis(300)).await;
    for session in [bob, carol] {
        report("after failover", session).await?;
    }

    if let Some(state) = bob.state().await? {
        tracing::info!(state = %state.as_value(), "final state");
    }

    for peer in &mut peers {
        peer.leave_all().await;
    }
    Ok(())
}
