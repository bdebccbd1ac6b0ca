//! Facade tests: peers built through the builder, talking over the
//! in-memory mesh.

use std::time::Duration;

use hostsync::prelude::*;
use hostsync::room::SessionError;

fn drain(events: &mut hostsync::room::EventReceiver) -> Vec<GameEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

#[test]
fn test_builder_validates_config() {
    let peer = Peer::builder().tick_rate(0).max_players(0).build();
    assert_eq!(peer.game_config().tick_rate, 1);
    assert_eq!(peer.game_config().max_players, 1);
}

#[test]
fn test_builder_from_settings() {
    let mut settings = Settings::default();
    settings.game.sync_interval = 250;
    let peer = Peer::builder().settings(&settings).prediction(false).build();
    assert_eq!(peer.game_config().sync_interval, 250);
    assert!(!peer.game_config().prediction);
}

#[tokio::test(start_paused = true)]
async fn test_two_peers_share_a_room() {
    let hub = MemoryHub::new();
    let mut alice = Peer::builder().build();
    let mut bob = Peer::builder().build();

    let (a, _a_events) = alice.join(hub.join("lobby", "alice").unwrap()).unwrap();
    let (b, mut b_events) = bob.join(hub.join("lobby", "bob").unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(a.info().await.unwrap().is_host());
    assert_eq!(b.info().await.unwrap().host, Some(PeerId::from("alice")));

    let synced = drain(&mut b_events)
        .into_iter()
        .filter(|e| matches!(e, GameEvent::StateSynced(_)))
        .count();
    assert!(synced >= 2, "full sync plus at least one periodic sync, got {synced}");

    let lobby = RoomId::from("lobby");
    assert_eq!(alice.rooms(), vec![lobby.clone()]);
    assert_eq!(alice.local_id(&lobby), Some(&PeerId::from("alice")));
}

#[tokio::test(start_paused = true)]
async fn test_join_same_room_twice_fails() {
    let hub = MemoryHub::new();
    let mut peer = Peer::builder().build();
    peer.join(hub.join("R", "p1").unwrap()).unwrap();

    let err = peer.join(hub.join("R", "p1-again").unwrap()).unwrap_err();
    assert!(matches!(
        err,
        HostsyncError::Session(SessionError::AlreadyOpen(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_leave_hands_host_to_remaining_peer() {
    let hub = MemoryHub::new();
    let mut alice = Peer::builder().build();
    let mut bob = Peer::builder().build();
    let room = RoomId::from("lobby");

    alice.join(hub.join("lobby", "alice").unwrap()).unwrap();
    let (b, _b_events) = bob.join(hub.join("lobby", "bob").unwrap()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;

    alice.leave(&room).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    assert!(b.info().await.unwrap().is_host());
    assert!(alice.rooms().is_empty());
    assert!(matches!(
        alice.leave(&room).await,
        Err(HostsyncError::Session(SessionError::NotFound(_)))
    ));
}

#[test]
fn test_init_tracing_twice_is_harmless() {
    hostsync::telemetry::init_tracing("debug");
    hostsync::telemetry::init_tracing("info");
}
