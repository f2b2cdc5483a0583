//! Background sequencing worker behavior

mod helpers;

use std::sync::Arc;
use std::time::Duration;
use trackdeck_common::events::{EventBus, PlayerEvent};
use trackdeck_player::playback::device::SimulatedOutput;
use trackdeck_player::playback::engine::EngineState;
use trackdeck_player::playback::{PlaybackEngine, PlaylistOrchestrator};

use helpers::{build_player, next_event, wait_for, StaticResolver};

#[tokio::test]
async fn test_playlist_plays_through_in_order() {
    let fixture = build_player(
        StaticResolver::new()
            .with_track("t1", 30)
            .with_track("t2", 30),
    );
    let mut rx = fixture.events.subscribe();

    fixture.player.add("t1").await.unwrap();
    fixture.player.add("t2").await.unwrap();
    fixture.player.play().await;

    let mut observed = Vec::new();
    for _ in 0..10 {
        observed.push(next_event(&mut rx).await.event_type());
    }
    assert_eq!(
        observed,
        vec![
            "SongAdded",
            "SongAdded",
            "Loading",
            "StartPlaying",
            "Stopped",
            "Ready",
            "Loading",
            "StartPlaying",
            "Stopped",
            "Ready",
        ]
    );

    // Nothing follows the final Ready
    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err());
    assert_eq!(fixture.player.cursor().await, 2);
}

#[tokio::test]
async fn test_loading_carries_uri_and_start_carries_entry() {
    let fixture = build_player(StaticResolver::new().with_track("t1", 30));
    let mut rx = fixture.events.subscribe();

    fixture.player.add("t1").await.unwrap();
    fixture.player.play().await;

    let loading = wait_for(&mut rx, |e| matches!(e, PlayerEvent::Loading { .. })).await;
    assert_eq!(loading, PlayerEvent::Loading { uri: "t1".into() });

    let started = next_event(&mut rx).await;
    match started {
        PlayerEvent::StartPlaying { entry } => assert_eq!(entry.id, "t1"),
        other => panic!("expected StartPlaying, got {:?}", other),
    }
}

#[tokio::test]
async fn test_play_on_empty_playlist_is_silent() {
    let fixture = build_player(StaticResolver::new());
    let mut rx = fixture.events.subscribe();

    fixture.player.play().await;

    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err());
    assert_eq!(fixture.player.engine_state().await, EngineState::Idle);
}

#[tokio::test]
async fn test_add_is_fifo_and_emits_song_added() {
    let fixture = build_player(
        StaticResolver::new()
            .with_track("t1", 5_000)
            .with_track("t2", 5_000),
    );
    let mut rx = fixture.events.subscribe();

    fixture.player.add("t1").await.unwrap();
    fixture.player.add("t2").await.unwrap();

    for expected in ["t1", "t2"] {
        match next_event(&mut rx).await {
            PlayerEvent::SongAdded { entry } => assert_eq!(entry.id, expected),
            other => panic!("expected SongAdded, got {:?}", other),
        }
    }

    let ids: Vec<String> = fixture
        .player
        .playlist()
        .await
        .into_iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(ids, vec!["t1", "t2"]);
}

#[tokio::test]
async fn test_concurrent_adds_emit_in_playlist_order() {
    let uris = ["t1", "t2", "t3", "t4", "t5"];
    let mut resolver = StaticResolver::new();
    for uri in uris {
        resolver = resolver.with_track(uri, 5_000);
    }
    let fixture = build_player(resolver);
    let mut rx = fixture.events.subscribe();

    let handles: Vec<_> = uris
        .into_iter()
        .map(|uri| {
            let player = fixture.player.clone();
            tokio::spawn(async move { player.add(uri).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    // Whatever order the adds landed in, the emission order matches it
    let playlist_ids: Vec<String> = fixture
        .player
        .playlist()
        .await
        .into_iter()
        .map(|e| e.id)
        .collect();
    let mut event_ids = Vec::new();
    for _ in 0..uris.len() {
        match next_event(&mut rx).await {
            PlayerEvent::SongAdded { entry } => event_ids.push(entry.id),
            other => panic!("expected SongAdded, got {:?}", other),
        }
    }
    assert_eq!(event_ids, playlist_ids);
}

#[tokio::test]
async fn test_failed_add_enqueues_nothing() {
    let fixture = build_player(StaticResolver::new().with_broken("bad"));
    let mut rx = fixture.events.subscribe();

    assert!(fixture.player.add("bad").await.is_err());

    assert!(fixture.player.playlist().await.is_empty());
    let extra = tokio::time::timeout(Duration::from_millis(100), rx.recv()).await;
    assert!(extra.is_err());
}

#[tokio::test]
async fn test_worker_skips_unresolvable_track() {
    let fixture = build_player(
        StaticResolver::new()
            .with_track("t1", 30)
            .with_stream_broken("t2", 30)
            .with_track("t3", 30),
    );
    let mut rx = fixture.events.subscribe();

    for uri in ["t1", "t2", "t3"] {
        fixture.player.add(uri).await.unwrap();
    }
    fixture.player.play().await;

    // t1 plays to completion
    wait_for(&mut rx, |e| e == &PlayerEvent::Ready).await;

    // t2 only gets a Loading before being skipped, then t3 starts
    let loading_t2 = next_event(&mut rx).await;
    assert_eq!(loading_t2, PlayerEvent::Loading { uri: "t2".into() });

    let loading_t3 = next_event(&mut rx).await;
    assert_eq!(loading_t3, PlayerEvent::Loading { uri: "t3".into() });

    match next_event(&mut rx).await {
        PlayerEvent::StartPlaying { entry } => assert_eq!(entry.id, "t3"),
        other => panic!("expected StartPlaying for t3, got {:?}", other),
    }
}

#[tokio::test]
async fn test_stop_cancels_sequencing() {
    let fixture = build_player(
        StaticResolver::new()
            .with_track("t1", 5_000)
            .with_track("t2", 5_000),
    );
    let mut rx = fixture.events.subscribe();

    fixture.player.add("t1").await.unwrap();
    fixture.player.add("t2").await.unwrap();
    fixture.player.play().await;
    wait_for(&mut rx, |e| matches!(e, PlayerEvent::StartPlaying { .. })).await;

    fixture.player.stop().await;

    assert_eq!(next_event(&mut rx).await, PlayerEvent::Stopped);
    assert_eq!(next_event(&mut rx).await, PlayerEvent::Ready);

    // The worker is gone, so t2 never starts
    let extra = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
    assert!(extra.is_err());
    assert_eq!(fixture.player.engine_state().await, EngineState::Ready);
}

#[tokio::test]
async fn test_worker_advances_after_missing_ready_to_lag() {
    // A one-slot bus lets newer events evict the Ready the worker waits
    // for; the worker must fall back to the engine state and advance
    let events = EventBus::new(1);
    let (output, signals) = SimulatedOutput::new(10);
    let resolver = StaticResolver::new()
        .with_track("t1", 5_000)
        .with_track("t2", 5_000);
    let engine = PlaybackEngine::new(output, signals, Arc::new(resolver), events.clone());
    let player = PlaylistOrchestrator::new(engine.clone(), events.clone());

    player.add("t1").await.unwrap();
    player.add("t2").await.unwrap();
    player.play().await;

    for _ in 0..100 {
        if engine.current_track().await.map(|e| e.id) == Some("t1".to_string()) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(engine.state().await, EngineState::Playing);

    // Stop t1 and immediately bury its Stopped/Ready under newer events
    // before the worker can drain them
    engine.stop().await;
    events.emit_lossy(PlayerEvent::Paused);
    events.emit_lossy(PlayerEvent::Resumed);

    for _ in 0..100 {
        if engine.current_track().await.map(|e| e.id) == Some("t2".to_string()) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("worker never advanced to t2 after lagging past Ready");
}

#[tokio::test]
async fn test_play_resumes_when_paused() {
    let fixture = build_player(StaticResolver::new().with_track("t1", 5_000));
    let mut rx = fixture.events.subscribe();

    fixture.player.add("t1").await.unwrap();
    fixture.player.play().await;
    wait_for(&mut rx, |e| matches!(e, PlayerEvent::StartPlaying { .. })).await;

    fixture.player.pause().await;
    assert_eq!(next_event(&mut rx).await, PlayerEvent::Paused);

    fixture.player.play().await;
    assert_eq!(next_event(&mut rx).await, PlayerEvent::Resumed);
    assert_eq!(fixture.player.engine_state().await, EngineState::Playing);
}
