//! Shared fixtures for integration tests

// Each test binary uses a different subset of these helpers
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use trackdeck_common::events::{EventBus, PlayerEvent};
use trackdeck_common::model::{StreamHandle, TrackEntry};
use trackdeck_common::{Error, Result};
use trackdeck_player::playback::device::SimulatedOutput;
use trackdeck_player::playback::{PlaybackEngine, PlaylistOrchestrator};
use trackdeck_player::resolver::StreamResolver;

/// Resolver serving a fixed set of tracks without any network
#[derive(Default)]
pub struct StaticResolver {
    tracks: HashMap<String, TrackEntry>,
    broken_metadata: Vec<String>,
    broken_streams: Vec<String>,
    stream_delays: HashMap<String, Duration>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a playable track under `uri`
    pub fn with_track(mut self, uri: &str, duration_ms: u64) -> Self {
        let entry = TrackEntry {
            id: uri.to_string(),
            title: format!("Title {}", uri),
            duration_ms,
            thumbnail_uri: format!("http://thumbs.test/{}.jpg", uri),
            source_uri: uri.to_string(),
        };
        self.tracks.insert(uri.to_string(), entry);
        self
    }

    /// Register a URI whose metadata resolution fails
    pub fn with_broken(mut self, uri: &str) -> Self {
        self.broken_metadata.push(uri.to_string());
        self
    }

    /// Register a track whose metadata resolves but whose stream does not
    pub fn with_stream_broken(mut self, uri: &str, duration_ms: u64) -> Self {
        self = self.with_track(uri, duration_ms);
        self.broken_streams.push(uri.to_string());
        self
    }

    /// Register a playable track whose stream resolution takes `delay`
    pub fn with_slow_stream(mut self, uri: &str, duration_ms: u64, delay: Duration) -> Self {
        self = self.with_track(uri, duration_ms);
        self.stream_delays.insert(uri.to_string(), delay);
        self
    }
}

#[async_trait]
impl StreamResolver for StaticResolver {
    async fn resolve_metadata(&self, uri: &str) -> Result<TrackEntry> {
        if self.broken_metadata.iter().any(|u| u == uri) {
            return Err(Error::Resolution(format!("unknown track {}", uri)));
        }
        self.tracks
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::Resolution(format!("unknown track {}", uri)))
    }

    async fn resolve_stream(&self, uri: &str) -> Result<StreamHandle> {
        if let Some(delay) = self.stream_delays.get(uri) {
            tokio::time::sleep(*delay).await;
        }
        if self.broken_streams.iter().any(|u| u == uri) {
            return Err(Error::NoPlayableStream(uri.to_string()));
        }
        let entry = self.resolve_metadata(uri).await?;
        Ok(StreamHandle {
            track_id: entry.id,
            url: format!("http://streams.test/{}", uri),
            codec: "opus".to_string(),
            container: "webm".to_string(),
            bitrate_bps: 128_000,
        })
    }
}

pub struct TestPlayer {
    pub player: Arc<PlaylistOrchestrator>,
    pub engine: Arc<PlaybackEngine>,
    pub events: EventBus,
}

/// Assemble a full playback stack over a simulated output with 10 ms
/// frames
pub fn build_player(resolver: StaticResolver) -> TestPlayer {
    let events = EventBus::new(64);
    let (output, signals) = SimulatedOutput::new(10);
    let engine = PlaybackEngine::new(output, signals, Arc::new(resolver), events.clone());
    let player = PlaylistOrchestrator::new(engine.clone(), events.clone());
    TestPlayer {
        player,
        engine,
        events,
    }
}

/// Receive the next event, failing the test after two seconds
pub async fn next_event(rx: &mut broadcast::Receiver<PlayerEvent>) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event bus closed")
}

/// Receive events until one matches the predicate, failing after two
/// seconds overall
pub async fn wait_for(
    rx: &mut broadcast::Receiver<PlayerEvent>,
    predicate: impl Fn(&PlayerEvent) -> bool,
) -> PlayerEvent {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for matching event")
}
