//! Single-track playback engine
//!
//! State machine over the output device: Idle until first use, then
//! Loading -> Playing -> Paused/Resumed -> Stopped -> Ready. Every
//! transition that changes audible state emits exactly one event, and the
//! state write always precedes the emission so a subscriber reacting to an
//! event observes the new state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, info, trace};
use trackdeck_common::events::{EventBus, PlayerEvent};
use trackdeck_common::model::TrackEntry;
use trackdeck_common::{Error, Result};

use crate::playback::device::{AudioOutput, DeviceSignal};
use crate::resolver::StreamResolver;

/// Engine lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, nothing loaded yet
    Idle,
    /// Resolving and opening a track
    Loading,
    /// Output running
    Playing,
    /// Output paused, position retained
    Paused,
    /// Output stopped, transient before Ready
    Stopped,
    /// Ready for the next track
    Ready,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            EngineState::Idle => "Idle",
            EngineState::Loading => "Loading",
            EngineState::Playing => "Playing",
            EngineState::Paused => "Paused",
            EngineState::Stopped => "Stopped",
            EngineState::Ready => "Ready",
        };
        write!(f, "{}", name)
    }
}

/// Playback engine over a single output device
pub struct PlaybackEngine {
    output: Arc<dyn AudioOutput>,
    resolver: Arc<dyn StreamResolver>,
    events: EventBus,
    state: Arc<RwLock<EngineState>>,
    current: Arc<RwLock<Option<TrackEntry>>>,
    /// Stream id of the most recent `open`; device signals carrying any
    /// other id are stale and dropped
    session: AtomicU64,
}

impl PlaybackEngine {
    /// Create the engine and start listening for device signals
    ///
    /// Emits `Ready` once on startup.
    pub fn new(
        output: Arc<dyn AudioOutput>,
        mut signals: mpsc::UnboundedReceiver<DeviceSignal>,
        resolver: Arc<dyn StreamResolver>,
        events: EventBus,
    ) -> Arc<Self> {
        let engine = Arc::new(Self {
            output,
            resolver,
            events,
            state: Arc::new(RwLock::new(EngineState::Idle)),
            current: Arc::new(RwLock::new(None)),
            session: AtomicU64::new(0),
        });

        let listener = engine.clone();
        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    DeviceSignal::PlaybackStopped { stream_id } => {
                        listener.on_playback_stopped(stream_id).await
                    }
                }
            }
            trace!("Device signal channel closed");
        });

        engine.events.emit_lossy(PlayerEvent::Ready);
        engine
    }

    /// Handle end-of-stream reported by the device
    ///
    /// Only a natural end of the currently open stream transitions here.
    /// An explicit `stop` emits its own events synchronously and has
    /// already left Playing/Paused by the time its device signal arrives,
    /// and a signal queued by a stream that was since replaced carries the
    /// old stream id and is dropped.
    async fn on_playback_stopped(&self, stream_id: u64) {
        let mut state = self.state.write().await;
        if stream_id != self.session.load(Ordering::SeqCst) {
            trace!("Ignoring stale device signal for stream {}", stream_id);
            return;
        }
        if !matches!(*state, EngineState::Playing | EngineState::Paused) {
            trace!("Ignoring device stop signal in state {}", *state);
            return;
        }

        debug!("Stream finished");
        *state = EngineState::Stopped;
        self.current.write().await.take();
        self.events.emit_lossy(PlayerEvent::Stopped);
        *state = EngineState::Ready;
        self.events.emit_lossy(PlayerEvent::Ready);
    }

    /// Resolve a URI and open its stream on the device
    ///
    /// Emits `Loading` before resolution begins. A resolution failure
    /// leaves the state and current track untouched.
    pub async fn load(&self, uri: &str) -> Result<TrackEntry> {
        self.events.emit_lossy(PlayerEvent::Loading {
            uri: uri.to_string(),
        });

        let entry = self.resolver.resolve_metadata(uri).await?;
        let handle = self.resolver.resolve_stream(uri).await?;
        let stream_id = self.output.open(&handle, entry.duration_ms)?;
        self.session.store(stream_id, Ordering::SeqCst);

        *self.state.write().await = EngineState::Loading;
        *self.current.write().await = Some(entry.clone());
        debug!("Loaded {} ({} ms)", entry.title, entry.duration_ms);
        Ok(entry)
    }

    /// Load a URI and start playing it
    ///
    /// Valid from Idle, Ready or Stopped; any other state is an error.
    pub async fn play(&self, uri: &str) -> Result<TrackEntry> {
        {
            let state = self.state.read().await;
            if !matches!(
                *state,
                EngineState::Idle | EngineState::Ready | EngineState::Stopped
            ) {
                return Err(Error::InvalidState(format!(
                    "cannot play from state {}",
                    *state
                )));
            }
        }

        let entry = self.load(uri).await?;

        *self.state.write().await = EngineState::Playing;
        self.events.emit_lossy(PlayerEvent::StartPlaying {
            entry: entry.clone(),
        });
        self.output.start();
        info!("Playing {}", entry.title);
        Ok(entry)
    }

    /// Pause output; no-op unless Playing
    pub async fn pause(&self) {
        let mut state = self.state.write().await;
        if *state != EngineState::Playing {
            trace!("Pause ignored in state {}", *state);
            return;
        }
        *state = EngineState::Paused;
        self.output.pause();
        self.events.emit_lossy(PlayerEvent::Paused);
        debug!("Paused at {} ms", self.output.position_ms());
    }

    /// Resume output; no-op unless Paused
    pub async fn resume(&self) {
        let mut state = self.state.write().await;
        if *state != EngineState::Paused {
            trace!("Resume ignored in state {}", *state);
            return;
        }
        *state = EngineState::Playing;
        self.output.resume();
        self.events.emit_lossy(PlayerEvent::Resumed);
        debug!("Resumed");
    }

    /// Stop output; no-op unless Playing or Paused
    ///
    /// Emits `Stopped` then `Ready` synchronously, so a caller that stops
    /// and immediately loads the next track produces a well-ordered event
    /// sequence.
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        if *state == EngineState::Loading {
            // A load that never started playing is discarded without
            // events; Stopped only ever follows a StartPlaying
            *state = EngineState::Ready;
            self.current.write().await.take();
            self.output.stop();
            return;
        }
        if !matches!(*state, EngineState::Playing | EngineState::Paused) {
            trace!("Stop ignored in state {}", *state);
            return;
        }

        *state = EngineState::Stopped;
        self.current.write().await.take();
        self.output.stop();
        self.events.emit_lossy(PlayerEvent::Stopped);
        *state = EngineState::Ready;
        self.events.emit_lossy(PlayerEvent::Ready);
        debug!("Stopped");
    }

    /// Set output volume, clamped to 0.0..=1.0
    pub fn set_volume(&self, volume: f32) {
        self.output.set_volume(volume.clamp(0.0, 1.0));
    }

    /// Current output volume
    pub fn volume(&self) -> f32 {
        self.output.volume()
    }

    /// Seek to an absolute position; returns the effective position after
    /// frame snapping and clamping
    pub fn seek_to(&self, position_ms: u64) -> u64 {
        self.output.seek_ms(position_ms)
    }

    /// Seek relative to the current position; returns the effective
    /// position
    pub fn seek_by(&self, delta_ms: i64) -> u64 {
        let current = self.output.position_ms();
        let target = if delta_ms.is_negative() {
            current.saturating_sub(delta_ms.unsigned_abs())
        } else {
            current.saturating_add(delta_ms as u64)
        };
        self.output.seek_ms(target)
    }

    /// Current engine state
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// The loaded track, if any
    pub async fn current_track(&self) -> Option<TrackEntry> {
        self.current.read().await.clone()
    }

    /// Current (position_ms, duration_ms) of the open stream
    pub fn position(&self) -> (u64, u64) {
        (self.output.position_ms(), self.output.duration_ms())
    }

    /// Resolve metadata for a URI without touching playback state
    pub async fn track_info(&self, uri: &str) -> Result<TrackEntry> {
        self.resolver.resolve_metadata(uri).await.map_err(|e| {
            error!("Metadata resolution failed for {}: {}", uri, e);
            e
        })
    }

    /// The shared event bus
    pub fn events(&self) -> &EventBus {
        &self.events
    }
}
