//! Playlist orchestrator and background sequencing worker
//!
//! Owns the track queue and the cursor. `play` spawns a worker that walks
//! the queue: it plays the entry at the cursor, advances the cursor, then
//! waits for the engine's `Ready` before continuing. Jumps and stop
//! supersede the worker with a cancel-and-wait handshake so at most one
//! worker drives the engine at a time.

use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use trackdeck_common::events::{EventBus, PlayerEvent};
use trackdeck_common::model::TrackEntry;
use trackdeck_common::Result;

use crate::playback::engine::{EngineState, PlaybackEngine};

struct PlaylistState {
    entries: Vec<TrackEntry>,
    /// Index of the next track the worker will dequeue. While a track
    /// plays the cursor already points past it.
    cursor: usize,
}

struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Queue-driven playback orchestration over a `PlaybackEngine`
pub struct PlaylistOrchestrator {
    engine: Arc<PlaybackEngine>,
    events: EventBus,
    playlist: Arc<Mutex<PlaylistState>>,
    worker: Mutex<Option<Worker>>,
}

impl PlaylistOrchestrator {
    pub fn new(engine: Arc<PlaybackEngine>, events: EventBus) -> Arc<Self> {
        Arc::new(Self {
            engine,
            events,
            playlist: Arc::new(Mutex::new(PlaylistState {
                entries: Vec::new(),
                cursor: 0,
            })),
            worker: Mutex::new(None),
        })
    }

    /// Append a track to the playlist
    ///
    /// Metadata is resolved before the entry is enqueued; a resolution
    /// failure enqueues nothing and emits nothing.
    pub async fn add(&self, uri: &str) -> Result<TrackEntry> {
        let entry = self.engine.track_info(uri).await?;

        let mut playlist = self.playlist.lock().await;
        playlist.entries.push(entry.clone());
        info!(
            "Added {} at position {}",
            entry.title,
            playlist.entries.len() - 1
        );
        self.events.emit_lossy(PlayerEvent::SongAdded {
            entry: entry.clone(),
        });
        Ok(entry)
    }

    /// Remove the track at an index
    ///
    /// Removing an entry before the cursor shifts the cursor back so the
    /// sequencing position is unchanged.
    pub async fn remove(&self, index: usize) -> Option<TrackEntry> {
        let mut playlist = self.playlist.lock().await;
        if index >= playlist.entries.len() {
            return None;
        }

        let entry = playlist.entries.remove(index);
        if index < playlist.cursor {
            playlist.cursor -= 1;
        }
        info!("Removed {} from position {}", entry.title, index);
        self.events.emit_lossy(PlayerEvent::SongRemoved {
            entry: entry.clone(),
        });
        Some(entry)
    }

    /// Start or continue playback
    ///
    /// Paused playback resumes; active playback is left alone; otherwise a
    /// worker starts from the head of the playlist.
    pub async fn play(&self) {
        match self.engine.state().await {
            EngineState::Paused => self.engine.resume().await,
            EngineState::Playing | EngineState::Loading => {
                trace!("Play ignored, already active");
            }
            _ => self.start_worker(0).await,
        }
    }

    /// Pause the current track
    pub async fn pause(&self) {
        self.engine.pause().await;
    }

    /// Resume the paused track
    pub async fn resume(&self) {
        self.engine.resume().await;
    }

    /// Stop playback and cancel the sequencing worker
    pub async fn stop(&self) {
        self.cancel_worker().await;
        self.engine.stop().await;
    }

    /// Jump to the next queued track
    ///
    /// Returns the entry playback restarts at, or `None` at the end of the
    /// playlist (playback is then left untouched).
    pub async fn jump_next(&self) -> Option<TrackEntry> {
        let (target, entry) = {
            let playlist = self.playlist.lock().await;
            let target = (playlist.cursor + 1).min(playlist.entries.len());
            (target, playlist.entries.get(target)?.clone())
        };
        self.restart_at(target).await;
        Some(entry)
    }

    /// Jump back to the previous track
    pub async fn jump_previous(&self) -> Option<TrackEntry> {
        let (target, entry) = {
            let playlist = self.playlist.lock().await;
            let target = playlist.cursor.saturating_sub(1);
            (target, playlist.entries.get(target)?.clone())
        };
        self.restart_at(target).await;
        Some(entry)
    }

    /// Jump to an arbitrary playlist index
    pub async fn jump_to_index(&self, index: usize) -> Option<TrackEntry> {
        let entry = {
            let playlist = self.playlist.lock().await;
            playlist.entries.get(index)?.clone()
        };
        self.restart_at(index).await;
        Some(entry)
    }

    /// Seek within the current track to an absolute position
    ///
    /// Returns the effective position, or `None` when nothing is playing
    /// or paused.
    pub async fn jump_to_position(&self, position_ms: u64) -> Option<u64> {
        match self.engine.state().await {
            EngineState::Playing => {
                self.engine.pause().await;
                let effective = self.engine.seek_to(position_ms);
                self.engine.resume().await;
                Some(effective)
            }
            EngineState::Paused => Some(self.engine.seek_to(position_ms)),
            state => {
                trace!("Seek ignored in state {}", state);
                None
            }
        }
    }

    /// Seek within the current track relative to the current position
    pub async fn seek_relative(&self, delta_ms: i64) -> Option<u64> {
        match self.engine.state().await {
            EngineState::Playing => {
                self.engine.pause().await;
                let effective = self.engine.seek_by(delta_ms);
                self.engine.resume().await;
                Some(effective)
            }
            EngineState::Paused => Some(self.engine.seek_by(delta_ms)),
            state => {
                trace!("Seek ignored in state {}", state);
                None
            }
        }
    }

    /// The track loaded in the engine, if any
    pub async fn current_track(&self) -> Option<TrackEntry> {
        self.engine.current_track().await
    }

    /// The entry at the cursor, if any
    pub async fn current_song(&self) -> Option<TrackEntry> {
        let playlist = self.playlist.lock().await;
        playlist.entries.get(playlist.cursor).cloned()
    }

    /// Snapshot of the playlist entries
    pub async fn playlist(&self) -> Vec<TrackEntry> {
        self.playlist.lock().await.entries.clone()
    }

    /// Current cursor position
    pub async fn cursor(&self) -> usize {
        self.playlist.lock().await.cursor
    }

    /// Current engine state
    pub async fn engine_state(&self) -> EngineState {
        self.engine.state().await
    }

    /// Current (position_ms, duration_ms)
    pub fn position(&self) -> (u64, u64) {
        self.engine.position()
    }

    pub fn set_volume(&self, volume: f32) {
        self.engine.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.engine.volume()
    }

    /// Subscribe to playback events
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }

    /// Stop the current track and restart sequencing at an index
    async fn restart_at(&self, target: usize) {
        self.cancel_worker().await;
        self.engine.stop().await;
        self.start_worker(target).await;
    }

    async fn cancel_worker(&self) {
        let mut slot = self.worker.lock().await;
        Self::supersede(&mut slot).await;
    }

    async fn supersede(slot: &mut Option<Worker>) {
        if let Some(worker) = slot.take() {
            worker.cancel.cancel();
            if let Err(e) = worker.handle.await {
                if !e.is_cancelled() {
                    warn!("Sequencing worker panicked: {}", e);
                }
            }
        }
    }

    async fn start_worker(&self, start: usize) {
        let mut slot = self.worker.lock().await;
        Self::supersede(&mut slot).await;

        {
            let mut playlist = self.playlist.lock().await;
            playlist.cursor = start.min(playlist.entries.len());
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            self.engine.clone(),
            self.events.clone(),
            self.playlist.clone(),
            cancel.clone(),
        ));
        *slot = Some(Worker { cancel, handle });
        debug!("Sequencing worker started at index {}", start);
    }
}

/// Walk the playlist from the cursor, playing each track to completion
async fn run_worker(
    engine: Arc<PlaybackEngine>,
    events: EventBus,
    playlist: Arc<Mutex<PlaylistState>>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }

        let entry = {
            let mut playlist = playlist.lock().await;
            if playlist.cursor >= playlist.entries.len() {
                debug!("Playlist exhausted");
                return;
            }
            let entry = playlist.entries[playlist.cursor].clone();
            playlist.cursor += 1;
            entry
        };

        // Subscribe before play so the Ready that ends this track cannot
        // be missed
        let mut rx = events.subscribe();

        let started = tokio::select! {
            _ = cancel.cancelled() => return,
            result = engine.play(&entry.source_uri) => result,
        };

        if let Err(e) = started {
            error!("Skipping {}: {}", entry.source_uri, e);
            continue;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = rx.recv() => match received {
                    Ok(PlayerEvent::Ready) => break,
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("Sequencing worker lagged by {} events", missed);
                        // The dropped events may have included the Ready
                        // this track ends with
                        if engine.state().await == EngineState::Ready {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }
}
