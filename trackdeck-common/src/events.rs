//! Event model and EventBus for trackdeck
//!
//! The playback engine and the playlist orchestrator both publish into one
//! shared `EventBus`; subscribers therefore observe the two sources merged
//! in arrival order, with per-publisher emission order preserved. There is
//! no replay of history to late subscribers: current playback state is
//! queried synchronously, not reconstructed from the event log.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::TrackEntry;

/// Playback events broadcast to all subscribers
///
/// The variant names are the stable discriminants of the wire format
/// (serialized under a `type` tag) and downstream clients key their UI
/// state transitions on the exact emission order, so both the names and
/// the per-operation ordering are part of the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// A track was appended to the playlist
    SongAdded { entry: TrackEntry },

    /// A track was removed from the playlist
    SongRemoved { entry: TrackEntry },

    /// The engine is ready to load the next track
    Ready,

    /// The engine started resolving and opening a URI
    Loading { uri: String },

    /// Output started for a freshly loaded track
    StartPlaying { entry: TrackEntry },

    /// Output paused
    Paused,

    /// Output resumed after a pause
    Resumed,

    /// Output stopped (explicit stop or natural end-of-stream)
    Stopped,
}

impl PlayerEvent {
    /// Get event type as string for filtering and SSE event names
    pub fn event_type(&self) -> &'static str {
        match self {
            PlayerEvent::SongAdded { .. } => "SongAdded",
            PlayerEvent::SongRemoved { .. } => "SongRemoved",
            PlayerEvent::Ready => "Ready",
            PlayerEvent::Loading { .. } => "Loading",
            PlayerEvent::StartPlaying { .. } => "StartPlaying",
            PlayerEvent::Paused => "Paused",
            PlayerEvent::Resumed => "Resumed",
            PlayerEvent::Stopped => "Stopped",
        }
    }
}

/// Central event distribution bus
///
/// Wraps `tokio::broadcast`, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PlayerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received. Dropping the
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists,
    /// `Err` if nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: PlayerEvent,
    ) -> Result<usize, broadcast::error::SendError<PlayerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring whether anyone is listening
    pub fn emit_lossy(&self, event: PlayerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
