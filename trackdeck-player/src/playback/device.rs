//! Audio output seam
//!
//! The engine drives a single output device through the `AudioOutput`
//! trait and learns about end-of-stream through a `DeviceSignal` channel.
//! `SimulatedOutput` is the wall-clock implementation used in this build:
//! it tracks position from `Instant`s and fires `PlaybackStopped` when the
//! track duration elapses, which is exactly the contract a hardware-backed
//! output would honor.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::trace;
use trackdeck_common::model::StreamHandle;
use trackdeck_common::Result;

/// Out-of-band notifications from the output device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceSignal {
    /// The stream identified by `stream_id` stopped producing output.
    /// The id is the one `open` returned for that stream, so a consumer
    /// can discard signals from streams it has already replaced.
    PlaybackStopped { stream_id: u64 },
}

/// Playback output device
///
/// One stream open at a time; `open` replaces any previous stream without
/// signalling. Position and duration are in milliseconds.
pub trait AudioOutput: Send + Sync {
    /// Open a stream for playback, replacing the current one; returns the
    /// id echoed by this stream's signals
    fn open(&self, handle: &StreamHandle, duration_ms: u64) -> Result<u64>;

    /// Begin output of the open stream
    fn start(&self);

    /// Pause output, keeping the position
    fn pause(&self);

    /// Resume output from the paused position
    fn resume(&self);

    /// Stop output and discard the open stream
    fn stop(&self);

    /// Set the output volume, 0.0 to 1.0
    fn set_volume(&self, volume: f32);

    /// Current output volume
    fn volume(&self) -> f32;

    /// Position within the open stream, 0 when nothing is open
    fn position_ms(&self) -> u64;

    /// Duration of the open stream, 0 when nothing is open
    fn duration_ms(&self) -> u64;

    /// Seek to a position, snapped to the frame boundary and clamped to
    /// the stream duration; returns the effective position
    fn seek_ms(&self, position_ms: u64) -> u64;
}

/// Snap a seek target to the previous frame boundary, clamped to duration
pub fn snap_to_frame(position_ms: u64, frame_ms: u64, duration_ms: u64) -> u64 {
    let clamped = position_ms.min(duration_ms);
    if frame_ms == 0 {
        return clamped;
    }
    clamped - clamped % frame_ms
}

struct SimStream {
    id: u64,
    duration_ms: u64,
    /// Accumulated position while not running
    base_ms: u64,
    running_since: Option<Instant>,
    /// Whether output ever started for this stream
    started: bool,
}

impl SimStream {
    fn position_ms(&self) -> u64 {
        let elapsed = self
            .running_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0);
        (self.base_ms + elapsed).min(self.duration_ms)
    }
}

struct SimInner {
    stream: Option<SimStream>,
    volume: f32,
}

/// Wall-clock simulation of an audio output device
pub struct SimulatedOutput {
    weak: Weak<Self>,
    inner: Mutex<SimInner>,
    signals: mpsc::UnboundedSender<DeviceSignal>,
    /// Bumped whenever the open stream changes state; stale end-of-stream
    /// timers compare against it and do nothing
    generation: AtomicU64,
    /// Allocator for the per-open stream ids carried by signals
    next_stream_id: AtomicU64,
    frame_ms: u64,
}

impl SimulatedOutput {
    pub fn new(frame_ms: u64) -> (Arc<Self>, mpsc::UnboundedReceiver<DeviceSignal>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let output = Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            inner: Mutex::new(SimInner {
                stream: None,
                volume: 1.0,
            }),
            signals: tx,
            generation: AtomicU64::new(0),
            next_stream_id: AtomicU64::new(0),
            frame_ms,
        });
        (output, rx)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimInner> {
        // The mutex guards plain data and no holder can panic
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn bump_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Schedule the end-of-stream signal for the remaining play time
    fn arm_end_timer(&self, remaining_ms: u64, generation: u64) {
        let Some(output) = self.weak.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(remaining_ms)).await;
            output.finish_if_current(generation);
        });
    }

    fn finish_if_current(&self, generation: u64) {
        let mut inner = self.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        if let Some(stream) = inner.stream.take() {
            self.bump_generation();
            trace!("Simulated stream reached end");
            let _ = self.signals.send(DeviceSignal::PlaybackStopped {
                stream_id: stream.id,
            });
        }
    }
}

impl AudioOutput for SimulatedOutput {
    fn open(&self, handle: &StreamHandle, duration_ms: u64) -> Result<u64> {
        let mut inner = self.lock();
        self.bump_generation();
        let id = self.next_stream_id.fetch_add(1, Ordering::SeqCst) + 1;
        trace!("Opening simulated stream {} ({} ms)", handle.track_id, duration_ms);
        inner.stream = Some(SimStream {
            id,
            duration_ms,
            base_ms: 0,
            running_since: None,
            started: false,
        });
        Ok(id)
    }

    fn start(&self) {
        let mut inner = self.lock();
        let generation = self.bump_generation();
        if let Some(stream) = inner.stream.as_mut() {
            stream.started = true;
            stream.running_since = Some(Instant::now());
            let remaining = stream.duration_ms.saturating_sub(stream.base_ms);
            drop(inner);
            self.arm_end_timer(remaining, generation);
        }
    }

    fn pause(&self) {
        let mut inner = self.lock();
        self.bump_generation();
        if let Some(stream) = inner.stream.as_mut() {
            stream.base_ms = stream.position_ms();
            stream.running_since = None;
        }
    }

    fn resume(&self) {
        self.start();
    }

    fn stop(&self) {
        let mut inner = self.lock();
        self.bump_generation();
        if let Some(stream) = inner.stream.take() {
            if stream.started {
                let _ = self.signals.send(DeviceSignal::PlaybackStopped {
                    stream_id: stream.id,
                });
            }
        }
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = volume;
    }

    fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn position_ms(&self) -> u64 {
        self.lock()
            .stream
            .as_ref()
            .map(|s| s.position_ms())
            .unwrap_or(0)
    }

    fn duration_ms(&self) -> u64 {
        self.lock()
            .stream
            .as_ref()
            .map(|s| s.duration_ms)
            .unwrap_or(0)
    }

    fn seek_ms(&self, position_ms: u64) -> u64 {
        let mut inner = self.lock();
        let generation = self.bump_generation();
        let Some(stream) = inner.stream.as_mut() else {
            return 0;
        };

        let snapped = snap_to_frame(position_ms, self.frame_ms, stream.duration_ms);
        stream.base_ms = snapped;
        let was_running = stream.running_since.is_some();
        if was_running {
            stream.running_since = Some(Instant::now());
        }
        let remaining = stream.duration_ms.saturating_sub(snapped);
        drop(inner);

        if was_running {
            self.arm_end_timer(remaining, generation);
        }
        snapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_to_frame_boundary() {
        assert_eq!(snap_to_frame(123, 10, 1_000), 120);
        assert_eq!(snap_to_frame(120, 10, 1_000), 120);
        assert_eq!(snap_to_frame(9, 10, 1_000), 0);
    }

    #[test]
    fn test_snap_clamps_to_duration() {
        assert_eq!(snap_to_frame(10_000, 10, 1_000), 1_000);
        assert_eq!(snap_to_frame(1_003, 10, 1_000), 1_000);
    }

    #[test]
    fn test_snap_zero_frame_only_clamps() {
        assert_eq!(snap_to_frame(123, 0, 1_000), 123);
        assert_eq!(snap_to_frame(2_000, 0, 1_000), 1_000);
    }

    fn handle(id: &str) -> StreamHandle {
        StreamHandle {
            track_id: id.to_string(),
            url: format!("http://streams.local/{}", id),
            codec: "opus".to_string(),
            container: "webm".to_string(),
            bitrate_bps: 128_000,
        }
    }

    #[tokio::test]
    async fn test_natural_end_sends_signal() {
        let (output, mut signals) = SimulatedOutput::new(10);
        let id = output.open(&handle("t1"), 30).unwrap();
        output.start();

        let signal = tokio::time::timeout(Duration::from_secs(1), signals.recv())
            .await
            .expect("signal within timeout");
        assert_eq!(signal, Some(DeviceSignal::PlaybackStopped { stream_id: id }));
        assert_eq!(output.duration_ms(), 0);
    }

    #[tokio::test]
    async fn test_stop_echoes_open_stream_id() {
        let (output, mut signals) = SimulatedOutput::new(10);
        let first = output.open(&handle("t1"), 5_000).unwrap();
        let second = output.open(&handle("t2"), 5_000).unwrap();
        assert_ne!(first, second);

        output.start();
        output.stop();
        assert_eq!(
            signals.try_recv().unwrap(),
            DeviceSignal::PlaybackStopped { stream_id: second }
        );
    }

    #[tokio::test]
    async fn test_stop_before_start_is_silent() {
        let (output, mut signals) = SimulatedOutput::new(10);
        output.open(&handle("t1"), 5_000).unwrap();
        output.stop();
        assert!(signals.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pause_freezes_position() {
        let (output, _signals) = SimulatedOutput::new(10);
        output.open(&handle("t1"), 5_000).unwrap();
        output.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        output.pause();

        let frozen = output.position_ms();
        assert!(frozen > 0);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(output.position_ms(), frozen);
    }

    #[tokio::test]
    async fn test_seek_snaps_and_reports() {
        let (output, _signals) = SimulatedOutput::new(10);
        output.open(&handle("t1"), 5_000).unwrap();
        assert_eq!(output.seek_ms(123), 120);
        assert_eq!(output.position_ms(), 120);
        assert_eq!(output.seek_ms(60_000), 5_000);
    }

    #[tokio::test]
    async fn test_open_supersedes_pending_end_timer() {
        let (output, mut signals) = SimulatedOutput::new(10);
        output.open(&handle("t1"), 30).unwrap();
        output.start();
        // Replace the stream before the first one can finish
        output.open(&handle("t2"), 5_000).unwrap();
        output.start();

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(signals.try_recv().is_err());
        assert_eq!(output.duration_ms(), 5_000);
    }
}
