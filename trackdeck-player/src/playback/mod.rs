//! Playback orchestration
//!
//! `device` is the output seam, `engine` the per-track state machine,
//! `orchestrator` the playlist and its background sequencing worker.

pub mod device;
pub mod engine;
pub mod orchestrator;

pub use engine::{EngineState, PlaybackEngine};
pub use orchestrator::PlaylistOrchestrator;
