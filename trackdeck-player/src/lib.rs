//! # trackdeck Playback Service Library
//!
//! Playlist playback orchestration: owns the track queue and cursor, drives
//! a single-stream playback engine through the queue with a background
//! sequencing worker, and broadcasts playback events to subscribers over
//! HTTP/SSE.
//!
//! **Architecture:** metadata cache (SQLite) + catalog stream resolver +
//! playback engine over a device seam + playlist orchestrator, composed in
//! `main` and exposed through an axum router.

pub mod api;
pub mod cache;
pub mod config;
pub mod playback;
pub mod resolver;

pub use trackdeck_common::{Error, Result};
