//! Shared types for trackdeck services
//!
//! Provides the event model and bus, the workspace error type, and the
//! track data model consumed by the playback service and by external
//! transport clients.

pub mod error;
pub mod events;
pub mod model;

pub use error::{Error, Result};
