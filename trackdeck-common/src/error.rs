//! Error types for trackdeck
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation across the workspace.

use thiserror::Error;

/// Main error type for trackdeck services
#[derive(Error, Debug)]
pub enum Error {
    /// Metadata or stream resolution failed
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// The catalog offered no audio-only stream variant for a track
    #[error("No playable audio-only stream for {0}")]
    NoPlayableStream(String),

    /// Metadata cache backing store errors
    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),

    /// Operation not valid in the current engine state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the trackdeck Error
pub type Result<T> = std::result::Result<T, Error>;
