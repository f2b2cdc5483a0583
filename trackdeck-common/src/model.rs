//! Track data model
//!
//! Value types shared between the resolver, cache, playback engine, and
//! transport layer. All of them are plain immutable records: a `TrackEntry`
//! is created once per resolution and never mutated afterwards.

use serde::{Deserialize, Serialize};

/// Resolved, cacheable identity and metadata record for a playable track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackEntry {
    /// Catalog-assigned track identifier (cache key)
    pub id: String,
    /// Display title
    pub title: String,
    /// Total track duration in milliseconds
    pub duration_ms: u64,
    /// Thumbnail image URI
    pub thumbnail_uri: String,
    /// The URI the track was resolved from
    pub source_uri: String,
}

/// One stream variant offered by the catalog for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Media URL of this variant
    pub url: String,
    /// Audio codec name
    pub codec: String,
    /// Container format name
    pub container: String,
    /// Average bitrate in bits per second
    pub bitrate_bps: u64,
    /// Whether the variant carries audio only (no video track)
    pub audio_only: bool,
}

/// A selected, playable stream variant tagged with the track it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamHandle {
    pub track_id: String,
    pub url: String,
    pub codec: String,
    pub container: String,
    pub bitrate_bps: u64,
}

impl StreamHandle {
    /// Tag a selected variant with its track id
    pub fn from_variant(track_id: impl Into<String>, variant: &StreamVariant) -> Self {
        Self {
            track_id: track_id.into(),
            url: variant.url.clone(),
            codec: variant.codec.clone(),
            container: variant.container.clone(),
            bitrate_bps: variant.bitrate_bps,
        }
    }
}
