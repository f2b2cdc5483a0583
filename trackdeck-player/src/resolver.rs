//! Track and stream resolution against the catalog service
//!
//! The catalog is an external collaborator reached over HTTP; the core
//! consumes it through the `StreamResolver` trait so the playback engine
//! never depends on the concrete transport. Metadata lookups go through the
//! persistent `MetadataCache`; selected stream handles are additionally
//! cached in memory per track id to avoid repeat selection calls.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, trace};
use trackdeck_common::model::{StreamHandle, StreamVariant, TrackEntry};
use trackdeck_common::{Error, Result};

use crate::cache::MetadataCache;

/// Resolves a track URI into metadata and a playable stream handle
#[async_trait]
pub trait StreamResolver: Send + Sync {
    /// Resolve track metadata, cache-first with network fallback
    async fn resolve_metadata(&self, uri: &str) -> Result<TrackEntry>;

    /// Resolve a playable stream handle, selecting the audio-only variant
    /// with the highest bitrate
    async fn resolve_stream(&self, uri: &str) -> Result<StreamHandle>;
}

/// Extract the track id from a URI
///
/// Accepts a bare id, a `v=` query parameter, or a URL whose last path
/// segment is the id.
pub fn track_id_from_uri(uri: &str) -> String {
    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (uri, None),
    };

    if let Some(query) = query {
        if let Some(id) = query.split('&').find_map(|pair| pair.strip_prefix("v=")) {
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }

    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .unwrap_or(path)
        .to_string()
}

/// Pick the audio-only variant with the highest bitrate, if any
pub fn select_audio_stream(variants: &[StreamVariant]) -> Option<&StreamVariant> {
    variants
        .iter()
        .filter(|v| v.audio_only)
        .max_by_key(|v| v.bitrate_bps)
}

/// `StreamResolver` backed by the catalog's JSON HTTP API
pub struct CatalogResolver {
    http: Client,
    base_url: String,
    metadata: MetadataCache,
    streams: RwLock<HashMap<String, StreamHandle>>,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    id: String,
    title: String,
    duration_ms: u64,
    thumbnail_uri: String,
}

#[derive(Debug, Deserialize)]
struct StreamManifest {
    variants: Vec<StreamVariant>,
}

impl CatalogResolver {
    pub fn new(base_url: impl Into<String>, metadata: MetadataCache) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            metadata,
            streams: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_track(&self, id: &str, uri: &str) -> Result<TrackEntry> {
        let url = format!("{}/tracks/{}", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Resolution(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Resolution(format!(
                "catalog returned {} for track {}",
                response.status(),
                id
            )));
        }

        let track: TrackResponse = response
            .json()
            .await
            .map_err(|e| Error::Resolution(e.to_string()))?;

        Ok(TrackEntry {
            id: track.id,
            title: track.title,
            duration_ms: track.duration_ms,
            thumbnail_uri: track.thumbnail_uri,
            source_uri: uri.to_string(),
        })
    }

    async fn fetch_manifest(&self, id: &str) -> Result<Vec<StreamVariant>> {
        let url = format!("{}/tracks/{}/streams", self.base_url, id);
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Resolution(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Error::Resolution(format!(
                "catalog returned {} for stream manifest of {}",
                response.status(),
                id
            )));
        }

        let manifest: StreamManifest = response
            .json()
            .await
            .map_err(|e| Error::Resolution(e.to_string()))?;

        Ok(manifest.variants)
    }
}

#[async_trait]
impl StreamResolver for CatalogResolver {
    async fn resolve_metadata(&self, uri: &str) -> Result<TrackEntry> {
        let id = track_id_from_uri(uri);

        if let Some(entry) = self.metadata.lookup(&id).await? {
            debug!("Metadata cache hit for {}", id);
            return Ok(entry);
        }

        let entry = self.fetch_track(&id, uri).await?;
        debug!(
            "Resolved {} ({} ms) from catalog",
            entry.title, entry.duration_ms
        );

        if !self.metadata.insert(&entry).await? {
            // Lost the insert race to a concurrent resolution; the cached
            // row is equivalent
            trace!("Entry {} already cached", id);
        }

        Ok(entry)
    }

    async fn resolve_stream(&self, uri: &str) -> Result<StreamHandle> {
        let id = track_id_from_uri(uri);

        if let Some(handle) = self.streams.read().await.get(&id) {
            debug!("Using cached stream handle for {}", id);
            return Ok(handle.clone());
        }

        let variants = self.fetch_manifest(&id).await?;
        let variant =
            select_audio_stream(&variants).ok_or_else(|| Error::NoPlayableStream(id.clone()))?;

        debug!(
            "Selected {} {} at {} bps for {}",
            variant.container, variant.codec, variant.bitrate_bps, id
        );

        let handle = StreamHandle::from_variant(id.clone(), variant);
        self.streams.write().await.insert(id, handle.clone());
        Ok(handle)
    }
}
