//! HTTP API
//!
//! Versioned JSON API under `/api/v1` plus a health probe and an SSE
//! event stream mirroring the internal event bus.

mod handlers;
mod sse;

use axum::{
    routing::{delete, get, post},
    Router,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use trackdeck_common::events::EventBus;

use crate::playback::PlaylistOrchestrator;

/// Shared state for all request handlers
#[derive(Clone)]
pub struct AppState {
    pub player: Arc<PlaylistOrchestrator>,
    pub events: EventBus,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(player: Arc<PlaylistOrchestrator>, events: EventBus) -> Self {
        Self {
            player,
            events,
            started_at: Utc::now(),
        }
    }
}

/// Build the service router
pub fn create_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/playlist", get(handlers::get_playlist).post(handlers::add_track))
        .route("/playlist/current", get(handlers::get_current))
        .route("/playlist/:index", delete(handlers::remove_track))
        .route("/playlist/jump/:index", post(handlers::jump_to_index))
        .route("/playback/play", post(handlers::play))
        .route("/playback/pause", post(handlers::pause))
        .route("/playback/resume", post(handlers::resume))
        .route("/playback/stop", post(handlers::stop))
        .route("/playback/next", post(handlers::next))
        .route("/playback/previous", post(handlers::previous))
        .route("/playback/seek", post(handlers::seek))
        .route("/playback/state", get(handlers::get_state))
        .route("/audio/volume", get(handlers::get_volume).post(handlers::set_volume))
        .route("/events", get(sse::sse_handler));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
