//! Request handlers for the playback API

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use trackdeck_common::model::TrackEntry;
use trackdeck_common::Error;

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct AddRequest {
    pub uri: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: i64,
}

#[derive(Debug, Serialize)]
pub struct PlaylistResponse {
    pub playlist: Vec<TrackEntry>,
    pub cursor: usize,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: String,
    pub current: Option<TrackEntry>,
    pub position_ms: u64,
    pub duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    /// Absolute target position
    pub position_ms: Option<u64>,
    /// Relative offset, applied when no absolute position is given
    pub offset_ms: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct SeekResponse {
    pub position_ms: u64,
}

/// Volume over the API uses a 0-100 integer scale
#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: u8,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    pub volume: u8,
}

fn error_response(e: Error) -> (StatusCode, Json<StatusResponse>) {
    let status = match e {
        Error::Resolution(_) | Error::NoPlayableStream(_) => StatusCode::BAD_GATEWAY,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", e),
        }),
    )
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = chrono::Utc::now() - state.started_at;
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_seconds: uptime.num_seconds(),
    })
}

pub async fn get_playlist(State(state): State<AppState>) -> Json<PlaylistResponse> {
    Json(PlaylistResponse {
        playlist: state.player.playlist().await,
        cursor: state.player.cursor().await,
    })
}

pub async fn add_track(
    State(state): State<AppState>,
    Json(request): Json<AddRequest>,
) -> impl IntoResponse {
    debug!("Add request for {}", request.uri);
    match state.player.add(&request.uri).await {
        Ok(entry) => (StatusCode::CREATED, Json(entry)).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

pub async fn get_current(State(state): State<AppState>) -> impl IntoResponse {
    match state.player.current_song().await {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn remove_track(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    match state.player.remove(index).await {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn jump_to_index(
    State(state): State<AppState>,
    Path(index): Path<usize>,
) -> impl IntoResponse {
    match state.player.jump_to_index(index).await {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn play(State(state): State<AppState>) -> Json<StatusResponse> {
    state.player.play().await;
    Json(StatusResponse {
        status: "playing".to_string(),
    })
}

pub async fn pause(State(state): State<AppState>) -> Json<StatusResponse> {
    state.player.pause().await;
    Json(StatusResponse {
        status: "paused".to_string(),
    })
}

pub async fn resume(State(state): State<AppState>) -> Json<StatusResponse> {
    state.player.resume().await;
    Json(StatusResponse {
        status: "resumed".to_string(),
    })
}

pub async fn stop(State(state): State<AppState>) -> Json<StatusResponse> {
    state.player.stop().await;
    Json(StatusResponse {
        status: "stopped".to_string(),
    })
}

pub async fn next(State(state): State<AppState>) -> impl IntoResponse {
    match state.player.jump_next().await {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn previous(State(state): State<AppState>) -> impl IntoResponse {
    match state.player.jump_previous().await {
        Some(entry) => Json(entry).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

pub async fn seek(
    State(state): State<AppState>,
    Json(request): Json<SeekRequest>,
) -> impl IntoResponse {
    let effective = match (request.position_ms, request.offset_ms) {
        (Some(position_ms), _) => state.player.jump_to_position(position_ms).await,
        (None, Some(offset_ms)) => state.player.seek_relative(offset_ms).await,
        (None, None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(StatusResponse {
                    status: "error: position_ms or offset_ms required".to_string(),
                }),
            )
                .into_response()
        }
    };

    match effective {
        Some(position_ms) => Json(SeekResponse { position_ms }).into_response(),
        None => (
            StatusCode::CONFLICT,
            Json(StatusResponse {
                status: "error: nothing playing".to_string(),
            }),
        )
            .into_response(),
    }
}

pub async fn get_state(State(state): State<AppState>) -> Json<StateResponse> {
    let (position_ms, duration_ms) = state.player.position();
    Json(StateResponse {
        state: state.player.engine_state().await.to_string(),
        current: state.player.current_track().await,
        position_ms,
        duration_ms,
    })
}

pub async fn get_volume(State(state): State<AppState>) -> Json<VolumeResponse> {
    Json(VolumeResponse {
        volume: (state.player.volume() * 100.0).round() as u8,
    })
}

pub async fn set_volume(
    State(state): State<AppState>,
    Json(request): Json<VolumeRequest>,
) -> Json<VolumeResponse> {
    state.player.set_volume(request.volume.min(100) as f32 / 100.0);
    Json(VolumeResponse {
        volume: (state.player.volume() * 100.0).round() as u8,
    })
}
