//! Server-Sent Events stream of playback events
//!
//! Each event is named with its stable discriminant and carries the full
//! JSON payload, so clients can either filter by event name or parse the
//! tagged body.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tracing::{debug, warn};

use super::AppState;

pub async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("SSE subscriber connected");

    let stream = BroadcastStream::new(state.events.subscribe()).filter_map(|result| match result {
        Ok(event) => Event::default()
            .event(event.event_type())
            .json_data(&event)
            .ok()
            .map(Ok),
        Err(e) => {
            warn!("SSE subscriber lagged: {}", e);
            None
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
