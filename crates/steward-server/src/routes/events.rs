use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

/// GET /api/events — SSE stream of engine events (`cycle_completed`,
/// `insights_updated`).
pub async fn sse_events(State(app): State<AppState>) -> impl axum::response::IntoResponse {
    let rx = app.event_tx.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| {
        msg.ok()
            .map(|ev| Ok::<Event, Infallible>(Event::default().event(ev.as_str()).data(ev.as_str())))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}
