//! HTTP surface over the decision engine.
//!
//! Every handler is a thin bridge: deserialize, `spawn_blocking` into the
//! synchronous core against the `.steward/` stores, serialize. The only
//! mutating endpoints are the cycle trigger and insight resolution; both
//! broadcast an SSE event so connected dashboards refetch.

pub mod error;
pub mod routes;
pub mod state;

use axum::routing::{get, patch, post};
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
pub fn build_router(root: PathBuf) -> Router {
    let app_state = state::AppState::new(root);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Events (SSE)
        .route("/api/events", get(routes::events::sse_events))
        // Engine state
        .route("/api/status", get(routes::status::get_status))
        .route("/api/weights", get(routes::weights::get_weights))
        .route("/api/report", get(routes::report::get_report))
        .route("/api/outcomes", get(routes::outcomes::list_outcomes))
        // Insights
        .route("/api/insights", get(routes::insights::list_insights))
        .route(
            "/api/insights/{id}",
            patch(routes::insights::update_insight),
        )
        // Cycle trigger
        .route("/api/cycles", post(routes::cycles::trigger_cycle))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Bind and serve on the given port.
pub async fn serve(root: PathBuf, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    serve_on(root, listener).await
}

/// Serve on a pre-bound listener.
///
/// Unlike `serve`, this accepts a `TcpListener` that was already bound so the
/// caller can read the actual port before starting (useful when `port = 0` and
/// the OS picks a free port).
pub async fn serve_on(root: PathBuf, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let actual_port = listener.local_addr()?.port();
    let app = build_router(root);

    tracing::info!("steward server listening on http://localhost:{actual_port}");

    axum::serve(listener, app).await?;
    Ok(())
}
