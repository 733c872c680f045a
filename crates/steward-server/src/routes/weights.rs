use axum::extract::State;
use axum::Json;
use tokio::task::spawn_blocking;

use crate::error::AppError;
use crate::state::AppState;
use steward_core::weights::WeightState;

/// GET /api/weights — the per-kind multipliers the next selection will use.
/// Neutral defaults before the first learning pass.
pub async fn get_weights(State(app): State<AppState>) -> Result<Json<WeightState>, AppError> {
    let root = app.root.clone();
    let weights = spawn_blocking(move || WeightState::load(&root))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;
    Ok(Json(weights))
}
