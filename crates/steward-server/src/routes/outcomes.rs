use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tokio::task::spawn_blocking;

use crate::error::AppError;
use crate::state::AppState;
use steward_core::outcome::{ExecutionOutcome, OutcomeLog};
use steward_core::paths;

#[derive(Deserialize)]
pub struct OutcomesQuery {
    /// Cycle to list; omitted means the most recent one.
    pub cycle_ts: Option<u64>,
}

/// GET /api/outcomes — execution outcomes of one cycle, oldest first.
/// An empty log answers an empty list, not an error.
pub async fn list_outcomes(
    State(app): State<AppState>,
    Query(query): Query<OutcomesQuery>,
) -> Result<Json<Vec<ExecutionOutcome>>, AppError> {
    let root = app.root.clone();
    let outcomes = spawn_blocking(move || {
        let db_path = paths::outcomes_db_path(&root);
        // A read must not create the database file.
        if !db_path.exists() {
            return Ok(Vec::new());
        }
        let log = OutcomeLog::open(&db_path)?;
        let cycle_ts = match query.cycle_ts.or(log.latest_cycle_ts()?) {
            Some(ts) => ts,
            None => return Ok(Vec::new()),
        };
        log.list_cycle(cycle_ts)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(outcomes))
}
