use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use tokio::task::spawn_blocking;

use crate::error::AppError;
use crate::state::AppState;
use steward_core::config::Config;
use steward_core::report::CycleReport;

#[derive(Deserialize)]
pub struct ReportQuery {
    /// Cycle to report on; omitted means the most recent one.
    pub cycle_ts: Option<u64>,
}

/// GET /api/report — rebuild the report for one cycle from the stores.
/// 400 when no cycle has been recorded yet.
pub async fn get_report(
    State(app): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<CycleReport>, AppError> {
    let root = app.root.clone();
    let report = spawn_blocking(move || {
        let config = Config::load(&root)?;
        CycleReport::load(&root, &config, query.cycle_ts)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(report))
}
