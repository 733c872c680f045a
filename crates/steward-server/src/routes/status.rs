use axum::extract::State;
use axum::Json;
use std::sync::atomic::Ordering;
use tokio::task::spawn_blocking;

use crate::error::AppError;
use crate::state::AppState;
use steward_core::config::Config;
use steward_core::snapshot::OrgSnapshot;
use steward_core::thresholds::OrgHealth;
use steward_core::weights::WeightState;

/// GET /api/status — org identity, latest snapshot summary, health, and
/// current weights in one call.
pub async fn get_status(State(app): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let root = app.root.clone();
    let busy = app.cycle_busy.load(Ordering::SeqCst);

    let result = spawn_blocking(move || {
        let config = Config::load(&root)?;
        let weights = WeightState::load(&root)?;

        let (snapshot_summary, health) = match OrgSnapshot::latest(&root)? {
            Some((cycle_ts, snapshot)) => {
                let health = OrgHealth::evaluate(&snapshot, &config.thresholds)?;
                let summary = serde_json::json!({
                    "cycle_ts": cycle_ts,
                    "captured_at": snapshot.captured_at,
                    "repos": snapshot.len(),
                });
                (summary, health)
            }
            None => (serde_json::Value::Null, None),
        };

        Ok::<_, steward_core::StewardError>(serde_json::json!({
            "org": config.org.name,
            "snapshot": snapshot_summary,
            "health": health,
            "weights": weights,
            "cycle_running": busy,
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}
