use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::task::spawn_blocking;
use tracing::info;

use crate::error::AppError;
use crate::state::{AppState, ServerEvent};
use forge_client::{ForgeClient, PlatformRunner};
use steward_core::config::Config;
use steward_core::cycle;
use steward_core::types::CycleRequest;

// ---------------------------------------------------------------------------
// POST /api/cycles
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct TriggerBody {
    #[serde(default = "default_all")]
    pub action_type: String,
    #[serde(default = "default_all")]
    pub target_scope: String,
    #[serde(default)]
    pub dry_run: bool,
}

fn default_all() -> String {
    "all".to_string()
}

impl Default for TriggerBody {
    fn default() -> Self {
        Self {
            action_type: default_all(),
            target_scope: default_all(),
            dry_run: false,
        }
    }
}

/// Run one decision cycle and return its outcome. The trigger is validated
/// before the busy flag is taken, so malformed requests never block a real
/// one. Concurrent triggers race on the flag; losers get 409.
pub async fn trigger_cycle(
    State(app): State<AppState>,
    body: Option<Json<TriggerBody>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let Json(body) = body.unwrap_or_default();
    let request = CycleRequest::parse(&body.action_type, &body.target_scope)?;

    if app
        .cycle_busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(AppError::conflict("a cycle is already running"));
    }

    info!(
        action = %request.filter,
        target = %request.scope,
        dry_run = body.dry_run,
        "cycle triggered over http"
    );

    let root = app.root.clone();
    let dry_run = body.dry_run;
    let result = spawn_blocking(move || {
        let config = Config::load(&root)?;
        let client = ForgeClient::from_config(&config.forge)?;
        let runner = PlatformRunner::new(client, config.org.name.clone())?;
        let cancel = AtomicBool::new(false);
        cycle::run_cycle(&root, &config, &runner, &runner, &request, dry_run, &cancel)
    })
    .await;

    // Release the flag on every path, join errors included.
    app.cycle_busy.store(false, Ordering::SeqCst);

    let outcome = result.map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    if outcome.dry_run {
        return Ok(Json(serde_json::json!({
            "dry_run": true,
            "cycle_ts": outcome.cycle_ts,
            "plan": outcome.plan,
        })));
    }

    let _ = app.event_tx.send(ServerEvent::CycleCompleted);

    Ok(Json(serde_json::json!({
        "dry_run": false,
        "cycle_ts": outcome.cycle_ts,
        "plan": outcome.plan,
        "outcomes": outcome.outcomes,
        "report": outcome.report,
        "new_insights": outcome.new_insights,
    })))
}
