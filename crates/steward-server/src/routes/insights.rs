use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use tokio::task::spawn_blocking;

use crate::error::AppError;
use crate::state::{AppState, ServerEvent};
use steward_core::config::Config;
use steward_core::insight::{Insight, InsightHistory, InsightStatus};

// ---------------------------------------------------------------------------
// GET /api/insights
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct InsightsQuery {
    /// Filter by status: `open` or `resolved`.
    pub status: Option<String>,
    /// Return only the top-k open insights, ranked by age-discounted
    /// priority. Implies the open filter.
    pub top: Option<usize>,
}

/// List insights from `.steward/insights.yaml`. Returns an empty list when
/// no learning run has happened yet.
pub async fn list_insights(
    State(app): State<AppState>,
    Query(query): Query<InsightsQuery>,
) -> Result<Json<Vec<Insight>>, AppError> {
    let status_filter = match query.status.as_deref() {
        None => None,
        Some("open") => Some(InsightStatus::Open),
        Some("resolved") => Some(InsightStatus::Resolved),
        Some(other) => {
            return Err(AppError::bad_request(format!(
                "unknown status filter '{other}' (expected open or resolved)"
            )))
        }
    };

    let root = app.root.clone();
    let top = query.top;
    let insights = spawn_blocking(move || {
        let history = InsightHistory::load(&root)?;
        let insights: Vec<Insight> = if let Some(k) = top {
            // ranking needs the configured recency decay
            let config = Config::load(&root)?;
            history
                .top_open(k, config.learning.recency_decay)
                .into_iter()
                .cloned()
                .collect()
        } else {
            history
                .insights
                .iter()
                .filter(|i| status_filter.map_or(true, |s| i.status == s))
                .cloned()
                .collect()
        };
        Ok::<_, steward_core::StewardError>(insights)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(insights))
}

// ---------------------------------------------------------------------------
// PATCH /api/insights/{id}
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct UpdateInsightBody {
    pub status: InsightStatus,
}

/// Update the status of one insight. Resolution is the only transition:
/// insights are never deleted and never reopened.
pub async fn update_insight(
    Path(id): Path<String>,
    State(app): State<AppState>,
    Json(body): Json<UpdateInsightBody>,
) -> Result<Json<Insight>, AppError> {
    if body.status != InsightStatus::Resolved {
        return Err(AppError::bad_request(
            "insights can only be marked resolved",
        ));
    }

    let root = app.root.clone();
    let id_clone = id.clone();
    let result = spawn_blocking(move || InsightHistory::resolve(&root, &id_clone))
        .await
        .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    match result {
        Some(insight) => {
            let _ = app.event_tx.send(ServerEvent::InsightsUpdated);
            Ok(Json(insight))
        }
        None => Err(AppError::not_found(format!("insight '{id}' not found"))),
    }
}
