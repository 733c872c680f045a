//! Cycle reports — distill one finished cycle into an operator summary.
//!
//! A report is derived data: everything in it can be rebuilt from the
//! outcome log, the cycle's snapshot, and the insight run history, so
//! nothing here is persisted separately.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Result, StewardError};
use crate::insight::InsightHistory;
use crate::outcome::{ExecutionOutcome, ExecutionStatus, OutcomeLog};
use crate::paths;
use crate::snapshot::OrgSnapshot;
use crate::thresholds::OrgHealth;
use crate::types::{ActionKind, Tier};

/// Ideal pace used for the efficiency score: ten seconds per action.
pub const IDEAL_ACTION_MS: u64 = 10_000;

// ---------------------------------------------------------------------------
// ReportStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Excellent,
    Good,
    Fair,
    NeedsAttention,
}

impl ReportStatus {
    /// Success rate is a percentage; boundary values land in the better
    /// status.
    pub fn from_success_rate(rate: f64) -> Self {
        if rate >= 90.0 {
            ReportStatus::Excellent
        } else if rate >= 70.0 {
            ReportStatus::Good
        } else if rate >= 50.0 {
            ReportStatus::Fair
        } else {
            ReportStatus::NeedsAttention
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Excellent => "excellent",
            ReportStatus::Good => "good",
            ReportStatus::Fair => "fair",
            ReportStatus::NeedsAttention => "needs_attention",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// KindStats / CycleReport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KindStats {
    pub attempted: u32,
    pub succeeded: u32,
    pub partial: u32,
    pub failed: u32,
    pub skipped: u32,
    /// Percent over attempted outcomes; 100 when nothing was attempted.
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_ts: u64,
    pub org: String,
    pub generated_at: DateTime<Utc>,
    pub status: ReportStatus,
    /// Percent across all attempted outcomes this cycle.
    pub success_rate: f64,
    pub total_actions: u32,
    pub executed: u32,
    pub skipped: u32,
    pub total_cost: f64,
    pub duration_ms: u64,
    /// Percent against the ideal pace; capped at 100.
    pub efficiency: f64,
    pub per_kind: BTreeMap<ActionKind, KindStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overall_health: Option<Tier>,
    pub recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

fn rate_percent(credit: f64, countable: u32) -> f64 {
    if countable == 0 {
        100.0
    } else {
        credit / f64::from(countable) * 100.0
    }
}

fn efficiency_percent(executed: u32, duration_ms: u64) -> f64 {
    if executed == 0 || duration_ms == 0 {
        return 100.0;
    }
    let ideal = (u64::from(executed) * IDEAL_ACTION_MS) as f64;
    (ideal / duration_ms as f64 * 100.0).min(100.0)
}

fn recommendations(
    per_kind: &BTreeMap<ActionKind, KindStats>,
    health: Option<&OrgHealth>,
    degraded: Option<&str>,
) -> Vec<String> {
    let mut out = Vec::new();
    for (kind, stats) in per_kind {
        if stats.failed > 0 || stats.partial > 0 {
            out.push(format!(
                "investigate {kind} failures ({} failed, {} partial this cycle)",
                stats.failed, stats.partial
            ));
        }
        if stats.skipped > 0 {
            out.push(format!(
                "{kind} breaker opened; check platform status before the next cycle"
            ));
        }
    }
    if let Some(health) = health {
        if health.overall <= Tier::Warning {
            if let Some((metric, worst)) = health
                .metrics
                .iter()
                .min_by_key(|(_, mh)| mh.tier)
                .map(|(m, mh)| (*m, mh.tier))
            {
                out.push(format!(
                    "org health is {}; prioritize {metric} work (currently {worst})",
                    health.overall
                ));
            }
        }
    }
    if let Some(reason) = degraded {
        out.push(format!("learning ran degraded: {reason}"));
    }
    out
}

impl CycleReport {
    /// Distill one cycle's outcomes. `health` comes from the cycle's
    /// snapshot when it is still available; `degraded` from the learn run.
    pub fn build(
        cycle_ts: u64,
        org: impl Into<String>,
        outcomes: &[ExecutionOutcome],
        health: Option<&OrgHealth>,
        degraded: Option<&str>,
    ) -> Self {
        let mut per_kind: BTreeMap<ActionKind, KindStats> = BTreeMap::new();
        let mut credit = 0.0;
        let mut countable = 0u32;
        let mut executed = 0u32;
        let mut skipped = 0u32;
        let mut total_cost = 0.0;
        let mut duration_ms = 0u64;
        let mut kind_credit: BTreeMap<ActionKind, f64> = BTreeMap::new();

        for outcome in outcomes {
            let stats = per_kind.entry(outcome.candidate.kind).or_default();
            match &outcome.status {
                ExecutionStatus::Success => {
                    stats.attempted += 1;
                    stats.succeeded += 1;
                }
                ExecutionStatus::PartialFailure { .. } => {
                    stats.attempted += 1;
                    stats.partial += 1;
                }
                ExecutionStatus::Failed { .. } => {
                    stats.attempted += 1;
                    stats.failed += 1;
                }
                ExecutionStatus::SkippedAdaptive { .. } => {
                    stats.skipped += 1;
                    skipped += 1;
                }
            }
            if outcome.status.counts_toward_rate() {
                credit += outcome.status.success_credit();
                countable += 1;
                executed += 1;
                total_cost += outcome.candidate.estimated_cost;
                duration_ms += outcome.duration_ms;
                *kind_credit.entry(outcome.candidate.kind).or_insert(0.0) +=
                    outcome.status.success_credit();
            }
        }

        for (kind, stats) in per_kind.iter_mut() {
            let kind_total = kind_credit.get(kind).copied().unwrap_or(0.0);
            stats.success_rate = rate_percent(kind_total, stats.attempted);
        }

        let success_rate = rate_percent(credit, countable);
        let recommendations = recommendations(&per_kind, health, degraded);

        CycleReport {
            cycle_ts,
            org: org.into(),
            generated_at: Utc::now(),
            status: ReportStatus::from_success_rate(success_rate),
            success_rate,
            total_actions: outcomes.len() as u32,
            executed,
            skipped,
            total_cost,
            duration_ms,
            efficiency: efficiency_percent(executed, duration_ms),
            per_kind,
            overall_health: health.map(|h| h.overall),
            recommendations,
            degraded: degraded.map(str::to_string),
        }
    }

    /// Rebuild the report for `cycle_ts` (or the latest cycle) from the
    /// stores under `root`.
    pub fn load(root: &Path, config: &Config, cycle_ts: Option<u64>) -> Result<Self> {
        let db_path = paths::outcomes_db_path(root);
        // A read must not create the database file.
        if !db_path.exists() {
            return Err(StewardError::InvalidRequest(
                "no cycles recorded yet".to_string(),
            ));
        }
        let log = OutcomeLog::open(&db_path)?;
        let cycle_ts = match cycle_ts.or(log.latest_cycle_ts()?) {
            Some(ts) => ts,
            None => {
                return Err(StewardError::InvalidRequest(
                    "no cycles recorded yet".to_string(),
                ))
            }
        };
        let outcomes = log.list_cycle(cycle_ts)?;
        if outcomes.is_empty() {
            return Err(StewardError::InvalidRequest(format!(
                "no outcomes recorded for cycle {cycle_ts}"
            )));
        }

        // the snapshot may have been pruned; health is best-effort
        let health = match OrgSnapshot::load(root, cycle_ts) {
            Ok(snapshot) => OrgHealth::evaluate(&snapshot, &config.thresholds)?,
            Err(_) => None,
        };

        let insight_history = InsightHistory::load(root)?;
        let degraded = insight_history
            .runs
            .iter()
            .find(|r| r.cycle_ts == cycle_ts)
            .and_then(|r| r.degraded.clone());

        Ok(CycleReport::build(
            cycle_ts,
            config.org.name.clone(),
            &outcomes,
            health.as_ref(),
            degraded.as_deref(),
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
