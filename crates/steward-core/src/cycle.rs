//! One full decision cycle: snapshot, classify, select, execute, learn.
//!
//! The cycle is strictly phased. Reads (snapshot, weights) happen before
//! execution; the learner is the only writer of weights and insights and
//! runs after the last outcome is recorded. A dry run stops after
//! selection and leaves no trace on disk.

use std::path::Path;
use std::sync::atomic::AtomicBool;

use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::coordinator::{self, ActionRunner};
use crate::insight::{Insight, InsightHistory, LearnRun};
use crate::learner::{self, LearnInput};
use crate::outcome::{ExecutionOutcome, OutcomeLog};
use crate::paths;
use crate::report::CycleReport;
use crate::selector::{self, ActionPlan};
use crate::snapshot::OrgSnapshot;
use crate::thresholds::OrgHealth;
use crate::types::CycleRequest;
use crate::weights::WeightState;
use crate::Result;

// ---------------------------------------------------------------------------
// SnapshotSource seam
// ---------------------------------------------------------------------------

/// Produces the cycle's snapshot. The forge client implements this against
/// the platform API; tests feed snapshots directly.
pub trait SnapshotSource {
    fn capture(&self, org: &str) -> Result<OrgSnapshot>;
}

// ---------------------------------------------------------------------------
// CycleOutcome
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CycleOutcome {
    pub cycle_ts: u64,
    pub plan: ActionPlan,
    pub outcomes: Vec<ExecutionOutcome>,
    /// Absent for dry runs, which stop before execution.
    pub report: Option<CycleReport>,
    pub new_insights: Vec<Insight>,
    pub dry_run: bool,
}

// ---------------------------------------------------------------------------
// run_cycle
// ---------------------------------------------------------------------------

/// Run one cycle under `root`. Fails fast on configuration problems before
/// any snapshot is taken; after execution starts, per-action failures are
/// isolated and the cycle always reaches its report.
pub fn run_cycle(
    root: &Path,
    config: &Config,
    source: &dyn SnapshotSource,
    runner: &dyn ActionRunner,
    request: &CycleRequest,
    dry_run: bool,
    cancel: &AtomicBool,
) -> Result<CycleOutcome> {
    config.ensure_valid()?;
    let cycle_ts = Utc::now().timestamp_millis().max(0) as u64;

    // capture and classify
    let snapshot = source.capture(&config.org.name)?;
    info!(
        cycle_ts,
        org = %config.org.name,
        repos = snapshot.len(),
        "snapshot captured"
    );
    let health = OrgHealth::evaluate(&snapshot, &config.thresholds)?;

    // read phase: weights as the selector will see them
    let weights = WeightState::load(root)?;
    weights.ensure_within(config.learning.weight_min, config.learning.weight_max)?;

    let plan = selector::select(
        &snapshot,
        &weights,
        &config.thresholds,
        &config.selection,
        &config.budget,
        request,
    )?;
    info!(
        actions = plan.len(),
        total_cost = plan.total_cost,
        "plan selected"
    );

    if dry_run {
        return Ok(CycleOutcome {
            cycle_ts,
            plan,
            outcomes: Vec::new(),
            report: None,
            new_insights: Vec::new(),
            dry_run: true,
        });
    }

    // the snapshot goes to disk before execution so an aborted cycle still
    // leaves its evidence alongside the partial outcome log
    snapshot.save(root, cycle_ts)?;
    let log = OutcomeLog::open(&paths::outcomes_db_path(root))?;
    let outcomes = coordinator::execute(
        &plan,
        runner,
        &config.execution,
        &log,
        cycle_ts,
        cancel,
    )?;
    info!(executed = outcomes.len(), "execution finished");

    // learn: single writer of weights and insights
    let previous = OrgSnapshot::latest_before(root, cycle_ts)?;
    let history = log.recent_cycles(config.learning.window)?;
    let input = LearnInput {
        cycle_ts,
        snapshot: &snapshot,
        previous: previous.as_ref().map(|(ts, snap)| (*ts, snap)),
        history: &history,
    };
    let learned = learner::learn(&input, &weights, &config.thresholds, &config.learning)?;
    learned.weights.save(root)?;

    let mut insight_history = InsightHistory::load(root)?;
    insight_history.append_cycle(
        LearnRun {
            cycle_ts,
            run_at: Utc::now(),
            generated: learned.insights.len() as u32,
            degraded: learned.degraded.clone(),
        },
        learned.insights.clone(),
    );
    insight_history.save(root)?;
    info!(
        insights = learned.insights.len(),
        degraded = learned.degraded.is_some(),
        "learning finished"
    );

    let removed = OrgSnapshot::prune(root, config.snapshot_keep)?;
    if removed > 0 {
        info!(removed, keep = config.snapshot_keep, "pruned old snapshots");
    }

    let report = CycleReport::build(
        cycle_ts,
        config.org.name.clone(),
        &outcomes,
        health.as_ref(),
        learned.degraded.as_deref(),
    );

    Ok(CycleOutcome {
        cycle_ts,
        plan,
        outcomes,
        report: Some(report),
        new_insights: learned.insights,
        dry_run: false,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
