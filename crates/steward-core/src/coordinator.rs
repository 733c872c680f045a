//! Sequential plan execution with bounded retry and adaptive skipping.
//!
//! The coordinator owns everything that happens between a scored plan and
//! the outcome log: attempt/retry bookkeeping, exponential backoff,
//! failure isolation between actions, and the per-kind circuit breaker.
//! The platform side effects themselves live behind [`ActionRunner`].

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::candidates::ActionCandidate;
use crate::config::ExecutionConfig;
use crate::outcome::{ExecutionOutcome, ExecutionStatus, OutcomeLog};
use crate::selector::{ActionPlan, ScoredCandidate};
use crate::types::ActionKind;
use crate::Result;

// ---------------------------------------------------------------------------
// ActionRunner seam
// ---------------------------------------------------------------------------

/// What one successful attempt changed.
#[derive(Debug, Clone)]
pub struct RunEffect {
    pub summary: String,
}

impl RunEffect {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
        }
    }
}

/// Why one attempt failed, and whether it is worth retrying.
#[derive(Debug, Clone)]
pub struct RunFailure {
    pub message: String,
    /// Rate limits and timeouts are transient; auth rejections and
    /// malformed requests are not.
    pub transient: bool,
    /// Present when the attempt changed something before failing.
    pub partial_effect: Option<String>,
}

impl RunFailure {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: true,
            partial_effect: None,
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            transient: false,
            partial_effect: None,
        }
    }

    pub fn with_partial_effect(mut self, summary: impl Into<String>) -> Self {
        self.partial_effect = Some(summary.into());
        self
    }
}

/// One attempt at one action. Implementations perform the platform side
/// effects and classify their own failures; retry policy stays here.
pub trait ActionRunner {
    fn run(&self, candidate: &ActionCandidate) -> std::result::Result<RunEffect, RunFailure>;
}

// ---------------------------------------------------------------------------
// Backoff
// ---------------------------------------------------------------------------

/// Delay before the attempt after `attempt` (1-indexed):
/// `base_delay_ms * 2^(attempt-1)`, capped at `max_delay_ms`.
fn backoff_delay(policy: &ExecutionConfig, attempt: u32) -> Duration {
    let exp = attempt.saturating_sub(1).min(16);
    let ms = policy
        .base_delay_ms
        .saturating_mul(1u64 << exp)
        .min(policy.max_delay_ms);
    Duration::from_millis(ms)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Run one plan entry to completion: up to `max_retries + 1` attempts,
/// sleeping between transient failures, stopping early on fatal ones.
fn run_with_retry(
    entry: &ScoredCandidate,
    runner: &dyn ActionRunner,
    policy: &ExecutionConfig,
    cycle_ts: u64,
    cancel: &AtomicBool,
) -> ExecutionOutcome {
    let max_attempts = policy.max_retries + 1;
    let start = Instant::now();
    let mut partial: Option<String> = None;
    let mut last_error = String::new();
    let mut attempts_made = 0u32;

    for attempt in 1..=max_attempts {
        attempts_made = attempt;
        match runner.run(&entry.candidate) {
            Ok(effect) => {
                let duration_ms = start.elapsed().as_millis() as u64;
                return ExecutionOutcome::new(
                    cycle_ts,
                    entry.candidate.clone(),
                    ExecutionStatus::Success,
                    attempt,
                    duration_ms,
                    effect.summary,
                );
            }
            Err(failure) => {
                warn!(
                    kind = %entry.candidate.kind,
                    target = %entry.candidate.target,
                    attempt,
                    transient = failure.transient,
                    error = %failure.message,
                    "action attempt failed"
                );
                if failure.partial_effect.is_some() {
                    partial = failure.partial_effect;
                }
                last_error = failure.message;
                if !failure.transient {
                    break;
                }
                if attempt < max_attempts {
                    if cancel.load(Ordering::SeqCst) {
                        break;
                    }
                    thread::sleep(backoff_delay(policy, attempt));
                }
            }
        }
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    let (status, effect_summary) = match partial {
        Some(summary) => (
            ExecutionStatus::PartialFailure {
                reason: last_error,
            },
            summary,
        ),
        None => (
            ExecutionStatus::Failed { reason: last_error },
            "no effect".to_string(),
        ),
    };
    ExecutionOutcome::new(
        cycle_ts,
        entry.candidate.clone(),
        status,
        attempts_made,
        duration_ms,
        effect_summary,
    )
}

/// Execute a plan in order, appending each outcome to `log` as soon as it
/// is produced so an aborted cycle still leaves its partial record behind.
///
/// Failure isolation: one action's failure never aborts the plan. The
/// per-kind circuit breaker kicks in after `breaker_threshold` consecutive
/// failures of a kind; later entries of that kind in the same plan are
/// recorded as `SkippedAdaptive` without an attempt. `cancel` is honored
/// between actions only; an in-flight action always runs to completion.
pub fn execute(
    plan: &ActionPlan,
    runner: &dyn ActionRunner,
    policy: &ExecutionConfig,
    log: &OutcomeLog,
    cycle_ts: u64,
    cancel: &AtomicBool,
) -> Result<Vec<ExecutionOutcome>> {
    let mut outcomes = Vec::with_capacity(plan.len());
    let mut consecutive_failures: BTreeMap<ActionKind, u32> = BTreeMap::new();

    for entry in &plan.actions {
        if cancel.load(Ordering::SeqCst) {
            info!(
                executed = outcomes.len(),
                planned = plan.len(),
                "cycle cancelled between actions"
            );
            break;
        }

        let kind = entry.candidate.kind;
        let failures = consecutive_failures.get(&kind).copied().unwrap_or(0);
        if failures >= policy.breaker_threshold {
            info!(kind = %kind, target = %entry.candidate.target, "breaker open, skipping");
            let outcome = ExecutionOutcome::new(
                cycle_ts,
                entry.candidate.clone(),
                ExecutionStatus::SkippedAdaptive {
                    reason: format!("{failures} consecutive {kind} failures this cycle"),
                },
                0,
                0,
                "not attempted",
            );
            log.append(&outcome)?;
            outcomes.push(outcome);
            continue;
        }

        let outcome = run_with_retry(entry, runner, policy, cycle_ts, cancel);
        match outcome.status {
            ExecutionStatus::Success => {
                consecutive_failures.insert(kind, 0);
            }
            ExecutionStatus::Failed { .. } | ExecutionStatus::PartialFailure { .. } => {
                *consecutive_failures.entry(kind).or_insert(0) += 1;
            }
            ExecutionStatus::SkippedAdaptive { .. } => {}
        }
        log.append(&outcome)?;
        outcomes.push(outcome);
    }

    Ok(outcomes)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BudgetConfig;
    use crate::types::Target;
    use crate::weights::WeightState;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Scripted runner: pops one result per call, per candidate order.
    struct ScriptedRunner {
        script: Mutex<Vec<std::result::Result<RunEffect, RunFailure>>>,
        calls: Mutex<Vec<(ActionKind, String)>>,
    }

    impl ScriptedRunner {
        fn new(script: Vec<std::result::Result<RunEffect, RunFailure>>) -> Self {
            Self {
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl ActionRunner for ScriptedRunner {
        fn run(&self, candidate: &ActionCandidate) -> std::result::Result<RunEffect, RunFailure> {
            self.calls
                .lock()
                .unwrap()
                .push((candidate.kind, candidate.target.id().to_string()));
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(RunEffect::new("ok"))
            } else {
                script.remove(0)
            }
        }
    }

    fn fast_policy() -> ExecutionConfig {
        ExecutionConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 4,
            breaker_threshold: 2,
        }
    }

    fn plan_of(kinds: Vec<(ActionKind, &str)>) -> ActionPlan {
        let actions = kinds
            .into_iter()
            .map(|(kind, target)| ScoredCandidate {
                candidate: ActionCandidate {
                    kind,
                    target: if target == "org-wide" {
                        Target::OrgWide
                    } else {
                        Target::repo(target)
                    },
                    estimated_cost: kind.base_cost(),
                    estimated_impact: 50.0,
                },
                raw_score: 50.0,
            })
            .collect();
        ActionPlan {
            actions,
            total_cost: 0.0,
            budget: BudgetConfig::default(),
            weights_used: WeightState::default(),
        }
    }

    fn open_log(dir: &TempDir) -> OutcomeLog {
        OutcomeLog::open(&dir.path().join("outcomes.redb")).unwrap()
    }

    #[test]
    fn success_on_first_attempt_records_one_attempt() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![Ok(RunEffect::new("analyzed 3 repos"))]);
        let plan = plan_of(vec![(ActionKind::Analyze, "org-wide")]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].status, ExecutionStatus::Success);
        assert_eq!(outcomes[0].attempts, 1);
        assert_eq!(outcomes[0].effect_summary, "analyzed 3 repos");
    }

    #[test]
    fn transient_failure_retries_then_succeeds() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::transient("rate limited")),
            Err(RunFailure::transient("rate limited")),
            Ok(RunEffect::new("done")),
        ]);
        let plan = plan_of(vec![(ActionKind::Sync, "alpha")]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(outcomes[0].status, ExecutionStatus::Success);
        assert_eq!(outcomes[0].attempts, 3);
        assert_eq!(runner.call_count(), 3);
    }

    #[test]
    fn exhausted_retries_record_failed() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::transient("timeout")),
            Err(RunFailure::transient("timeout")),
            Err(RunFailure::transient("timeout")),
        ]);
        let plan = plan_of(vec![(ActionKind::Sync, "alpha")]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        match &outcomes[0].status {
            ExecutionStatus::Failed { reason } => assert_eq!(reason, "timeout"),
            other => panic!("expected Failed, got {other:?}"),
        }
        // max_retries = 2 means three attempts total
        assert_eq!(outcomes[0].attempts, 3);
    }

    #[test]
    fn partial_effect_turns_exhaustion_into_partial_failure() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::transient("timeout").with_partial_effect("pushed 2 of 5 files")),
            Err(RunFailure::transient("timeout")),
            Err(RunFailure::transient("timeout")),
        ]);
        let plan = plan_of(vec![(ActionKind::Sync, "alpha")]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert!(matches!(
            outcomes[0].status,
            ExecutionStatus::PartialFailure { .. }
        ));
        assert_eq!(outcomes[0].effect_summary, "pushed 2 of 5 files");
    }

    #[test]
    fn fatal_failure_does_not_retry() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![Err(RunFailure::fatal("auth rejected"))]);
        let plan = plan_of(vec![(ActionKind::SecurityScan, "alpha")]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert!(matches!(outcomes[0].status, ExecutionStatus::Failed { .. }));
        assert_eq!(outcomes[0].attempts, 1);
        assert_eq!(runner.call_count(), 1);
    }

    #[test]
    fn one_failure_does_not_abort_the_plan() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::fatal("boom")),
            Ok(RunEffect::new("ok")),
        ]);
        let plan = plan_of(vec![
            (ActionKind::Sync, "alpha"),
            (ActionKind::HealthCheck, "beta"),
        ]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].status, ExecutionStatus::Failed { .. }));
        assert_eq!(outcomes[1].status, ExecutionStatus::Success);
    }

    #[test]
    fn breaker_skips_after_two_consecutive_same_kind_failures() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        // two fatal sync failures, then a third sync in the plan
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::fatal("boom")),
            Err(RunFailure::fatal("boom")),
        ]);
        let plan = plan_of(vec![
            (ActionKind::Sync, "alpha"),
            (ActionKind::Sync, "beta"),
            (ActionKind::Sync, "gamma"),
        ]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(
            outcomes[2].status,
            ExecutionStatus::SkippedAdaptive { .. }
        ));
        assert_eq!(outcomes[2].attempts, 0);
        // the third sync was never attempted
        assert_eq!(runner.call_count(), 2);
    }

    #[test]
    fn breaker_is_per_kind() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::fatal("boom")),
            Err(RunFailure::fatal("boom")),
            Ok(RunEffect::new("checked")),
        ]);
        let plan = plan_of(vec![
            (ActionKind::Sync, "alpha"),
            (ActionKind::Sync, "beta"),
            (ActionKind::HealthCheck, "gamma"),
        ]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        // health check runs even though sync is broken
        assert_eq!(outcomes[2].status, ExecutionStatus::Success);
    }

    #[test]
    fn success_resets_the_failure_streak() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Err(RunFailure::fatal("boom")),
            Ok(RunEffect::new("ok")),
            Err(RunFailure::fatal("boom")),
            Ok(RunEffect::new("ok")),
        ]);
        let plan = plan_of(vec![
            (ActionKind::Sync, "alpha"),
            (ActionKind::Sync, "beta"),
            (ActionKind::Sync, "gamma"),
            (ActionKind::Sync, "delta"),
        ]);

        let outcomes = execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            1000,
            &AtomicBool::new(false),
        )
        .unwrap();
        // no skip: failures never became consecutive
        assert!(outcomes
            .iter()
            .all(|o| !matches!(o.status, ExecutionStatus::SkippedAdaptive { .. })));
        assert_eq!(runner.call_count(), 4);
    }

    #[test]
    fn outcomes_are_persisted_as_produced() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![
            Ok(RunEffect::new("ok")),
            Err(RunFailure::fatal("boom")),
        ]);
        let plan = plan_of(vec![
            (ActionKind::Analyze, "org-wide"),
            (ActionKind::Sync, "alpha"),
        ]);

        execute(
            &plan,
            &runner,
            &fast_policy(),
            &log,
            7777,
            &AtomicBool::new(false),
        )
        .unwrap();
        let persisted = log.list_cycle(7777).unwrap();
        assert_eq!(persisted.len(), 2);
    }

    #[test]
    fn cancellation_stops_between_actions() {
        let dir = TempDir::new().unwrap();
        let log = open_log(&dir);
        let runner = ScriptedRunner::new(vec![Ok(RunEffect::new("ok"))]);
        let plan = plan_of(vec![
            (ActionKind::Sync, "alpha"),
            (ActionKind::Sync, "beta"),
        ]);

        let cancel = AtomicBool::new(true);
        let outcomes = execute(&plan, &runner, &fast_policy(), &log, 1000, &cancel).unwrap();
        assert!(outcomes.is_empty());
        assert_eq!(runner.call_count(), 0);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = ExecutionConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 350,
            breaker_threshold: 2,
        };
        assert_eq!(backoff_delay(&policy, 1), Duration::from_millis(100));
        assert_eq!(backoff_delay(&policy, 2), Duration::from_millis(200));
        assert_eq!(backoff_delay(&policy, 3), Duration::from_millis(350));
        assert_eq!(backoff_delay(&policy, 4), Duration::from_millis(350));
    }
}
