use crate::candidates::{self, ActionCandidate};
use crate::config::{BudgetConfig, SelectionConfig};
use crate::snapshot::OrgSnapshot;
use crate::thresholds::{OrgHealth, ThresholdProfile};
use crate::types::{ActionKind, CycleRequest, Metric, Target, Tier};
use crate::weights::WeightState;
use crate::Result;
use serde::Serialize;
use std::collections::BTreeSet;

// ---------------------------------------------------------------------------
// ScoredCandidate / ActionPlan
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: ActionCandidate,
    pub raw_score: f64,
}

/// The ordered result of one selection pass. Invariants: no duplicate
/// `(kind, target)` pair, cumulative cost within `budget.max_cost`, length
/// within `budget.max_actions`.
#[derive(Debug, Clone, Serialize)]
pub struct ActionPlan {
    pub actions: Vec<ScoredCandidate>,
    pub total_cost: f64,
    pub budget: BudgetConfig,
    /// The weights the scores were computed under, kept for audit output.
    pub weights_used: WeightState,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }
}

// ---------------------------------------------------------------------------
// Scoring context
// ---------------------------------------------------------------------------

/// Org-level facts the context multiplier depends on, classified once per
/// selection pass rather than per candidate.
struct ScoringContext {
    security_critical: bool,
    many_outdated: bool,
    docs_lagging: bool,
}

impl ScoringContext {
    fn build(
        snapshot: &OrgSnapshot,
        profile: &ThresholdProfile,
        selection: &SelectionConfig,
    ) -> Result<Self> {
        Ok(Self {
            security_critical: OrgHealth::any_repo_critical(
                snapshot,
                profile,
                Metric::SecurityPosture,
            )?,
            many_outdated: snapshot.outdated_count() > selection.outdated_repo_limit,
            docs_lagging: OrgHealth::any_repo_at_or_below(
                snapshot,
                profile,
                Metric::DocCompleteness,
                Tier::Warning,
            )?,
        })
    }
}

fn context_multiplier(
    candidate: &ActionCandidate,
    ctx: &ScoringContext,
    selection: &SelectionConfig,
    budget: &BudgetConfig,
) -> f64 {
    let mut m = 1.0;
    match candidate.kind {
        ActionKind::SecurityScan if ctx.security_critical => m *= selection.security_boost,
        ActionKind::Sync | ActionKind::HealthCheck if ctx.many_outdated => {
            m *= selection.maintenance_boost
        }
        ActionKind::Analyze if ctx.docs_lagging => m *= selection.docs_boost,
        _ => {}
    }
    if candidate.estimated_cost > selection.cost_decay_threshold * budget.max_cost {
        m *= selection.cost_decay_factor;
    }
    m
}

// ---------------------------------------------------------------------------
// Scoring and admission
// ---------------------------------------------------------------------------

fn score_candidates(
    candidates: Vec<ActionCandidate>,
    weights: &WeightState,
    ctx: &ScoringContext,
    selection: &SelectionConfig,
    budget: &BudgetConfig,
) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| {
            let raw_score = candidate.estimated_impact
                * weights.get(candidate.kind)
                * context_multiplier(&candidate, ctx, selection, budget);
            ScoredCandidate {
                candidate,
                raw_score,
            }
        })
        .collect();

    // Descending score; ties broken by lower cost then target id so equal
    // scores still sort identically across runs.
    scored.sort_by(|a, b| {
        b.raw_score
            .total_cmp(&a.raw_score)
            .then_with(|| {
                a.candidate
                    .estimated_cost
                    .total_cmp(&b.candidate.estimated_cost)
            })
            .then_with(|| a.candidate.target.id().cmp(b.candidate.target.id()))
    });
    scored
}

/// Greedy admission in score order. A candidate that would blow the cost
/// budget is skipped, not a hard stop: cheaper lower-ranked candidates that
/// still fit are admitted after it.
fn admit(scored: Vec<ScoredCandidate>, budget: &BudgetConfig, weights: &WeightState) -> ActionPlan {
    let mut actions = Vec::new();
    let mut seen: BTreeSet<(ActionKind, Target)> = BTreeSet::new();
    let mut total_cost = 0.0;

    for sc in scored {
        if actions.len() >= budget.max_actions {
            break;
        }
        let key = (sc.candidate.kind, sc.candidate.target.clone());
        if seen.contains(&key) {
            continue;
        }
        if total_cost + sc.candidate.estimated_cost > budget.max_cost {
            continue;
        }
        total_cost += sc.candidate.estimated_cost;
        seen.insert(key);
        actions.push(sc);
    }

    ActionPlan {
        actions,
        total_cost,
        budget: *budget,
        weights_used: weights.clone(),
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Build the cycle's plan: enumerate, score, sort, admit under budget.
///
/// Empty snapshot produces an empty plan, not an error.
pub fn select(
    snapshot: &OrgSnapshot,
    weights: &WeightState,
    profile: &ThresholdProfile,
    selection: &SelectionConfig,
    budget: &BudgetConfig,
    request: &CycleRequest,
) -> Result<ActionPlan> {
    let candidates = candidates::enumerate(snapshot, profile, request)?;
    let ctx = ScoringContext::build(snapshot, profile, selection)?;
    let scored = score_candidates(candidates, weights, &ctx, selection, budget);
    Ok(admit(scored, budget, weights))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::RepoSignals;

    fn selection() -> SelectionConfig {
        SelectionConfig::default()
    }

    fn budget() -> BudgetConfig {
        BudgetConfig::default()
    }

    fn healthy_signals() -> RepoSignals {
        RepoSignals {
            last_push_age_days: 5,
            has_readme: true,
            description_len: 40,
            open_vulnerabilities: vec![],
            primary_language: Some("rust".into()),
            contributor_count: 8,
            archived: false,
        }
    }

    fn snapshot_with(signals: Vec<(&str, RepoSignals)>) -> OrgSnapshot {
        OrgSnapshot::from_signals(
            "acme",
            signals
                .into_iter()
                .map(|(n, s)| (n.to_string(), s))
                .collect(),
        )
    }

    fn candidate(kind: ActionKind, target: Target, cost: f64, impact: f64) -> ActionCandidate {
        ActionCandidate {
            kind,
            target,
            estimated_cost: cost,
            estimated_impact: impact,
        }
    }

    fn neutral_ctx() -> ScoringContext {
        ScoringContext {
            security_critical: false,
            many_outdated: false,
            docs_lagging: false,
        }
    }

    #[test]
    fn empty_snapshot_gives_empty_plan() {
        let plan = select(
            &snapshot_with(vec![]),
            &WeightState::default(),
            &ThresholdProfile::default(),
            &selection(),
            &budget(),
            &CycleRequest::default(),
        )
        .unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.total_cost, 0.0);
    }

    #[test]
    fn raw_score_is_impact_times_weight_times_multiplier() {
        let cands = vec![candidate(
            ActionKind::HealthCheck,
            Target::repo("alpha"),
            2.0,
            60.0,
        )];
        let mut weights = WeightState::default();
        weights.scale_clamped(ActionKind::HealthCheck, 1.5, 0.1, 3.0);
        let scored = score_candidates(cands, &weights, &neutral_ctx(), &selection(), &budget());
        assert!((scored[0].raw_score - 60.0 * 1.5).abs() < 1e-9);
    }

    #[test]
    fn security_boost_applies_when_any_repo_is_critical() {
        // three flags: posture 25, below the default critical bound of 30
        let mut bad = healthy_signals();
        bad.open_vulnerabilities = vec!["a".into(), "b".into(), "c".into()];
        let snap = snapshot_with(vec![("alpha", bad)]);
        let ctx = ScoringContext::build(&snap, &ThresholdProfile::default(), &selection()).unwrap();
        assert!(ctx.security_critical);

        let c = candidate(ActionKind::SecurityScan, Target::repo("alpha"), 8.0, 75.0);
        let m = context_multiplier(&c, &ctx, &selection(), &budget());
        assert!((m - 1.3).abs() < 1e-9);
    }

    #[test]
    fn maintenance_boost_needs_more_than_limit_outdated() {
        let mut stale = healthy_signals();
        stale.last_push_age_days = 200;
        // exactly at the limit: no boost
        let snap = snapshot_with(vec![
            ("a", stale.clone()),
            ("b", stale.clone()),
            ("c", stale.clone()),
        ]);
        let ctx = ScoringContext::build(&snap, &ThresholdProfile::default(), &selection()).unwrap();
        assert!(!ctx.many_outdated);

        let snap = snapshot_with(vec![
            ("a", stale.clone()),
            ("b", stale.clone()),
            ("c", stale.clone()),
            ("d", stale),
        ]);
        let ctx = ScoringContext::build(&snap, &ThresholdProfile::default(), &selection()).unwrap();
        assert!(ctx.many_outdated);

        let c = candidate(ActionKind::Sync, Target::repo("a"), 3.0, 50.0);
        let m = context_multiplier(&c, &ctx, &selection(), &budget());
        assert!((m - 1.2).abs() < 1e-9);
    }

    #[test]
    fn docs_boost_applies_to_analyze_only() {
        let ctx = ScoringContext {
            security_critical: false,
            many_outdated: false,
            docs_lagging: true,
        };
        let analyze = candidate(ActionKind::Analyze, Target::OrgWide, 5.0, 40.0);
        let sync = candidate(ActionKind::Sync, Target::repo("a"), 3.0, 40.0);
        assert!(
            (context_multiplier(&analyze, &ctx, &selection(), &budget()) - 1.1).abs() < 1e-9
        );
        assert!((context_multiplier(&sync, &ctx, &selection(), &budget()) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cost_decay_hits_expensive_candidates() {
        let tight = BudgetConfig {
            max_cost: 15.0,
            max_actions: 10,
        };
        // threshold 0.4 * 15 = 6: scan at 8 decays, sync at 3 does not
        let scan = candidate(ActionKind::SecurityScan, Target::repo("a"), 8.0, 50.0);
        let sync = candidate(ActionKind::Sync, Target::repo("a"), 3.0, 50.0);
        let ctx = neutral_ctx();
        assert!((context_multiplier(&scan, &ctx, &selection(), &tight) - 0.75).abs() < 1e-9);
        assert!((context_multiplier(&sync, &ctx, &selection(), &tight) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn sort_is_score_desc_then_cost_then_target() {
        let cands = vec![
            candidate(ActionKind::SecurityScan, Target::repo("zeta"), 8.0, 50.0),
            candidate(ActionKind::Sync, Target::repo("beta"), 3.0, 50.0),
            candidate(ActionKind::HealthCheck, Target::repo("alpha"), 3.0, 50.0),
            candidate(ActionKind::Analyze, Target::OrgWide, 5.0, 90.0),
        ];
        let scored = score_candidates(
            cands,
            &WeightState::default(),
            &neutral_ctx(),
            &selection(),
            &budget(),
        );
        // highest score first
        assert_eq!(scored[0].candidate.kind, ActionKind::Analyze);
        // among the 50s: cost 3 before cost 8, then id order alpha < beta
        assert_eq!(scored[1].candidate.target, Target::repo("alpha"));
        assert_eq!(scored[2].candidate.target, Target::repo("beta"));
        assert_eq!(scored[3].candidate.target, Target::repo("zeta"));
    }

    #[test]
    fn over_budget_candidate_is_skipped_not_fatal() {
        let tight = BudgetConfig {
            max_cost: 10.0,
            max_actions: 10,
        };
        let scored = score_candidates(
            vec![
                candidate(ActionKind::SecurityScan, Target::repo("a"), 8.0, 90.0),
                candidate(ActionKind::SecurityScan, Target::repo("b"), 8.0, 80.0),
                candidate(ActionKind::Sync, Target::repo("c"), 2.0, 10.0),
            ],
            &WeightState::default(),
            &neutral_ctx(),
            &selection(),
            &tight,
        );
        let plan = admit(scored, &tight, &WeightState::default());
        // first scan fits (8), second would hit 16 > 10 and is skipped,
        // the cheap sync still gets in (10 total)
        assert_eq!(plan.len(), 2);
        assert_eq!(plan.actions[0].candidate.target, Target::repo("a"));
        assert_eq!(plan.actions[1].candidate.target, Target::repo("c"));
        assert_eq!(plan.total_cost, 10.0);
    }

    #[test]
    fn admission_is_monotonic_across_budgets() {
        // Same scored list, growing cost budget: every admitted action stays
        // admitted when the budget grows.
        let scored = vec![
            ScoredCandidate {
                candidate: candidate(ActionKind::Sync, Target::repo("alpha"), 3.0, 90.0),
                raw_score: 90.0,
            },
            ScoredCandidate {
                candidate: candidate(ActionKind::HealthCheck, Target::repo("beta"), 2.0, 80.0),
                raw_score: 80.0,
            },
            ScoredCandidate {
                candidate: candidate(ActionKind::SecurityScan, Target::repo("gamma"), 8.0, 70.0),
                raw_score: 70.0,
            },
            ScoredCandidate {
                candidate: candidate(ActionKind::Sync, Target::repo("delta"), 2.0, 60.0),
                raw_score: 60.0,
            },
        ];

        let keys = |plan: &ActionPlan| -> Vec<(ActionKind, String)> {
            plan.actions
                .iter()
                .map(|sc| (sc.candidate.kind, sc.candidate.target.id().to_string()))
                .collect()
        };

        let mut previous: Vec<(ActionKind, String)> = Vec::new();
        for max_cost in [5.0, 13.0, 15.0] {
            let b = BudgetConfig {
                max_cost,
                max_actions: 10,
            };
            let plan = admit(scored.clone(), &b, &WeightState::default());
            let current = keys(&plan);
            assert!(
                previous.iter().all(|k| current.contains(k)),
                "budget {max_cost} dropped an action admitted under a smaller budget"
            );
            assert!(current.len() >= previous.len());
            previous = current;
        }
        assert_eq!(previous.len(), 4);
    }

    #[test]
    fn max_actions_caps_plan_length() {
        let two = BudgetConfig {
            max_cost: 100.0,
            max_actions: 2,
        };
        let scored = score_candidates(
            vec![
                candidate(ActionKind::Sync, Target::repo("a"), 3.0, 90.0),
                candidate(ActionKind::Sync, Target::repo("b"), 3.0, 80.0),
                candidate(ActionKind::Sync, Target::repo("c"), 3.0, 70.0),
            ],
            &WeightState::default(),
            &neutral_ctx(),
            &selection(),
            &two,
        );
        let plan = admit(scored, &two, &WeightState::default());
        assert_eq!(plan.len(), 2);
    }

    #[test]
    fn duplicate_kind_target_is_admitted_once() {
        let scored = score_candidates(
            vec![
                candidate(ActionKind::Sync, Target::repo("a"), 3.0, 90.0),
                candidate(ActionKind::Sync, Target::repo("a"), 3.0, 40.0),
            ],
            &WeightState::default(),
            &neutral_ctx(),
            &selection(),
            &budget(),
        );
        let plan = admit(scored, &budget(), &WeightState::default());
        assert_eq!(plan.len(), 1);
        assert!((plan.actions[0].raw_score - 90.0).abs() < 1e-9);
    }

    #[test]
    fn critical_security_repo_ranks_its_scan_first() {
        // One flagged repo under a strict security profile. The flag alone
        // gives the scan impact 25; the org analyze baseline scores 28. Only
        // the critical-posture boost (×1.3 → 32.5) puts the scan first.
        let mut signals = healthy_signals();
        signals.last_push_age_days = 28; // activity 72 → analyze impact 28
        signals.open_vulnerabilities = vec!["CVE-123".into()];
        let snap = snapshot_with(vec![("flagged", signals)]);

        let mut profile = ThresholdProfile::default();
        profile.bounds.insert(
            Metric::SecurityPosture,
            crate::thresholds::TierBounds {
                excellent: 95.0,
                good: 90.0,
                warning: 85.0,
                critical: 80.0,
            },
        );

        let plan = select(
            &snap,
            &WeightState::default(),
            &profile,
            &selection(),
            &budget(),
            &CycleRequest::default(),
        )
        .unwrap();

        assert!(plan.len() >= 2);
        assert_eq!(plan.actions[0].candidate.kind, ActionKind::SecurityScan);
        assert_eq!(plan.actions[0].candidate.target, Target::repo("flagged"));
        assert!((plan.actions[0].raw_score - 32.5).abs() < 1e-9);
    }

    #[test]
    fn selection_is_deterministic_end_to_end() {
        let mut a = healthy_signals();
        a.open_vulnerabilities = vec!["x".into()];
        let mut b = healthy_signals();
        b.last_push_age_days = 150;
        let mut c = healthy_signals();
        c.has_readme = false;
        c.description_len = 0;
        let snap = snapshot_with(vec![("rho", a), ("sigma", b), ("tau", c)]);

        let run = || {
            select(
                &snap,
                &WeightState::default(),
                &ThresholdProfile::default(),
                &selection(),
                &budget(),
                &CycleRequest::default(),
            )
            .unwrap()
        };
        let first = run();
        let second = run();
        assert_eq!(first.actions, second.actions);
        assert!(first.total_cost <= first.budget.max_cost);
        assert!(first.len() <= first.budget.max_actions);
    }

    #[test]
    fn weights_steer_the_ranking() {
        let cands = vec![
            candidate(ActionKind::Sync, Target::repo("a"), 3.0, 50.0),
            candidate(ActionKind::HealthCheck, Target::repo("b"), 2.0, 50.0),
        ];
        let mut weights = WeightState::default();
        weights.scale_clamped(ActionKind::Sync, 0.5, 0.1, 3.0);
        let scored = score_candidates(cands, &weights, &neutral_ctx(), &selection(), &budget());
        assert_eq!(scored[0].candidate.kind, ActionKind::HealthCheck);
        assert_eq!(scored[1].candidate.kind, ActionKind::Sync);
    }
}
