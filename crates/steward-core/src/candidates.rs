use crate::snapshot::{OrgSnapshot, RepoMetrics};
use crate::thresholds::ThresholdProfile;
use crate::types::{ActionKind, CycleRequest, Metric, Target, Tier};
use crate::Result;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ActionCandidate
// ---------------------------------------------------------------------------

/// A proposed action derived from snapshot content. Generated fresh each
/// cycle, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionCandidate {
    pub kind: ActionKind,
    pub target: Target,
    pub estimated_cost: f64,
    /// Expected improvement on a 0-100 scale, derived from the metric
    /// deficit the rule observed.
    pub estimated_impact: f64,
}

// ---------------------------------------------------------------------------
// RepoView
// ---------------------------------------------------------------------------

/// Everything a per-repo rule may inspect. Tiers the rules care about are
/// classified once up front so rule conditions stay plain fn pointers.
pub struct RepoView<'a> {
    pub name: &'a str,
    pub metrics: &'a RepoMetrics,
    pub docs_tier: Tier,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A fn-pointer rule over a single repository. No heap allocation, and the
/// table is a plain `Vec` so ordering is fixed at compile time.
pub struct RepoRule {
    pub id: &'static str,
    pub kind: ActionKind,
    pub condition: fn(&RepoView) -> bool,
    pub impact: fn(&RepoView) -> f64,
}

/// A fn-pointer rule over the whole snapshot.
pub struct OrgRule {
    pub id: &'static str,
    pub kind: ActionKind,
    pub condition: fn(&OrgSnapshot) -> bool,
    pub impact: fn(&OrgSnapshot) -> f64,
}

// ---------------------------------------------------------------------------
// Condition / impact helpers
// ---------------------------------------------------------------------------

fn docs_below_warning(view: &RepoView) -> bool {
    view.docs_tier < Tier::Warning
}

fn has_security_flags(view: &RepoView) -> bool {
    !view.metrics.security_flags.is_empty()
}

fn is_outdated(view: &RepoView) -> bool {
    view.metrics.is_outdated()
}

fn docs_deficit(view: &RepoView) -> f64 {
    (100.0 - view.metrics.doc_completeness).clamp(0.0, 100.0)
}

fn security_deficit(view: &RepoView) -> f64 {
    (100.0 - view.metrics.metric(Metric::SecurityPosture)).clamp(0.0, 100.0)
}

fn activity_deficit(view: &RepoView) -> f64 {
    (100.0 - view.metrics.activity_score).clamp(0.0, 100.0)
}

fn org_not_empty(snapshot: &OrgSnapshot) -> bool {
    !snapshot.is_empty()
}

/// Baseline analysis pays off in proportion to how far the fleet has
/// drifted from full activity, floored so a healthy org still gets its
/// periodic sweep.
fn org_activity_deficit(snapshot: &OrgSnapshot) -> f64 {
    let mean = snapshot.metric_mean(Metric::Activity).unwrap_or(100.0);
    (100.0 - mean).max(20.0)
}

// ---------------------------------------------------------------------------
// Default rule tables
// ---------------------------------------------------------------------------

pub fn default_repo_rules() -> Vec<RepoRule> {
    vec![
        // 1. Documentation below the warning bound: push templates/docs sync.
        RepoRule {
            id: "docs_below_warning",
            kind: ActionKind::Sync,
            condition: docs_below_warning,
            impact: docs_deficit,
        },
        // 2. Any open security flag: scan wins by severity.
        RepoRule {
            id: "security_flagged",
            kind: ActionKind::SecurityScan,
            condition: has_security_flags,
            impact: security_deficit,
        },
        // 3. No push in over 90 days: check whether the repo is abandoned.
        RepoRule {
            id: "stale_repo",
            kind: ActionKind::HealthCheck,
            condition: is_outdated,
            impact: activity_deficit,
        },
    ]
}

pub fn default_org_rules() -> Vec<OrgRule> {
    vec![
        // 1. Org-wide analysis baseline, every cycle with a non-empty org.
        OrgRule {
            id: "org_analyze_baseline",
            kind: ActionKind::Analyze,
            condition: org_not_empty,
            impact: org_activity_deficit,
        },
    ]
}

// ---------------------------------------------------------------------------
// Enumeration
// ---------------------------------------------------------------------------

/// Produce every candidate the rule tables match, filtered by the trigger.
///
/// Order is fixed: org rules in table order, then repos in name order with
/// the repo table applied to each. Identical snapshots always produce the
/// identical candidate list.
pub fn enumerate(
    snapshot: &OrgSnapshot,
    profile: &ThresholdProfile,
    request: &CycleRequest,
) -> Result<Vec<ActionCandidate>> {
    let mut out = Vec::new();

    for rule in default_org_rules() {
        if !request.filter.matches(rule.kind) {
            continue;
        }
        let target = Target::OrgWide;
        if !request.scope.matches(&target) {
            continue;
        }
        if (rule.condition)(snapshot) {
            out.push(ActionCandidate {
                kind: rule.kind,
                target,
                estimated_cost: rule.kind.base_cost(),
                estimated_impact: (rule.impact)(snapshot),
            });
        }
    }

    let repo_rules = default_repo_rules();
    for (name, metrics) in &snapshot.repos {
        let view = RepoView {
            name,
            metrics,
            docs_tier: profile.classify(Metric::DocCompleteness, metrics.doc_completeness)?,
        };
        for rule in &repo_rules {
            if !request.filter.matches(rule.kind) {
                continue;
            }
            if !(rule.condition)(&view) {
                continue;
            }
            let target = Target::repo(view.name);
            if !request.scope.matches(&target) {
                continue;
            }
            out.push(ActionCandidate {
                kind: rule.kind,
                target,
                estimated_cost: rule.kind.base_cost(),
                estimated_impact: (rule.impact)(&view),
            });
        }
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
