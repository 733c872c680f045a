//! Adaptive learning — closes the loop from recorded outcomes back into
//! selection weights and operator-facing insights.
//!
//! The learner is the only writer of `WeightState`. It runs strictly after
//! execution, reads the windowed outcome history plus the current and
//! previous snapshots, and produces the next weight state together with
//! trend and anomaly insights. Missing evidence degrades the pass (weights
//! carry through unchanged for the affected part) but never fails it.

use std::collections::BTreeMap;

use tracing::warn;

use crate::config::LearningConfig;
use crate::insight::{EvidenceRef, Insight, InsightCategory};
use crate::outcome::ExecutionOutcome;
use crate::snapshot::OrgSnapshot;
use crate::thresholds::ThresholdProfile;
use crate::types::{ActionKind, Metric, Tier};
use crate::weights::WeightState;
use crate::Result;

// ---------------------------------------------------------------------------
// Input / output
// ---------------------------------------------------------------------------

pub struct LearnInput<'a> {
    pub cycle_ts: u64,
    pub snapshot: &'a OrgSnapshot,
    /// The most recent snapshot strictly older than `cycle_ts`, if any.
    pub previous: Option<(u64, &'a OrgSnapshot)>,
    /// Windowed outcome history, oldest cycle first, current cycle included.
    pub history: &'a [(u64, Vec<ExecutionOutcome>)],
}

pub struct LearnOutput {
    pub weights: WeightState,
    pub insights: Vec<Insight>,
    /// Human-readable reasons the pass ran on incomplete evidence.
    pub degraded: Option<String>,
}

// ---------------------------------------------------------------------------
// Success rates / weight update
// ---------------------------------------------------------------------------

/// Per-kind success rate over the window. Success counts 1, PartialFailure
/// ½, Failed 0; breaker-skipped entries are excluded entirely. Kinds with
/// no countable outcome are absent from the map.
fn success_rates(history: &[(u64, Vec<ExecutionOutcome>)]) -> BTreeMap<ActionKind, f64> {
    let mut tally: BTreeMap<ActionKind, (f64, u32)> = BTreeMap::new();
    for (_, outcomes) in history {
        for outcome in outcomes {
            if !outcome.status.counts_toward_rate() {
                continue;
            }
            let entry = tally.entry(outcome.candidate.kind).or_insert((0.0, 0));
            entry.0 += outcome.status.success_credit();
            entry.1 += 1;
        }
    }
    tally
        .into_iter()
        .map(|(kind, (credit, count))| (kind, credit / f64::from(count)))
        .collect()
}

fn update_weights(
    weights: &WeightState,
    rates: &BTreeMap<ActionKind, f64>,
    policy: &LearningConfig,
) -> WeightState {
    let mut next = weights.clone();
    for (kind, rate) in rates {
        if *rate >= policy.high_threshold {
            next.scale_clamped(*kind, policy.growth, policy.weight_min, policy.weight_max);
        } else if *rate <= policy.low_threshold {
            next.scale_clamped(*kind, policy.decay, policy.weight_min, policy.weight_max);
        }
    }
    next
}

// ---------------------------------------------------------------------------
// Insight generation
// ---------------------------------------------------------------------------

/// Severity points floored at 1 so improvements still surface in ranking.
fn priority_for(tier: Tier) -> f64 {
    f64::from(tier.severity_points().max(1))
}

fn trend_insights(input: &LearnInput, profile: &ThresholdProfile) -> Result<Vec<Insight>> {
    let Some((prev_ts, prev)) = input.previous else {
        return Ok(Vec::new());
    };
    let mut out = Vec::new();
    for metric in Metric::all() {
        let (Some(now), Some(before)) = (
            input.snapshot.metric_mean(*metric),
            prev.metric_mean(*metric),
        ) else {
            continue;
        };
        let now_tier = profile.classify(*metric, now)?;
        let before_tier = profile.classify(*metric, before)?;
        if now_tier == before_tier {
            continue;
        }
        let verb = if now_tier > before_tier {
            "improved"
        } else {
            "dropped"
        };
        out.push(Insight::new(
            InsightCategory::Trend,
            format!("org {metric} {verb} from {before_tier} to {now_tier}"),
            now_tier,
            priority_for(now_tier),
            input.cycle_ts,
            vec![
                EvidenceRef {
                    cycle_ts: prev_ts,
                    repo: None,
                    metric: *metric,
                    value: before,
                },
                EvidenceRef {
                    cycle_ts: input.cycle_ts,
                    repo: None,
                    metric: *metric,
                    value: now,
                },
            ],
        ));
    }
    Ok(out)
}

fn anomaly_insights(
    input: &LearnInput,
    profile: &ThresholdProfile,
    policy: &LearningConfig,
) -> Result<Vec<Insight>> {
    let mut out = Vec::new();
    for metric in Metric::all() {
        let Some(median) = input.snapshot.metric_median(*metric) else {
            continue;
        };
        // a zero median means the whole org is at the floor: deviation from
        // it carries no signal
        if median == 0.0 {
            continue;
        }
        let limit = policy.anomaly_deviation * median;
        for (name, repo) in &input.snapshot.repos {
            let value = repo.metric(*metric);
            if (value - median).abs() <= limit {
                continue;
            }
            let tier = profile.classify(*metric, value)?;
            let direction = if value < median { "below" } else { "above" };
            out.push(Insight::new(
                InsightCategory::Anomaly,
                format!(
                    "{name}: {metric} {value:.0} is far {direction} the org median {median:.0}"
                ),
                tier,
                priority_for(tier),
                input.cycle_ts,
                vec![EvidenceRef {
                    cycle_ts: input.cycle_ts,
                    repo: Some(name.clone()),
                    metric: *metric,
                    value,
                }],
            ));
        }
    }
    Ok(out)
}

/// Highest priority first; ties fall back to content so the order never
/// depends on generated ids.
fn rank_and_cap(mut insights: Vec<Insight>, top_k: usize) -> Vec<Insight> {
    insights.sort_by(|a, b| {
        b.priority
            .total_cmp(&a.priority)
            .then_with(|| a.category.as_str().cmp(b.category.as_str()))
            .then_with(|| a.description.cmp(&b.description))
    });
    insights.truncate(top_k);
    insights
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// One learning pass. Deterministic given the same history and snapshots,
/// up to generated insight ids and timestamps.
pub fn learn(
    input: &LearnInput,
    weights: &WeightState,
    profile: &ThresholdProfile,
    policy: &LearningConfig,
) -> Result<LearnOutput> {
    let mut degraded: Vec<String> = Vec::new();

    let next_weights = if input.history.is_empty() {
        degraded.push("no outcome history; weights unchanged".to_string());
        weights.clone()
    } else {
        let rates = success_rates(input.history);
        update_weights(weights, &rates, policy)
    };

    if input.previous.is_none() {
        degraded.push("no prior snapshot; trend analysis skipped".to_string());
    }
    let mut insights = trend_insights(input, profile)?;
    insights.extend(anomaly_insights(input, profile, policy)?);
    let insights = rank_and_cap(insights, policy.top_k);

    let degraded = if degraded.is_empty() {
        None
    } else {
        let reason = degraded.join("; ");
        warn!(reason = %reason, "learning pass degraded");
        Some(reason)
    };

    Ok(LearnOutput {
        weights: next_weights,
        insights,
        degraded,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
