//! Threshold policy: numeric metric → health tier.
//!
//! Classification is a boundary comparison against a per-metric
//! `TierBounds`; a value equal to a boundary lands in the better tier.
//! Aggregate org health is worst-metric-wins over the org-level means.

use crate::error::{Result, StewardError};
use crate::snapshot::OrgSnapshot;
use crate::types::{Metric, Tier};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// TierBounds
// ---------------------------------------------------------------------------

/// Lower bounds for each tier of one metric. Must be strictly decreasing:
/// `excellent > good > warning > critical`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TierBounds {
    pub excellent: f64,
    pub good: f64,
    pub warning: f64,
    pub critical: f64,
}

impl TierBounds {
    pub fn classify(&self, value: f64) -> Tier {
        if value >= self.excellent {
            Tier::Excellent
        } else if value >= self.good {
            Tier::Good
        } else if value >= self.warning {
            Tier::Warning
        } else {
            Tier::Critical
        }
    }

    fn validate(&self, metric: Metric) -> Result<()> {
        if self.excellent > self.good && self.good > self.warning && self.warning > self.critical
        {
            Ok(())
        } else {
            Err(StewardError::Config(format!(
                "non-monotonic bounds for '{metric}': expected excellent > good > warning > critical, \
                 got {} / {} / {} / {}",
                self.excellent, self.good, self.warning, self.critical
            )))
        }
    }
}

// ---------------------------------------------------------------------------
// ThresholdProfile
// ---------------------------------------------------------------------------

/// Per-metric tier bounds, loaded once per cycle and treated as immutable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdProfile {
    pub bounds: BTreeMap<Metric, TierBounds>,
}

impl ThresholdProfile {
    /// Every tracked metric must carry monotonic bounds. A missing metric or
    /// an inverted bound is a fatal configuration error, never retried.
    pub fn validate(&self) -> Result<()> {
        for metric in Metric::all() {
            let bounds = self.bounds.get(metric).ok_or_else(|| {
                StewardError::Config(format!("missing thresholds for metric '{metric}'"))
            })?;
            bounds.validate(*metric)?;
        }
        Ok(())
    }

    pub fn classify(&self, metric: Metric, value: f64) -> Result<Tier> {
        let bounds = self.bounds.get(&metric).ok_or_else(|| {
            StewardError::Config(format!("missing thresholds for metric '{metric}'"))
        })?;
        Ok(bounds.classify(value))
    }
}

impl Default for ThresholdProfile {
    fn default() -> Self {
        let mut bounds = BTreeMap::new();
        bounds.insert(
            Metric::Activity,
            TierBounds {
                excellent: 80.0,
                good: 60.0,
                warning: 40.0,
                critical: 20.0,
            },
        );
        bounds.insert(
            Metric::DocCompleteness,
            TierBounds {
                excellent: 90.0,
                good: 70.0,
                warning: 50.0,
                critical: 25.0,
            },
        );
        bounds.insert(
            Metric::SecurityPosture,
            TierBounds {
                excellent: 95.0,
                good: 80.0,
                warning: 60.0,
                critical: 30.0,
            },
        );
        bounds.insert(
            Metric::Engagement,
            TierBounds {
                excellent: 75.0,
                good: 50.0,
                warning: 25.0,
                critical: 10.0,
            },
        );
        Self { bounds }
    }
}

// ---------------------------------------------------------------------------
// Org health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricHealth {
    pub value: f64,
    pub tier: Tier,
}

/// Org-level health: per-metric mean and tier, plus the worst-wins overall.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgHealth {
    pub metrics: BTreeMap<Metric, MetricHealth>,
    pub overall: Tier,
}

impl OrgHealth {
    /// Evaluate org health from a snapshot. `None` for an empty snapshot —
    /// no repositories means no evidence, not a failure.
    pub fn evaluate(snapshot: &OrgSnapshot, profile: &ThresholdProfile) -> Result<Option<OrgHealth>> {
        profile.validate()?;
        if snapshot.is_empty() {
            return Ok(None);
        }
        let mut metrics = BTreeMap::new();
        let mut overall = Tier::Excellent;
        for metric in Metric::all() {
            // mean is Some: snapshot is non-empty
            let value = snapshot.metric_mean(*metric).unwrap_or(0.0);
            let tier = profile.classify(*metric, value)?;
            overall = overall.min(tier);
            metrics.insert(*metric, MetricHealth { value, tier });
        }
        Ok(Some(OrgHealth { metrics, overall }))
    }

    /// True when any repo's value for `metric` classifies as Critical.
    /// Drives the selector's context boosts.
    pub fn any_repo_critical(
        snapshot: &OrgSnapshot,
        profile: &ThresholdProfile,
        metric: Metric,
    ) -> Result<bool> {
        for repo in snapshot.repos.values() {
            if profile.classify(metric, repo.metric(metric))? == Tier::Critical {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// True when any repo's value for `metric` classifies at or below `tier`.
    pub fn any_repo_at_or_below(
        snapshot: &OrgSnapshot,
        profile: &ThresholdProfile,
        metric: Metric,
        tier: Tier,
    ) -> Result<bool> {
        for repo in snapshot.repos.values() {
            if profile.classify(metric, repo.metric(metric))? <= tier {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
