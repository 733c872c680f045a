//! Point-in-time view of an organization's repositories.
//!
//! An `OrgSnapshot` is immutable once built — one per orchestration cycle,
//! persisted under `.steward/snapshots/<cycle_ts>.yaml` so the learner can
//! compare consecutive cycles. `RepoMetrics::derive` is the single place raw
//! platform signals become scored metrics; the fetch layer stays a thin
//! collector.

use crate::error::Result;
use crate::types::Metric;
use crate::{io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

// ---------------------------------------------------------------------------
// RepoSignals
// ---------------------------------------------------------------------------

/// Raw per-repository facts as fetched from the platform, before scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepoSignals {
    pub last_push_age_days: u32,
    pub has_readme: bool,
    pub description_len: usize,
    pub open_vulnerabilities: Vec<String>,
    pub primary_language: Option<String>,
    pub contributor_count: u32,
    pub archived: bool,
}

// ---------------------------------------------------------------------------
// RepoMetrics
// ---------------------------------------------------------------------------

/// Scored metrics for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoMetrics {
    pub activity_score: f64,
    pub doc_completeness: f64,
    pub security_flags: BTreeSet<String>,
    pub primary_language: Option<String>,
    pub contributor_count: u32,
    pub last_push_age_days: u32,
}

impl RepoMetrics {
    /// Score raw signals on fixed 0–100 scales.
    ///
    /// Activity is piecewise linear on last-push age: repos pushed within 30
    /// days are active (70–100), stale through 90 days (25–70), outdated
    /// beyond that, zero after a year or when archived. Docs score README
    /// presence at 60 points and a real description (10+ characters) at 40.
    /// Each open vulnerability flag costs 25 security points.
    pub fn derive(signals: &RepoSignals) -> Self {
        let age = signals.last_push_age_days as f64;
        let activity_score = if signals.archived {
            0.0
        } else if age <= 30.0 {
            100.0 - age
        } else if age <= 90.0 {
            70.0 - (age - 30.0) * 0.75
        } else if age <= 365.0 {
            25.0 - (age - 90.0) * (25.0 / 275.0)
        } else {
            0.0
        };

        let mut doc_completeness = 0.0;
        if signals.has_readme {
            doc_completeness += 60.0;
        }
        if signals.description_len >= 10 {
            doc_completeness += 40.0;
        }

        Self {
            activity_score,
            doc_completeness,
            security_flags: signals.open_vulnerabilities.iter().cloned().collect(),
            primary_language: signals.primary_language.clone(),
            contributor_count: signals.contributor_count,
            last_push_age_days: signals.last_push_age_days,
        }
    }

    /// Numeric view of a tracked metric.
    ///
    /// `SecurityPosture` and `Engagement` are derived on access so the stored
    /// model stays the raw flag set and contributor count.
    pub fn metric(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Activity => self.activity_score,
            Metric::DocCompleteness => self.doc_completeness,
            Metric::SecurityPosture => {
                (100.0 - 25.0 * self.security_flags.len() as f64).max(0.0)
            }
            Metric::Engagement => (self.contributor_count as f64 * 5.0).min(100.0),
        }
    }

    pub fn is_active(&self) -> bool {
        self.last_push_age_days <= 30
    }

    pub fn is_outdated(&self) -> bool {
        self.last_push_age_days > 90
    }
}

// ---------------------------------------------------------------------------
// OrgSnapshot
// ---------------------------------------------------------------------------

/// Immutable per-cycle mapping from repository name to scored metrics.
/// `BTreeMap` keeps iteration order deterministic for selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgSnapshot {
    pub org: String,
    pub captured_at: DateTime<Utc>,
    pub repos: BTreeMap<String, RepoMetrics>,
}

impl OrgSnapshot {
    pub fn from_signals(org: impl Into<String>, signals: Vec<(String, RepoSignals)>) -> Self {
        let repos = signals
            .into_iter()
            .map(|(name, s)| (name, RepoMetrics::derive(&s)))
            .collect();
        Self {
            org: org.into(),
            captured_at: Utc::now(),
            repos,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.repos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.repos.len()
    }

    /// Mean of `metric` across all repos; `None` for an empty snapshot.
    pub fn metric_mean(&self, metric: Metric) -> Option<f64> {
        if self.repos.is_empty() {
            return None;
        }
        let sum: f64 = self.repos.values().map(|m| m.metric(metric)).sum();
        Some(sum / self.repos.len() as f64)
    }

    /// Median of `metric` across all repos; `None` for an empty snapshot.
    pub fn metric_median(&self, metric: Metric) -> Option<f64> {
        if self.repos.is_empty() {
            return None;
        }
        let mut values: Vec<f64> = self.repos.values().map(|m| m.metric(metric)).collect();
        values.sort_by(|a, b| a.total_cmp(b));
        let mid = values.len() / 2;
        if values.len() % 2 == 0 {
            Some((values[mid - 1] + values[mid]) / 2.0)
        } else {
            Some(values[mid])
        }
    }

    pub fn outdated_count(&self) -> usize {
        self.repos.values().filter(|m| m.is_outdated()).count()
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    pub fn save(&self, root: &Path, cycle_ts: u64) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::snapshot_path(root, cycle_ts), data.as_bytes())
    }

    pub fn load(root: &Path, cycle_ts: u64) -> Result<OrgSnapshot> {
        let data = std::fs::read_to_string(paths::snapshot_path(root, cycle_ts))?;
        Ok(serde_yaml::from_str(&data)?)
    }

    /// The most recent persisted snapshot, if any.
    pub fn latest(root: &Path) -> Result<Option<(u64, OrgSnapshot)>> {
        match list_cycle_ts(root)?.last() {
            Some(&ts) => Ok(Some((ts, OrgSnapshot::load(root, ts)?))),
            None => Ok(None),
        }
    }

    /// The most recent persisted snapshot strictly older than `cycle_ts`.
    /// This is the learner's "previous cycle" view.
    pub fn latest_before(root: &Path, cycle_ts: u64) -> Result<Option<(u64, OrgSnapshot)>> {
        let prior = list_cycle_ts(root)?
            .into_iter()
            .filter(|&ts| ts < cycle_ts)
            .next_back();
        match prior {
            Some(ts) => Ok(Some((ts, OrgSnapshot::load(root, ts)?))),
            None => Ok(None),
        }
    }

    /// Delete all but the newest `keep` snapshots. Returns how many were removed.
    pub fn prune(root: &Path, keep: usize) -> Result<usize> {
        let all = list_cycle_ts(root)?;
        if all.len() <= keep {
            return Ok(0);
        }
        let excess = &all[..all.len() - keep];
        for &ts in excess {
            std::fs::remove_file(paths::snapshot_path(root, ts))?;
        }
        Ok(excess.len())
    }
}

/// Cycle timestamps with a persisted snapshot, ascending.
fn list_cycle_ts(root: &Path) -> Result<Vec<u64>> {
    let dir = paths::snapshots_dir(root);
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&dir)? {
        let path = entry?.path();
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(ts) = stem.parse::<u64>() {
            out.push(ts);
        }
    }
    out.sort_unstable();
    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
