//! Insight history — persistent findings produced by the learner.
//!
//! Each learning pass appends a `LearnRun` and zero or more `Insight`
//! entries. Insights are append-only: a finding that stops being relevant
//! is marked `Resolved`, never deleted, so the history stays auditable.

use crate::types::{Metric, Tier};
use crate::{error::Result, io, paths};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    /// An org-level metric crossed a tier boundary between cycles.
    Trend,
    /// A repo's metric sits far outside the org median.
    Anomaly,
}

impl InsightCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            InsightCategory::Trend => "trend",
            InsightCategory::Anomaly => "anomaly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightStatus {
    Open,
    Resolved,
}

// ---------------------------------------------------------------------------
// Data types
// ---------------------------------------------------------------------------

/// Points at the observation an insight is based on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceRef {
    /// Snapshot the observation came from.
    pub cycle_ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    pub metric: Metric,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub category: InsightCategory,
    pub description: String,
    pub evidence: Vec<EvidenceRef>,
    pub severity: Tier,
    pub priority: f64,
    pub status: InsightStatus,
    pub cycle_ts: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Insight {
    pub fn new(
        category: InsightCategory,
        description: impl Into<String>,
        severity: Tier,
        priority: f64,
        cycle_ts: u64,
        evidence: Vec<EvidenceRef>,
    ) -> Self {
        let uuid = Uuid::new_v4().simple().to_string();
        Self {
            id: format!("ins-{}", &uuid[..8]),
            category,
            description: description.into(),
            evidence,
            severity,
            priority,
            status: InsightStatus::Open,
            cycle_ts,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}

/// One learner pass over the outcome log and snapshot history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearnRun {
    pub cycle_ts: u64,
    pub run_at: DateTime<Utc>,
    pub generated: u32,
    /// Set when the pass ran with incomplete history and produced weights
    /// without insight generation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InsightHistory {
    #[serde(default)]
    pub runs: Vec<LearnRun>,
    #[serde(default)]
    pub insights: Vec<Insight>,
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

impl InsightHistory {
    /// Load `.steward/insights.yaml`. Returns an empty default if the file
    /// is absent.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::insights_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        let history: Self = serde_yaml::from_str(&data)?;
        Ok(history)
    }

    /// Atomically write `.steward/insights.yaml`.
    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::insights_path(root);
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&path, data.as_bytes())
    }

    /// Record one learner pass: its run entry plus the insights it kept.
    pub fn append_cycle(&mut self, run: LearnRun, insights: Vec<Insight>) {
        self.runs.push(run);
        self.insights.extend(insights);
    }

    pub fn open_insights(&self) -> impl Iterator<Item = &Insight> {
        self.insights
            .iter()
            .filter(|i| i.status == InsightStatus::Open)
    }

    /// How many learn runs have happened since this insight's cycle.
    pub fn age_in_cycles(&self, insight: &Insight) -> u32 {
        self.runs
            .iter()
            .filter(|r| r.cycle_ts > insight.cycle_ts)
            .count() as u32
    }

    /// Stored priority discounted by age: `priority * decay^age_cycles`.
    pub fn effective_priority(&self, insight: &Insight, decay: f64) -> f64 {
        insight.priority * decay.powi(self.age_in_cycles(insight) as i32)
    }

    /// Open insights ranked by age-discounted priority, highest first.
    /// Ties fall back to newer cycle, then id, so the order is stable.
    pub fn top_open(&self, k: usize, decay: f64) -> Vec<&Insight> {
        let mut open: Vec<&Insight> = self.open_insights().collect();
        open.sort_by(|a, b| {
            self.effective_priority(b, decay)
                .total_cmp(&self.effective_priority(a, decay))
                .then_with(|| b.cycle_ts.cmp(&a.cycle_ts))
                .then_with(|| a.id.cmp(&b.id))
        });
        open.truncate(k);
        open
    }

    /// Load, mark the insight `Resolved`, save, and return the updated
    /// entry. Returns `None` if no insight with the given `id` exists.
    pub fn resolve(root: &Path, id: &str) -> Result<Option<Insight>> {
        let mut history = Self::load(root)?;
        let Some(insight) = history.insights.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        insight.status = InsightStatus::Resolved;
        insight.resolved_at = Some(Utc::now());
        let updated = insight.clone();
        history.save(root)?;
        Ok(Some(updated))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
