//! Append-only storage for per-action execution outcomes using redb.
//!
//! # Table design
//!
//! A single `OUTCOMES` table uses a 24-byte composite key:
//! ```text
//! [ cycle_ts: u64 big-endian (8 bytes) | uuid: 16 bytes ]
//! ```
//!
//! The cycle timestamp occupies the high bytes in big-endian encoding, so
//! byte ordering equals cycle ordering. One range scan between a cycle's
//! lower and upper bound returns exactly that cycle's outcomes with no
//! post-filtering, and a full iteration walks cycles oldest to newest.
//!
//! Records are written once and never mutated; the learner's whole history
//! view is a prefix-stable append log.

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::candidates::ActionCandidate;
use crate::error::{Result, StewardError};

// ---------------------------------------------------------------------------
// Table definition
// ---------------------------------------------------------------------------

/// Key: 24-byte composite (cycle_ts big-endian ++ uuid bytes)
/// Value: JSON-encoded ExecutionOutcome
const OUTCOMES: TableDefinition<&[u8], &[u8]> = TableDefinition::new("outcomes");

// ---------------------------------------------------------------------------
// Key helpers
// ---------------------------------------------------------------------------

fn outcome_key(cycle_ts: u64, id: Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&cycle_ts.to_be_bytes());
    key[8..].copy_from_slice(id.as_bytes());
    key
}

fn cycle_lower_bound(cycle_ts: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&cycle_ts.to_be_bytes());
    key
}

/// The UUID suffix is `0xff` × 16, greater than any valid UUID, so the
/// inclusive range up to this bound covers the whole cycle.
fn cycle_upper_bound(cycle_ts: u64) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&cycle_ts.to_be_bytes());
    key[8..].fill(0xff);
    key
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    /// Retries were exhausted after the action had already changed something.
    PartialFailure { reason: String },
    Failed { reason: String },
    /// Skipped by the same-kind circuit breaker. Never attempted, so it
    /// carries no failure signal for learning.
    SkippedAdaptive { reason: String },
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::PartialFailure { .. } => "partial_failure",
            ExecutionStatus::Failed { .. } => "failed",
            ExecutionStatus::SkippedAdaptive { .. } => "skipped_adaptive",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionStatus::Success)
    }

    /// Whether this outcome participates in success-rate arithmetic.
    pub fn counts_toward_rate(&self) -> bool {
        !matches!(self, ExecutionStatus::SkippedAdaptive { .. })
    }

    /// Credit contributed to the success rate: full for success, half for a
    /// partial failure, none otherwise.
    pub fn success_credit(&self) -> f64 {
        match self {
            ExecutionStatus::Success => 1.0,
            ExecutionStatus::PartialFailure { .. } => 0.5,
            _ => 0.0,
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ExecutionOutcome
// ---------------------------------------------------------------------------

/// The record of one executed (or breaker-skipped) plan entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub id: Uuid,
    pub cycle_ts: u64,
    pub candidate: ActionCandidate,
    pub status: ExecutionStatus,
    /// 1-indexed attempt count; 0 for breaker-skipped entries.
    pub attempts: u32,
    pub duration_ms: u64,
    pub effect_summary: String,
    pub recorded_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn new(
        cycle_ts: u64,
        candidate: ActionCandidate,
        status: ExecutionStatus,
        attempts: u32,
        duration_ms: u64,
        effect_summary: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            cycle_ts,
            candidate,
            status,
            attempts,
            duration_ms,
            effect_summary: effect_summary.into(),
            recorded_at: Utc::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// OutcomeLog
// ---------------------------------------------------------------------------

/// Append-only store for `ExecutionOutcome` records.
pub struct OutcomeLog {
    db: Database,
}

impl OutcomeLog {
    /// Open or create the redb database at `path`.
    ///
    /// Creates the `OUTCOMES` table if it doesn't already exist.
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path).map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        // Ensure the table exists before any reads
        let wt = db
            .begin_write()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        wt.open_table(OUTCOMES)
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        wt.commit()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        Ok(Self { db })
    }

    /// Append one outcome. Keys never collide: the UUID suffix is fresh per
    /// record even when two outcomes share a cycle timestamp.
    pub fn append(&self, outcome: &ExecutionOutcome) -> Result<()> {
        let key = outcome_key(outcome.cycle_ts, outcome.id);
        let value =
            serde_json::to_vec(outcome).map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        let wt = self
            .db
            .begin_write()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        {
            let mut table = wt
                .open_table(OUTCOMES)
                .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
            table
                .insert(key.as_slice(), value.as_slice())
                .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        }
        wt.commit()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        Ok(())
    }

    /// All outcomes for one cycle, in insertion-key order.
    pub fn list_cycle(&self, cycle_ts: u64) -> Result<Vec<ExecutionOutcome>> {
        let lower = cycle_lower_bound(cycle_ts);
        let upper = cycle_upper_bound(cycle_ts);
        let rt = self
            .db
            .begin_read()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        let table = rt
            .open_table(OUTCOMES)
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;

        let mut result = Vec::new();
        for entry in table
            .range(lower.as_slice()..=upper.as_slice())
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
            let outcome: ExecutionOutcome = serde_json::from_slice(v.value())
                .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
            result.push(outcome);
        }
        Ok(result)
    }

    /// The most recent `window` cycles with their outcomes, oldest first.
    ///
    /// Key iteration is already cycle-ordered, so grouping is a single pass.
    pub fn recent_cycles(&self, window: usize) -> Result<Vec<(u64, Vec<ExecutionOutcome>)>> {
        let mut groups: Vec<(u64, Vec<ExecutionOutcome>)> = Vec::new();
        for outcome in self.iter_all()? {
            match groups.last_mut() {
                Some((ts, group)) if *ts == outcome.cycle_ts => group.push(outcome),
                _ => groups.push((outcome.cycle_ts, vec![outcome])),
            }
        }
        if groups.len() > window {
            groups.drain(..groups.len() - window);
        }
        Ok(groups)
    }

    /// The newest cycle timestamp present in the log, if any.
    pub fn latest_cycle_ts(&self) -> Result<Option<u64>> {
        Ok(self.iter_all()?.last().map(|o| o.cycle_ts))
    }

    /// All outcomes, newest cycle first.
    pub fn list_all(&self) -> Result<Vec<ExecutionOutcome>> {
        let mut result = self.iter_all()?;
        result.reverse();
        Ok(result)
    }

    fn iter_all(&self) -> Result<Vec<ExecutionOutcome>> {
        let rt = self
            .db
            .begin_read()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
        let table = rt
            .open_table(OUTCOMES)
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;

        let mut result = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| StewardError::OutcomeLog(e.to_string()))?
        {
            let (_, v) = entry.map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
            let outcome: ExecutionOutcome = serde_json::from_slice(v.value())
                .map_err(|e| StewardError::OutcomeLog(e.to_string()))?;
            result.push(outcome);
        }
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
