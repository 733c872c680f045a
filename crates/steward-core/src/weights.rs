//! Per-kind priority multipliers, persisted across cycles.
//!
//! Single-writer resource: only the learner mutates weights, and only at
//! end-of-cycle. The selector reads them for the whole cycle. Every write
//! path clamps into the configured bounds so weights cannot drift without
//! limit.

use crate::error::{Result, StewardError};
use crate::types::ActionKind;
use crate::{io, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightState {
    pub weights: BTreeMap<ActionKind, f64>,
}

impl Default for WeightState {
    fn default() -> Self {
        let weights = ActionKind::all().iter().map(|k| (*k, 1.0)).collect();
        Self { weights }
    }
}

impl WeightState {
    /// Multiplier for `kind`; an absent entry reads as neutral 1.0.
    pub fn get(&self, kind: ActionKind) -> f64 {
        self.weights.get(&kind).copied().unwrap_or(1.0)
    }

    /// Multiply `kind`'s weight by `factor`, clamped into `[min, max]`.
    pub fn scale_clamped(&mut self, kind: ActionKind, factor: f64, min: f64, max: f64) {
        let current = self.get(kind);
        self.weights.insert(kind, (current * factor).clamp(min, max));
    }

    /// Reject weights outside `[min, max]` — a hand-edited file with
    /// out-of-bounds values is a fatal configuration error.
    pub fn ensure_within(&self, min: f64, max: f64) -> Result<()> {
        for (kind, w) in &self.weights {
            if *w < min || *w > max {
                return Err(StewardError::Config(format!(
                    "weight for '{kind}' is {w}, outside [{min}, {max}]"
                )));
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------------
    // Persistence
    // ---------------------------------------------------------------------------

    /// Load from `.steward/weights.yaml`; a missing file means neutral
    /// defaults (first cycle), a corrupt file is a fatal config error.
    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::weights_path(root);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = std::fs::read_to_string(&path)?;
        serde_yaml::from_str(&data)
            .map_err(|e| StewardError::Config(format!("unreadable weights file: {e}")))
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let data = serde_yaml::to_string(self)?;
        io::atomic_write(&paths::weights_path(root), data.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
