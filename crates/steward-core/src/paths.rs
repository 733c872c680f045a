use crate::error::{Result, StewardError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const STEWARD_DIR: &str = ".steward";
pub const SNAPSHOTS_DIR: &str = ".steward/snapshots";

pub const CONFIG_FILE: &str = ".steward/config.yaml";
pub const WEIGHTS_FILE: &str = ".steward/weights.yaml";
pub const INSIGHTS_FILE: &str = ".steward/insights.yaml";
pub const OUTCOMES_DB: &str = ".steward/outcomes.redb";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn steward_dir(root: &Path) -> PathBuf {
    root.join(STEWARD_DIR)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn weights_path(root: &Path) -> PathBuf {
    root.join(WEIGHTS_FILE)
}

pub fn insights_path(root: &Path) -> PathBuf {
    root.join(INSIGHTS_FILE)
}

pub fn outcomes_db_path(root: &Path) -> PathBuf {
    root.join(OUTCOMES_DB)
}

pub fn snapshots_dir(root: &Path) -> PathBuf {
    root.join(SNAPSHOTS_DIR)
}

/// Snapshot document for the cycle keyed by `cycle_ts` (epoch millis).
pub fn snapshot_path(root: &Path, cycle_ts: u64) -> PathBuf {
    snapshots_dir(root).join(format!("{cycle_ts}.yaml"))
}

// ---------------------------------------------------------------------------
// Repository name validation
// ---------------------------------------------------------------------------

static REPO_NAME_RE: OnceLock<Regex> = OnceLock::new();

fn repo_name_re() -> &'static Regex {
    REPO_NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9._-]*$").unwrap())
}

pub fn validate_repo_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 100 || !repo_name_re().is_match(name) {
        return Err(StewardError::InvalidRepoName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
