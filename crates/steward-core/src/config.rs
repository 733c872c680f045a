use crate::error::{Result, StewardError};
use crate::paths;
use crate::thresholds::ThresholdProfile;
use serde::{Deserialize, Serialize};
use std::path::Path;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

// ---------------------------------------------------------------------------
// OrgConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrgConfig {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// ForgeConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgeConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Environment variable holding the API token. The token itself is never
    /// written to disk.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_token_env() -> String {
    "FORGE_TOKEN".to_string()
}

fn default_fetch_concurrency() -> usize {
    4
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for ForgeConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token_env: default_token_env(),
            fetch_concurrency: default_fetch_concurrency(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

// ---------------------------------------------------------------------------
// BudgetConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BudgetConfig {
    #[serde(default = "default_max_cost")]
    pub max_cost: f64,
    #[serde(default = "default_max_actions")]
    pub max_actions: usize,
}

fn default_max_cost() -> f64 {
    25.0
}

fn default_max_actions() -> usize {
    10
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            max_cost: default_max_cost(),
            max_actions: default_max_actions(),
        }
    }
}

// ---------------------------------------------------------------------------
// SelectionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Boost on SecurityScan candidates while any repo's security posture is
    /// Critical.
    #[serde(default = "default_security_boost")]
    pub security_boost: f64,
    /// Boost on Sync/HealthCheck candidates when the outdated-repo count
    /// exceeds `outdated_repo_limit`.
    #[serde(default = "default_maintenance_boost")]
    pub maintenance_boost: f64,
    /// Boost on Analyze candidates when any repo's docs are Warning or worse.
    #[serde(default = "default_docs_boost")]
    pub docs_boost: f64,
    #[serde(default = "default_outdated_repo_limit")]
    pub outdated_repo_limit: usize,
    /// Candidates whose cost exceeds this fraction of max_cost are decayed.
    #[serde(default = "default_cost_decay_threshold")]
    pub cost_decay_threshold: f64,
    #[serde(default = "default_cost_decay_factor")]
    pub cost_decay_factor: f64,
}

fn default_security_boost() -> f64 {
    1.3
}

fn default_maintenance_boost() -> f64 {
    1.2
}

fn default_docs_boost() -> f64 {
    1.1
}

fn default_outdated_repo_limit() -> usize {
    3
}

fn default_cost_decay_threshold() -> f64 {
    0.4
}

fn default_cost_decay_factor() -> f64 {
    0.75
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            security_boost: default_security_boost(),
            maintenance_boost: default_maintenance_boost(),
            docs_boost: default_docs_boost(),
            outdated_repo_limit: default_outdated_repo_limit(),
            cost_decay_threshold: default_cost_decay_threshold(),
            cost_decay_factor: default_cost_decay_factor(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExecutionConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of retries after the first attempt.
    /// `0` means one attempt total, `2` means up to three attempts.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Consecutive same-kind failures before later candidates of that kind
    /// are skipped for the rest of the cycle.
    #[serde(default = "default_breaker_threshold")]
    pub breaker_threshold: u32,
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_breaker_threshold() -> u32 {
    2
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            breaker_threshold: default_breaker_threshold(),
        }
    }
}

// ---------------------------------------------------------------------------
// LearningConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LearningConfig {
    #[serde(default = "default_growth")]
    pub growth: f64,
    #[serde(default = "default_decay")]
    pub decay: f64,
    #[serde(default = "default_high_threshold")]
    pub high_threshold: f64,
    #[serde(default = "default_low_threshold")]
    pub low_threshold: f64,
    /// Success-rate window, in cycles.
    #[serde(default = "default_window")]
    pub window: usize,
    #[serde(default = "default_weight_min")]
    pub weight_min: f64,
    #[serde(default = "default_weight_max")]
    pub weight_max: f64,
    /// A repo metric deviating from the org median by more than this fraction
    /// of the median is flagged as an anomaly.
    #[serde(default = "default_anomaly_deviation")]
    pub anomaly_deviation: f64,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Per-cycle-of-age multiplier when ranking insights across history.
    #[serde(default = "default_recency_decay")]
    pub recency_decay: f64,
}

fn default_growth() -> f64 {
    1.1
}

fn default_decay() -> f64 {
    0.8
}

fn default_high_threshold() -> f64 {
    0.8
}

fn default_low_threshold() -> f64 {
    0.4
}

fn default_window() -> usize {
    5
}

fn default_weight_min() -> f64 {
    0.1
}

fn default_weight_max() -> f64 {
    3.0
}

fn default_anomaly_deviation() -> f64 {
    0.5
}

fn default_top_k() -> usize {
    10
}

fn default_recency_decay() -> f64 {
    0.9
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            growth: default_growth(),
            decay: default_decay(),
            high_threshold: default_high_threshold(),
            low_threshold: default_low_threshold(),
            window: default_window(),
            weight_min: default_weight_min(),
            weight_max: default_weight_max(),
            anomaly_deviation: default_anomaly_deviation(),
            top_k: default_top_k(),
            recency_decay: default_recency_decay(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: u32,
    pub org: OrgConfig,
    #[serde(default)]
    pub forge: ForgeConfig,
    #[serde(default)]
    pub thresholds: ThresholdProfile,
    #[serde(default)]
    pub budget: BudgetConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub execution: ExecutionConfig,
    #[serde(default)]
    pub learning: LearningConfig,
    /// How many cycle snapshots to retain on disk.
    #[serde(default = "default_snapshot_keep")]
    pub snapshot_keep: usize,
}

fn default_version() -> u32 {
    1
}

fn default_snapshot_keep() -> usize {
    20
}

impl Config {
    pub fn new(org_name: impl Into<String>) -> Self {
        Self {
            version: 1,
            org: OrgConfig {
                name: org_name.into(),
                description: None,
            },
            forge: ForgeConfig::default(),
            thresholds: ThresholdProfile::default(),
            budget: BudgetConfig::default(),
            selection: SelectionConfig::default(),
            execution: ExecutionConfig::default(),
            learning: LearningConfig::default(),
            snapshot_keep: default_snapshot_keep(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let path = paths::config_path(root);
        if !path.exists() {
            return Err(StewardError::NotInitialized);
        }
        let data = std::fs::read_to_string(&path)?;
        let cfg: Config = serde_yaml::from_str(&data)?;
        Ok(cfg)
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let path = paths::config_path(root);
        let data = serde_yaml::to_string(self)?;
        crate::io::atomic_write(&path, data.as_bytes())
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Hard validation run at the start of every cycle. Violations abort the
    /// cycle with a fatal configuration error before anything executes.
    pub fn ensure_valid(&self) -> Result<()> {
        self.thresholds.validate()?;
        if self.learning.weight_min >= self.learning.weight_max {
            return Err(StewardError::Config(format!(
                "weight bounds inverted: min {} >= max {}",
                self.learning.weight_min, self.learning.weight_max
            )));
        }
        if self.budget.max_cost <= 0.0 {
            return Err(StewardError::Config(format!(
                "budget.max_cost must be positive, got {}",
                self.budget.max_cost
            )));
        }
        if self.learning.window == 0 {
            return Err(StewardError::Config(
                "learning.window must be at least 1 cycle".to_string(),
            ));
        }
        Ok(())
    }

    /// Soft validation: suspicious-but-legal values surfaced as warnings.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.learning.growth <= 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "learning.growth is {} — weights will never grow",
                    self.learning.growth
                ),
            });
        }
        if self.learning.decay >= 1.0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: format!(
                    "learning.decay is {} — weights will never shrink",
                    self.learning.decay
                ),
            });
        }
        if self.learning.low_threshold >= self.learning.high_threshold {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: format!(
                    "learning thresholds overlap: low {} >= high {}",
                    self.learning.low_threshold, self.learning.high_threshold
                ),
            });
        }
        if self.budget.max_actions == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Warning,
                message: "budget.max_actions is 0 — every plan will be empty".to_string(),
            });
        }
        if self.execution.breaker_threshold == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "execution.breaker_threshold is 0 — every action would be skipped"
                    .to_string(),
            });
        }
        if self.forge.fetch_concurrency == 0 {
            warnings.push(ConfigWarning {
                level: WarnLevel::Error,
                message: "forge.fetch_concurrency is 0 — snapshots would never complete"
                    .to_string(),
            });
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let cfg = Config::new("acme");
        cfg.ensure_valid().unwrap();
        assert!(cfg.validate().is_empty());
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cfg = Config::new("acme");
        cfg.save(dir.path()).unwrap();
        let loaded = Config::load(dir.path()).unwrap();
        assert_eq!(loaded.org.name, "acme");
        assert_eq!(loaded.budget.max_actions, 10);
        assert_eq!(loaded.learning.window, 5);
    }

    #[test]
    fn load_missing_is_not_initialized() {
        let dir = TempDir::new().unwrap();
        let err = Config::load(dir.path()).unwrap_err();
        assert!(matches!(err, StewardError::NotInitialized));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(".steward")).unwrap();
        std::fs::write(
            dir.path().join(".steward/config.yaml"),
            "org:\n  name: acme\n",
        )
        .unwrap();
        let cfg = Config::load(dir.path()).unwrap();
        assert_eq!(cfg.forge.api_url, "https://api.github.com");
        assert_eq!(cfg.execution.max_retries, 2);
        assert_eq!(cfg.learning.weight_max, 3.0);
    }

    #[test]
    fn inverted_weight_bounds_fail_hard() {
        let mut cfg = Config::new("acme");
        cfg.learning.weight_min = 5.0;
        let err = cfg.ensure_valid().unwrap_err();
        assert!(matches!(err, StewardError::Config(_)));
    }

    #[test]
    fn zero_budget_fails_hard() {
        let mut cfg = Config::new("acme");
        cfg.budget.max_cost = 0.0;
        assert!(cfg.ensure_valid().is_err());
    }

    #[test]
    fn suspicious_values_warn() {
        let mut cfg = Config::new("acme");
        cfg.learning.growth = 0.9;
        cfg.budget.max_actions = 0;
        let warnings = cfg.validate();
        assert_eq!(warnings.len(), 2);
        assert!(warnings.iter().all(|w| w.level == WarnLevel::Warning));
    }

    #[test]
    fn overlapping_learning_thresholds_are_error_level() {
        let mut cfg = Config::new("acme");
        cfg.learning.low_threshold = 0.9;
        let warnings = cfg.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("overlap")));
    }
}
