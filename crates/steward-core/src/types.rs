use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Tier
// ---------------------------------------------------------------------------

/// Health tier for a classified metric.
///
/// Declared worst-first so the derived `Ord` makes `min` the worst tier —
/// aggregate org health is `min` across metrics (worst-metric-wins).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Critical,
    Warning,
    Good,
    Excellent,
}

impl Tier {
    pub fn all() -> &'static [Tier] {
        &[Tier::Critical, Tier::Warning, Tier::Good, Tier::Excellent]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Critical => "critical",
            Tier::Warning => "warning",
            Tier::Good => "good",
            Tier::Excellent => "excellent",
        }
    }

    /// Distance from Excellent: 0 for Excellent up to 3 for Critical.
    /// Used as the severity component of insight priority.
    pub fn severity_points(self) -> u8 {
        match self {
            Tier::Excellent => 0,
            Tier::Good => 1,
            Tier::Warning => 2,
            Tier::Critical => 3,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionKind
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Analyze,
    Sync,
    HealthCheck,
    SecurityScan,
}

impl ActionKind {
    pub fn all() -> &'static [ActionKind] {
        &[
            ActionKind::Analyze,
            ActionKind::Sync,
            ActionKind::HealthCheck,
            ActionKind::SecurityScan,
        ]
    }

    /// Returns true if the given string is a valid ActionKind name.
    pub fn is_valid(s: &str) -> bool {
        Self::all().iter().any(|k| k.as_str() == s)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActionKind::Analyze => "analyze",
            ActionKind::Sync => "sync",
            ActionKind::HealthCheck => "health_check",
            ActionKind::SecurityScan => "security_scan",
        }
    }

    /// Nominal cost units consumed against the cycle budget.
    pub fn base_cost(self) -> f64 {
        match self {
            ActionKind::Analyze => 5.0,
            ActionKind::Sync => 3.0,
            ActionKind::HealthCheck => 2.0,
            ActionKind::SecurityScan => 8.0,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = crate::error::StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "analyze" => Ok(ActionKind::Analyze),
            "sync" => Ok(ActionKind::Sync),
            "health_check" | "health-check" => Ok(ActionKind::HealthCheck),
            "security_scan" | "security-scan" => Ok(ActionKind::SecurityScan),
            _ => Err(crate::error::StewardError::InvalidRequest(format!(
                "unknown action type: {s}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Metric
// ---------------------------------------------------------------------------

/// The tracked per-repository metrics that thresholds classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Activity,
    DocCompleteness,
    SecurityPosture,
    Engagement,
}

impl Metric {
    pub fn all() -> &'static [Metric] {
        &[
            Metric::Activity,
            Metric::DocCompleteness,
            Metric::SecurityPosture,
            Metric::Engagement,
        ]
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Activity => "activity",
            Metric::DocCompleteness => "doc_completeness",
            Metric::SecurityPosture => "security_posture",
            Metric::Engagement => "engagement",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Target
// ---------------------------------------------------------------------------

/// What an action is aimed at: a single repository or the whole org.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Target {
    OrgWide,
    Repo { name: String },
}

impl Target {
    pub fn repo(name: impl Into<String>) -> Self {
        Target::Repo { name: name.into() }
    }

    /// Stable identifier used for deterministic tie-breaking and display.
    pub fn id(&self) -> &str {
        match self {
            Target::OrgWide => "org-wide",
            Target::Repo { name } => name,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

// ---------------------------------------------------------------------------
// Cycle trigger
// ---------------------------------------------------------------------------

/// Restricts which action kinds a cycle considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFilter {
    All,
    Only(ActionKind),
}

impl ActionFilter {
    pub fn matches(self, kind: ActionKind) -> bool {
        match self {
            ActionFilter::All => true,
            ActionFilter::Only(k) => k == kind,
        }
    }
}

impl fmt::Display for ActionFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionFilter::All => f.write_str("all"),
            ActionFilter::Only(k) => f.write_str(k.as_str()),
        }
    }
}

impl std::str::FromStr for ActionFilter {
    type Err = crate::error::StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(ActionFilter::All);
        }
        s.parse().map(ActionFilter::Only)
    }
}

/// Restricts which targets a cycle considers.
///
/// A repo-scoped trigger excludes org-wide candidates: the operator asked
/// about one repository, not the fleet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetScope {
    All,
    Repo(String),
}

impl TargetScope {
    pub fn matches(&self, target: &Target) -> bool {
        match self {
            TargetScope::All => true,
            TargetScope::Repo(name) => matches!(target, Target::Repo { name: n } if n == name),
        }
    }
}

impl fmt::Display for TargetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetScope::All => f.write_str("all"),
            TargetScope::Repo(name) => f.write_str(name),
        }
    }
}

impl std::str::FromStr for TargetScope {
    type Err = crate::error::StewardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "all" {
            return Ok(TargetScope::All);
        }
        crate::paths::validate_repo_name(s)?;
        Ok(TargetScope::Repo(s.to_string()))
    }
}

/// A validated cycle trigger. Parsing rejects unknown action types and
/// malformed repo names before any snapshot is fetched.
#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub filter: ActionFilter,
    pub scope: TargetScope,
}

impl CycleRequest {
    pub fn parse(action_type: &str, target_scope: &str) -> crate::error::Result<Self> {
        Ok(Self {
            filter: action_type.parse()?,
            scope: target_scope.parse()?,
        })
    }
}

impl Default for CycleRequest {
    fn default() -> Self {
        Self {
            filter: ActionFilter::All,
            scope: TargetScope::All,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
