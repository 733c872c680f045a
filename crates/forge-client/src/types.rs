//! Wire types for the forge REST API.
//!
//! Only the fields steward reads are modeled; unknown fields are ignored so
//! API additions never break deserialization. Raw payloads are reduced to
//! [`RepoSignals`](steward_core::snapshot::RepoSignals) in `snapshot.rs` —
//! nothing downstream sees these types.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// One entry from `GET /orgs/{org}/repos`.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoSummary {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    /// Absent on repos that have never received a push.
    #[serde(default)]
    pub pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub fork: bool,
    #[serde(default)]
    pub open_issues_count: u32,
}

impl RepoSummary {
    /// Days since the last push, measured from `now`. A repo with no push
    /// history counts as a decade old so activity scores to zero.
    pub fn push_age_days(&self, now: DateTime<Utc>) -> u32 {
        match self.pushed_at {
            Some(pushed) => (now - pushed).num_days().max(0) as u32,
            None => 3650,
        }
    }
}

/// One entry from `GET /repos/{org}/{repo}/contributors`.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributorEntry {
    pub login: String,
    #[serde(default)]
    pub contributions: u64,
}

/// One entry from `GET /repos/{org}/{repo}/issues` (also the shape returned
/// when an issue is created).
#[derive(Debug, Clone, Deserialize)]
pub struct IssueSummary {
    pub number: u64,
    pub title: String,
    #[serde(default)]
    pub state: Option<String>,
}

/// One entry from `GET /repos/{org}/{repo}/dependabot/alerts?state=open`.
#[derive(Debug, Clone, Deserialize)]
pub struct VulnerabilityAlert {
    #[serde(default)]
    pub state: Option<String>,
    pub security_advisory: SecurityAdvisory,
}

/// Advisory metadata nested inside a vulnerability alert.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityAdvisory {
    /// Stable advisory identifier, e.g. `GHSA-xxxx-xxxx-xxxx`.
    pub ghsa_id: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}
