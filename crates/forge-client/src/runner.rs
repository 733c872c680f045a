//! Production implementations of the engine's sync seams.
//!
//! `PlatformRunner` is both the [`SnapshotSource`] and the [`ActionRunner`]
//! for a live forge. The engine core is synchronous; the forge API is async.
//! The bridge picks its strategy at construction: with no ambient tokio
//! runtime (the CLI's main thread) it owns one, inside a runtime context
//! (the server's blocking pool) it blocks on the ambient handle. Callers
//! must not invoke it from an executor worker thread.

use std::collections::BTreeMap;
use std::future::Future;

use steward_core::candidates::ActionCandidate;
use steward_core::coordinator::{ActionRunner, RunEffect, RunFailure};
use steward_core::cycle::SnapshotSource;
use steward_core::snapshot::OrgSnapshot;
use steward_core::types::{ActionKind, Target};
use tracing::debug;

use crate::client::ForgeClient;
use crate::error::ForgeError;
use crate::types::RepoSummary;

/// Title used for the idempotent health-check issue. An open issue with
/// this title means the check is filed; re-running never duplicates it.
const HEALTH_ISSUE_TITLE: &str = "Fleet health check";

enum Bridge {
    Owned(tokio::runtime::Runtime),
    Ambient(tokio::runtime::Handle),
}

/// Executes planned actions against the forge and captures snapshots.
pub struct PlatformRunner {
    client: ForgeClient,
    org: String,
    bridge: Bridge,
}

impl PlatformRunner {
    pub fn new(client: ForgeClient, org: impl Into<String>) -> std::io::Result<Self> {
        let bridge = match tokio::runtime::Handle::try_current() {
            Ok(handle) => Bridge::Ambient(handle),
            Err(_) => Bridge::Owned(tokio::runtime::Runtime::new()?),
        };
        Ok(Self {
            client,
            org: org.into(),
            bridge,
        })
    }

    fn block_on<F: Future>(&self, fut: F) -> F::Output {
        match &self.bridge {
            Bridge::Owned(rt) => rt.block_on(fut),
            Bridge::Ambient(handle) => handle.block_on(fut),
        }
    }

    async fn perform(&self, candidate: &ActionCandidate) -> Result<RunEffect, ForgeError> {
        match (candidate.kind, &candidate.target) {
            (ActionKind::Analyze, Target::OrgWide) => self.analyze_org().await,
            (ActionKind::Analyze, Target::Repo { name }) => self.analyze_repo(name).await,
            (ActionKind::Sync, Target::OrgWide) => self.sync_org().await,
            (ActionKind::Sync, Target::Repo { name }) => self.sync_repo(name).await,
            (ActionKind::HealthCheck, Target::OrgWide) => self.health_check_org().await,
            (ActionKind::HealthCheck, Target::Repo { name }) => self.health_check_repo(name).await,
            (ActionKind::SecurityScan, Target::OrgWide) => self.security_scan_org().await,
            (ActionKind::SecurityScan, Target::Repo { name }) => {
                self.security_scan_repo(name).await
            }
        }
    }

    // -----------------------------------------------------------------------
    // Per-kind handlers. All are idempotent: reads summarize current state,
    // and the single write (the health-check issue) checks for an existing
    // one first.
    // -----------------------------------------------------------------------

    async fn analyze_org(&self) -> Result<RunEffect, ForgeError> {
        let repos = self.client.list_repos(&self.org).await?;
        let now = chrono::Utc::now();
        let total = repos.len();
        let active = repos.iter().filter(|r| r.push_age_days(now) <= 30).count();
        let outdated = repos.iter().filter(|r| r.push_age_days(now) > 90).count();
        let archived = repos.iter().filter(|r| r.archived).count();
        Ok(RunEffect::new(format!(
            "analyzed {total} repositories: {active} active in the last 30 days, \
             {outdated} outdated, {archived} archived"
        )))
    }

    async fn analyze_repo(&self, name: &str) -> Result<RunEffect, ForgeError> {
        let repo = self.client.repo(&self.org, name).await?;
        let age = repo.push_age_days(chrono::Utc::now());
        Ok(RunEffect::new(format!(
            "analyzed {name}: last push {age} days ago, {} open issues",
            repo.open_issues_count
        )))
    }

    async fn sync_org(&self) -> Result<RunEffect, ForgeError> {
        let repos = self.client.list_repos(&self.org).await?;
        let langs = top_languages(&repos, 3);
        let summary = if langs.is_empty() {
            format!("synced org profile: {} repositories", repos.len())
        } else {
            format!(
                "synced org profile: {} repositories, top languages: {}",
                repos.len(),
                langs.join(", ")
            )
        };
        Ok(RunEffect::new(summary))
    }

    async fn sync_repo(&self, name: &str) -> Result<RunEffect, ForgeError> {
        let repo = self.client.repo(&self.org, name).await?;
        let language = repo.language.as_deref().unwrap_or("none");
        let description = match repo.description.as_deref() {
            Some(d) if d.len() >= 10 => "present",
            Some(_) => "thin",
            None => "missing",
        };
        Ok(RunEffect::new(format!(
            "synced metadata for {name}: language {language}, description {description}"
        )))
    }

    async fn health_check_org(&self) -> Result<RunEffect, ForgeError> {
        let repos = self.client.list_repos(&self.org).await?;
        let now = chrono::Utc::now();
        let total = repos.iter().filter(|r| !r.archived).count();
        let active = repos
            .iter()
            .filter(|r| !r.archived && r.push_age_days(now) <= 30)
            .count();
        Ok(RunEffect::new(format!(
            "fleet activity: {active} of {total} repositories pushed within 30 days"
        )))
    }

    async fn health_check_repo(&self, name: &str) -> Result<RunEffect, ForgeError> {
        let existing = self
            .client
            .open_issues_titled(&self.org, name, HEALTH_ISSUE_TITLE)
            .await?;
        if let Some(issue) = existing.first() {
            return Ok(RunEffect::new(format!(
                "health-check issue #{} already open for {name}",
                issue.number
            )));
        }
        let body = "Automated fleet health check: this repository has not been pushed \
                    in over 90 days. Please confirm it is still maintained, or archive it.";
        let number = self
            .client
            .create_issue(&self.org, name, HEALTH_ISSUE_TITLE, body)
            .await?;
        Ok(RunEffect::new(format!(
            "opened health-check issue #{number} for {name}"
        )))
    }

    async fn security_scan_org(&self) -> Result<RunEffect, ForgeError> {
        let repos = self.client.list_repos(&self.org).await?;
        let mut open_alerts = 0usize;
        let mut flagged_repos = 0usize;
        for repo in repos.iter().filter(|r| !r.fork) {
            let alerts = self
                .client
                .open_vulnerability_names(&self.org, &repo.name)
                .await?;
            if !alerts.is_empty() {
                flagged_repos += 1;
                open_alerts += alerts.len();
            }
        }
        Ok(RunEffect::new(format!(
            "org security scan: {open_alerts} open advisories across {flagged_repos} repositories"
        )))
    }

    async fn security_scan_repo(&self, name: &str) -> Result<RunEffect, ForgeError> {
        let alerts = self
            .client
            .open_vulnerability_names(&self.org, name)
            .await?;
        if alerts.is_empty() {
            return Ok(RunEffect::new(format!(
                "security scan of {name}: no open advisories"
            )));
        }
        let shown = alerts[..alerts.len().min(3)].join(", ");
        let suffix = if alerts.len() > 3 { ", …" } else { "" };
        Ok(RunEffect::new(format!(
            "security scan of {name}: {} open advisories ({shown}{suffix})",
            alerts.len()
        )))
    }
}

impl SnapshotSource for PlatformRunner {
    fn capture(&self, org: &str) -> steward_core::Result<OrgSnapshot> {
        Ok(self.block_on(self.client.snapshot(org))?)
    }
}

impl ActionRunner for PlatformRunner {
    fn run(&self, candidate: &ActionCandidate) -> Result<RunEffect, RunFailure> {
        debug!(kind = %candidate.kind, target = %candidate.target, "dispatching platform action");
        self.block_on(self.perform(candidate)).map_err(|err| {
            if err.is_transient() {
                RunFailure::transient(err.to_string())
            } else {
                RunFailure::fatal(err.to_string())
            }
        })
    }
}

/// Most common primary languages across the fleet, most frequent first.
fn top_languages(repos: &[RepoSummary], limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for lang in repos.iter().filter_map(|r| r.language.as_deref()) {
        *counts.entry(lang).or_default() += 1;
    }
    let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(limit)
        .map(|(lang, _)| lang.to_string())
        .collect()
}
