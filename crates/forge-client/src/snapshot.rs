//! Snapshot collection: one org listing, then bounded-concurrency per-repo
//! signal fetches reduced to an [`OrgSnapshot`].

use std::sync::Arc;

use chrono::Utc;
use steward_core::snapshot::{OrgSnapshot, RepoSignals};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::client::ForgeClient;
use crate::error::ForgeError;
use crate::types::RepoSummary;

impl ForgeClient {
    /// Collect a point-in-time snapshot of every repository in the org.
    ///
    /// Forks are excluded: their health belongs to the upstream, not this
    /// fleet. Per-repo fetches run concurrently under the client's
    /// `fetch_concurrency` bound. Any single fetch failure fails the whole
    /// snapshot — a partial fleet view would skew the org-level means and
    /// medians the learner compares across cycles.
    pub async fn snapshot(&self, org: &str) -> Result<OrgSnapshot, ForgeError> {
        let repos = self.list_repos(org).await?;
        let own: Vec<RepoSummary> = repos.into_iter().filter(|r| !r.fork).collect();
        debug!(org = %org, repos = own.len(), "collecting repo signals");

        let semaphore = Arc::new(Semaphore::new(self.fetch_concurrency()));
        let mut handles = Vec::with_capacity(own.len());
        for summary in own {
            let sem = semaphore.clone();
            let client = self.clone();
            let org = org.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = sem
                    .acquire()
                    .await
                    .map_err(|_| ForgeError::Task("fetch semaphore closed".to_string()))?;
                let name = summary.name.clone();
                let signals = fetch_signals(&client, &org, summary).await?;
                Ok::<_, ForgeError>((name, signals))
            }));
        }

        let mut collected = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.await {
                Ok(Ok(entry)) => collected.push(entry),
                Ok(Err(err)) => return Err(err),
                Err(err) => {
                    return Err(ForgeError::Task(format!("signal fetch task failed: {err}")))
                }
            }
        }
        Ok(OrgSnapshot::from_signals(org, collected))
    }
}

/// Fetch the raw signals for one repository. The listing entry already
/// carries push age, description, language, and archive state; README
/// presence, contributors, and open alerts need their own calls.
async fn fetch_signals(
    client: &ForgeClient,
    org: &str,
    summary: RepoSummary,
) -> Result<RepoSignals, ForgeError> {
    let has_readme = client.has_readme(org, &summary.name).await?;
    let contributor_count = client.contributor_count(org, &summary.name).await?;
    let open_vulnerabilities = client.open_vulnerability_names(org, &summary.name).await?;
    debug!(
        repo = %summary.name,
        readme = has_readme,
        contributors = contributor_count,
        alerts = open_vulnerabilities.len(),
        "signals collected"
    );
    Ok(RepoSignals {
        last_push_age_days: summary.push_age_days(Utc::now()),
        has_readme,
        description_len: summary.description.as_deref().map_or(0, str::len),
        open_vulnerabilities,
        primary_language: summary.language,
        contributor_count,
        archived: summary.archived,
    })
}
