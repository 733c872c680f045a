//! HTTP client for the forge REST API.
//!
//! Thin wrapper over [`reqwest`]: one method per endpoint steward touches,
//! with status classification centralized in `ensure_success`. The client is
//! `Clone` (the inner `reqwest::Client` is reference-counted) so snapshot
//! collection can fan out across tasks.

use std::time::Duration;

use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use steward_core::config::ForgeConfig;
use tracing::debug;

use crate::error::ForgeError;
use crate::types::{ContributorEntry, IssueSummary, RepoSummary, VulnerabilityAlert};

const USER_AGENT: &str = concat!("steward/", env!("CARGO_PKG_VERSION"));
const PER_PAGE: usize = 100;

/// Async client for one forge instance.
#[derive(Clone)]
pub struct ForgeClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    fetch_concurrency: usize,
}

impl ForgeClient {
    /// Build a client from explicit parts. Test code points `base_url` at a
    /// mock server; production goes through [`ForgeClient::from_config`].
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        fetch_concurrency: usize,
        request_timeout: Duration,
    ) -> Result<Self, ForgeError> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.is_empty()),
            fetch_concurrency: fetch_concurrency.max(1),
        })
    }

    /// Build a client from the `forge:` config section. The token is read
    /// from the environment variable the config names; an unset variable
    /// means unauthenticated requests (public data, tight rate limits).
    pub fn from_config(forge: &ForgeConfig) -> Result<Self, ForgeError> {
        let token = std::env::var(&forge.token_env).ok();
        if token.is_none() {
            debug!(var = %forge.token_env, "forge token env var not set; requests are unauthenticated");
        }
        Self::new(
            &forge.api_url,
            token,
            forge.fetch_concurrency,
            Duration::from_secs(forge.request_timeout_secs),
        )
    }

    /// Bound on concurrent per-repo fetches during snapshot collection.
    pub fn fetch_concurrency(&self) -> usize {
        self.fetch_concurrency
    }

    // -----------------------------------------------------------------------
    // Endpoints
    // -----------------------------------------------------------------------

    /// All repositories of an organization, following pagination.
    pub async fn list_repos(&self, org: &str) -> Result<Vec<RepoSummary>, ForgeError> {
        let mut repos = Vec::new();
        let mut page = 1u32;
        loop {
            let batch: Vec<RepoSummary> = self
                .get_json(&format!(
                    "/orgs/{org}/repos?type=all&per_page={PER_PAGE}&page={page}"
                ))
                .await?;
            let last_page = batch.len() < PER_PAGE;
            repos.extend(batch);
            if last_page {
                break;
            }
            page += 1;
        }
        Ok(repos)
    }

    /// Metadata for a single repository.
    pub async fn repo(&self, org: &str, repo: &str) -> Result<RepoSummary, ForgeError> {
        self.get_json(&format!("/repos/{org}/{repo}")).await
    }

    /// Number of distinct contributors, capped at one page.
    pub async fn contributor_count(&self, org: &str, repo: &str) -> Result<u32, ForgeError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{org}/{repo}/contributors?per_page={PER_PAGE}&anon=false"),
            )
            .send()
            .await?;
        // Empty repositories answer 204 with no body.
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(0);
        }
        let response = Self::ensure_success(response).await?;
        let entries: Vec<ContributorEntry> = response.json().await?;
        Ok(entries.len() as u32)
    }

    /// Advisory ids of the repository's open vulnerability alerts.
    ///
    /// Repos with alert scanning disabled (or hidden from this token) answer
    /// 403/404; that reads as "no open alerts", not an error.
    pub async fn open_vulnerability_names(
        &self,
        org: &str,
        repo: &str,
    ) -> Result<Vec<String>, ForgeError> {
        let response = self
            .request(
                Method::GET,
                &format!("/repos/{org}/{repo}/dependabot/alerts?state=open&per_page={PER_PAGE}"),
            )
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(Vec::new());
        }
        let response = Self::ensure_success(response).await?;
        let alerts: Vec<VulnerabilityAlert> = response.json().await?;
        Ok(alerts
            .into_iter()
            .map(|a| a.security_advisory.ghsa_id)
            .collect())
    }

    /// Whether the repository serves a README.
    pub async fn has_readme(&self, org: &str, repo: &str) -> Result<bool, ForgeError> {
        let response = self
            .request(Method::GET, &format!("/repos/{org}/{repo}/readme"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        Self::ensure_success(response).await?;
        Ok(true)
    }

    /// Open issues whose titles start with the given prefix.
    pub async fn open_issues_titled(
        &self,
        org: &str,
        repo: &str,
        title_prefix: &str,
    ) -> Result<Vec<IssueSummary>, ForgeError> {
        let issues: Vec<IssueSummary> = self
            .get_json(&format!(
                "/repos/{org}/{repo}/issues?state=open&per_page={PER_PAGE}"
            ))
            .await?;
        Ok(issues
            .into_iter()
            .filter(|i| i.title.starts_with(title_prefix))
            .collect())
    }

    /// File a new issue; returns its number.
    pub async fn create_issue(
        &self,
        org: &str,
        repo: &str,
        title: &str,
        body: &str,
    ) -> Result<u64, ForgeError> {
        let payload = serde_json::json!({ "title": title, "body": body });
        let issue: IssueSummary = self
            .post_json(&format!("/repos/{org}/{repo}/issues"), &payload)
            .await?;
        Ok(issue.number)
    }

    // -----------------------------------------------------------------------
    // Plumbing
    // -----------------------------------------------------------------------

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ForgeError> {
        let response = self.request(Method::GET, path).send().await?;
        Self::parse_response(response).await
    }

    async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ForgeError> {
        let response = self.request(Method::POST, path).json(body).send().await?;
        Self::parse_response(response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ForgeError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Classify a non-2xx status into the error taxonomy the retry policy
    /// understands: 401/403 fatal auth, 429/5xx transient, the rest hard
    /// API errors.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ForgeError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        let status = status.as_u16();
        Err(match status {
            401 | 403 => ForgeError::Auth { status, message },
            429 | 500..=599 => ForgeError::Throttled { status, message },
            _ => ForgeError::Api { status, message },
        })
    }
}
