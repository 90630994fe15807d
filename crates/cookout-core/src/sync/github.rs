//! Latest-commit lookup against the GitHub REST API.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{Revision, RevisionSource};
use crate::error::{DeployError, Result};
use crate::http;
use crate::settings::{Settings, UpstreamRepo};

/// Environment variable holding the API token.
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_API_TOKEN";

#[derive(Debug, Deserialize)]
struct CommitEntry {
    sha: String,
}

/// Reads the head of the tracked branch from the hosting API.
#[derive(Debug, Clone)]
pub struct GitHubRevisionSource {
    api_url: Url,
    upstream: UpstreamRepo,
    token: Option<String>,
}

impl GitHubRevisionSource {
    pub fn new(api_url: Url, upstream: UpstreamRepo) -> Self {
        Self {
            api_url,
            upstream,
            token: None,
        }
    }

    /// Build from settings, taking the token from `GITHUB_API_TOKEN`.
    pub fn from_settings(settings: &Settings) -> Self {
        let token = std::env::var(GITHUB_TOKEN_ENV).ok();
        Self::new(settings.github_api_url.clone(), settings.upstream.clone()).with_token(token)
    }

    /// Blank tokens are ignored.
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// URL of the one-entry first page of commits on the tracked branch.
    pub fn commits_url(&self) -> Result<Url> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DeployError::RemoteReference(format!("{} cannot be a base URL", self.api_url))
            })?
            .pop_if_empty()
            .extend([
                "repos",
                self.upstream.owner.as_str(),
                self.upstream.name.as_str(),
                "commits",
            ]);
        url.query_pairs_mut()
            .clear()
            .append_pair("sha", &self.upstream.branch)
            .append_pair("per_page", "1");
        Ok(url)
    }

    async fn fetch_latest(&self) -> Result<Revision> {
        let url = self.commits_url()?;
        debug!(url = %url, "querying latest upstream commit");

        let client = http::client().map_err(|e| {
            DeployError::RemoteReference(format!("failed to build HTTP client: {}", e))
        })?;

        let mut request = client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            DeployError::RemoteReference(format!("failed to get commits from {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(DeployError::RemoteReference(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let commits: Vec<CommitEntry> = response.json().await.map_err(|e| {
            DeployError::RemoteReference(format!("failed to parse commit list: {}", e))
        })?;

        let latest = commits.into_iter().next().ok_or_else(|| {
            DeployError::RemoteReference(format!(
                "no commits on {}/{}@{}",
                self.upstream.owner, self.upstream.name, self.upstream.branch
            ))
        })?;

        Ok(Revision::new(latest.sha))
    }
}

impl RevisionSource for GitHubRevisionSource {
    fn latest_revision(&self) -> Result<Revision> {
        http::block_on(self.fetch_latest()).map_err(|e| {
            DeployError::RemoteReference(format!("failed to start async runtime: {}", e))
        })?
    }
}
