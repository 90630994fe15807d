//! Deployment settings loaded once at startup.
//!
//! The settings file is a flat key/value document (YAML by default, TOML when
//! the file ends in `.toml`). Required keys must be present and non-empty;
//! optional keys fall back to the defaults below.

mod parser;

use std::path::{Path, PathBuf};

use serde::Deserialize;
use url::Url;

use crate::error::{DeployError, Result};

pub use parser::{SettingsFormat, load_settings, parse_settings_str};

/// Settings path used when `-g` is not given.
pub const DEFAULT_SETTINGS_PATH: &str = "/tmp/deploy.yaml";
pub const DEFAULT_ETCD_SERVER: &str = "http://127.0.0.1:4001";
pub const DEFAULT_UPSTREAM_REPO: &str = "Gengo/devops-tools";
pub const DEFAULT_UPSTREAM_BRANCH: &str = "master";
pub const DEFAULT_GIT_SSH_WRAPPER: &str = "/tmp/private_code/wrap-ssh4git.sh";
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// Validated, immutable deployment settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Provisioning-configuration git checkout.
    pub chef_repo: PathBuf,
    /// Working directory for every command the run executes.
    pub chef_path: PathBuf,
    /// Provisioning tool config file (`knife -c`).
    pub knife_path: PathBuf,
    /// Identity file handed to the provisioning tool (`knife -i`).
    pub pem_key: PathBuf,
    pub deploy_user: String,
    pub etcd_server: Url,
    pub upstream: UpstreamRepo,
    /// Value exported as `GIT_SSH` for the pull.
    pub git_ssh_wrapper: PathBuf,
    pub github_api_url: Url,
}

/// Upstream repository whose latest commit defines "current".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamRepo {
    pub owner: String,
    pub name: String,
    pub branch: String,
}

impl UpstreamRepo {
    /// Parse `owner/name`.
    pub fn parse(slug: &str, branch: &str) -> Option<Self> {
        let (owner, name) = slug.split_once('/')?;
        if owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
            branch: branch.to_string(),
        })
    }
}

/// Settings as written in the file, before validation.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawSettings {
    chef_repo: Option<String>,
    chef_path: Option<String>,
    knife_path: Option<String>,
    pem_key: Option<String>,
    deploy_user: Option<String>,
    etcd_server: Option<String>,
    upstream_repo: Option<String>,
    upstream_branch: Option<String>,
    git_ssh_wrapper: Option<String>,
    github_api_url: Option<String>,
}

impl RawSettings {
    /// Validate into [`Settings`], reporting the first missing required key.
    pub(crate) fn validate(self, path: &Path) -> Result<Settings> {
        let chef_repo = required(self.chef_repo, "chef_repo", path)?;
        let chef_path = required(self.chef_path, "chef_path", path)?;
        let knife_path = required(self.knife_path, "knife_path", path)?;
        let pem_key = required(self.pem_key, "pem_key", path)?;
        let deploy_user = required(self.deploy_user, "deploy_user", path)?;

        let etcd_server = parse_url(
            optional(self.etcd_server).as_deref(),
            DEFAULT_ETCD_SERVER,
            "etcd_server",
            path,
        )?;
        let github_api_url = parse_url(
            optional(self.github_api_url).as_deref(),
            DEFAULT_GITHUB_API_URL,
            "github_api_url",
            path,
        )?;

        let slug = optional(self.upstream_repo).unwrap_or_else(|| DEFAULT_UPSTREAM_REPO.into());
        let branch =
            optional(self.upstream_branch).unwrap_or_else(|| DEFAULT_UPSTREAM_BRANCH.into());
        let upstream = UpstreamRepo::parse(&slug, &branch).ok_or_else(|| {
            DeployError::config(
                path,
                format!("upstream_repo must be 'owner/name', got '{}'", slug),
            )
        })?;

        let git_ssh_wrapper =
            optional(self.git_ssh_wrapper).unwrap_or_else(|| DEFAULT_GIT_SSH_WRAPPER.into());

        Ok(Settings {
            chef_repo: chef_repo.into(),
            chef_path: chef_path.into(),
            knife_path: knife_path.into(),
            pem_key: pem_key.into(),
            deploy_user,
            etcd_server,
            upstream,
            git_ssh_wrapper: git_ssh_wrapper.into(),
            github_api_url,
        })
    }
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(value: Option<String>, key: &str, path: &Path) -> Result<String> {
    optional(value).ok_or_else(|| DeployError::config(path, format!("missing {}", key)))
}

fn parse_url(value: Option<&str>, default: &str, key: &str, path: &Path) -> Result<Url> {
    let raw = value.unwrap_or(default);
    Url::parse(raw)
        .map_err(|e| DeployError::config(path, format!("invalid {} '{}': {}", key, raw, e)))
}
