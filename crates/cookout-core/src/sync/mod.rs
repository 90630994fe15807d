//! Keeps the provisioning checkout at the upstream head.
//!
//! The check runs once per deploy: the local `HEAD` is compared with the
//! newest upstream commit and a single `git pull` is issued when they differ.
//! The pull's exit status is the only success signal.

mod github;

use std::fmt;

use tracing::info;

use crate::error::{DeployError, Result};
use crate::runner::{CommandRunner, ExecContext, Invocation};
use crate::settings::Settings;

pub use github::{GITHUB_TOKEN_ENV, GitHubRevisionSource};

/// Environment variable git consults for its ssh command.
pub const GIT_SSH_ENV: &str = "GIT_SSH";

/// A commit hash. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source of the newest upstream revision.
pub trait RevisionSource {
    fn latest_revision(&self) -> Result<Revision>;
}

/// Result of a completed sync check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    UpToDate(Revision),
    Pulled { from: Revision, to: Revision },
}

/// Compares the checkout with upstream and pulls when stale.
pub struct RepoSync<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    remote: &'a dyn RevisionSource,
}

impl<'a> RepoSync<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        remote: &'a dyn RevisionSource,
    ) -> Self {
        Self {
            settings,
            runner,
            remote,
        }
    }

    /// Run the check and, if needed, the pull.
    pub fn sync(&self, ctx: &ExecContext) -> Result<SyncOutcome> {
        let local = self.local_revision(ctx)?;
        let remote = self.remote.latest_revision()?;

        if local == remote {
            info!(revision = %local, "local provisioning repo is up to date, skipping sync");
            return Ok(SyncOutcome::UpToDate(local));
        }

        info!(local = %local, remote = %remote, "provisioning repo is stale, pulling");
        let pull_ctx = ctx.with_env(
            GIT_SSH_ENV,
            self.settings.git_ssh_wrapper.to_string_lossy(),
        );
        self.runner
            .run(&self.pull_invocation(), &pull_ctx)
            .map_err(|e| DeployError::Sync(e.to_string()))?;

        info!(revision = %remote, "provisioning repo updated");
        Ok(SyncOutcome::Pulled {
            from: local,
            to: remote,
        })
    }

    /// `HEAD` of the local checkout.
    pub fn local_revision(&self, ctx: &ExecContext) -> Result<Revision> {
        let output = self.runner.run(&self.rev_parse_invocation(), ctx)?;
        Ok(Revision::new(output.trim()))
    }

    pub fn rev_parse_invocation(&self) -> Invocation {
        Invocation::new("git")
            .arg(self.git_dir_arg())
            .args(["rev-parse", "HEAD"])
    }

    pub fn pull_invocation(&self) -> Invocation {
        Invocation::new("git")
            .arg(self.git_dir_arg())
            .arg(format!("--work-tree={}", self.settings.chef_repo.display()))
            .args(["pull", "origin", self.settings.upstream.branch.as_str()])
    }

    fn git_dir_arg(&self) -> String {
        format!(
            "--git-dir={}",
            self.settings.chef_repo.join(".git").display()
        )
    }
}
