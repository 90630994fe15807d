//! Error taxonomy for deployment runs.
//!
//! Every failure in the core is fatal to the run. Components return
//! [`DeployError`] and propagate it unchanged; only the binary decides how the
//! process terminates.

use std::path::PathBuf;

/// A fatal deployment failure, tagged by the step that produced it.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Settings file unreadable, unparsable, or missing a required key.
    #[error("configuration error in {path}: {message}")]
    Config { path: PathBuf, message: String },

    /// The requested project/environment pair is not in the topology.
    #[error("project '{project}' environment '{environment}' not found: {reason}")]
    Resolution {
        project: String,
        environment: String,
        reason: String,
    },

    /// The coordination store could not be queried or its answer parsed.
    #[error("coordination store error: {0}")]
    Coordination(String),

    /// The upstream repository's latest revision could not be determined.
    #[error("failed to get remote revision: {0}")]
    RemoteReference(String),

    /// Pulling the provisioning checkout failed.
    #[error("failed to sync provisioning repository: {0}")]
    Sync(String),

    /// A child command could not be spawned, read, or exited non-zero.
    #[error("command `{command}` failed: {reason}")]
    Execution { command: String, reason: String },
}

impl DeployError {
    pub(crate) fn config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn execution(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Execution {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Short name of the failing step, used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Resolution { .. } => "resolution",
            Self::Coordination(_) => "coordination",
            Self::RemoteReference(_) => "remote-reference",
            Self::Sync(_) => "sync",
            Self::Execution { .. } => "execution",
        }
    }
}

pub type Result<T, E = DeployError> = std::result::Result<T, E>;
