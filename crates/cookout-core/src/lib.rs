//! Cookout Core Library
//!
//! Deploys a project environment by syncing the chef repository against
//! upstream and running `knife solo` on every host listed in etcd, one host at
//! a time, stopping at the first failure.

pub mod error;
mod http;
pub mod orchestrator;
pub mod runner;
pub mod settings;
pub mod sync;
pub mod topology;

pub use error::{DeployError, Result};

/// Re-exports of commonly used types
pub mod prelude {
    pub use crate::error::{DeployError, Result};

    // Settings
    pub use crate::settings::{Settings, UpstreamRepo, load_settings};

    // Execution
    pub use crate::runner::{CommandRunner, ExecContext, Invocation, SystemRunner};

    // Sync
    pub use crate::sync::{GitHubRevisionSource, RepoSync, Revision, RevisionSource, SyncOutcome};

    // Topology
    pub use crate::topology::{EtcdTopologySource, Host, TopologySnapshot, TopologySource};

    // Orchestration
    pub use crate::orchestrator::{CookMode, DeployOutcome, DeployRequest, Deployer};
}
