//! Project / environment / host topology.
//!
//! A [`TopologySnapshot`] is read fresh from the coordination store for every
//! deploy. Resolution is exact-match only; host order is execution order.

mod etcd;

use tracing::debug;

use crate::error::{DeployError, Result};

pub use etcd::{EtcdTopologySource, PROJECTS_KEY, parse_keys_response};

/// A deploy target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Host {
    /// Address used in `user@uri`.
    pub uri: String,
}

impl Host {
    pub fn new(uri: impl Into<String>) -> Self {
        Self { uri: uri.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub name: String,
    pub hosts: Vec<Host>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub environments: Vec<Environment>,
}

/// Every project known to the coordination store, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopologySnapshot {
    pub projects: Vec<Project>,
}

impl TopologySnapshot {
    pub fn new(projects: Vec<Project>) -> Self {
        Self { projects }
    }

    /// Find the environment named `environment` inside `project`.
    pub fn resolve(&self, project: &str, environment: &str) -> Result<&Environment> {
        let not_found = |reason: &str| DeployError::Resolution {
            project: project.to_string(),
            environment: environment.to_string(),
            reason: reason.to_string(),
        };

        let proj = self
            .projects
            .iter()
            .find(|p| p.name == project)
            .ok_or_else(|| not_found("no such project"))?;

        let env = proj
            .environments
            .iter()
            .find(|e| e.name == environment)
            .ok_or_else(|| not_found("no such environment"))?;

        debug!(project, environment, hosts = env.hosts.len(), "resolved environment");
        Ok(env)
    }

    /// Ordered hosts for a (project, environment) pair.
    pub fn hosts(&self, project: &str, environment: &str) -> Result<&[Host]> {
        self.resolve(project, environment).map(|env| env.hosts.as_slice())
    }
}

/// Something that can produce a fresh topology snapshot.
pub trait TopologySource {
    fn snapshot(&self) -> Result<TopologySnapshot>;
}
