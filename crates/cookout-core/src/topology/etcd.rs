//! Topology read from the etcd v2 keys API.
//!
//! Layout under [`PROJECTS_KEY`]:
//!
//! ```text
//! /projects/<project>/environments/<environment>/hosts/<host uri>
//! ```
//!
//! Other keys stored alongside (branch, repo path, ...) are ignored.

use serde::Deserialize;
use tracing::debug;
use url::Url;

use super::{Environment, Host, Project, TopologySnapshot, TopologySource};
use crate::error::{DeployError, Result};
use crate::http;

/// Namespace holding all project definitions.
pub const PROJECTS_KEY: &str = "/projects";

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

#[derive(Debug, Deserialize)]
struct Node {
    key: String,
    #[serde(default)]
    nodes: Vec<Node>,
}

impl Node {
    /// Last path segment of the key.
    fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name() == name)
    }
}

/// Parse a recursive `GET /v2/keys/projects` body into a snapshot.
pub fn parse_keys_response(body: &str) -> Result<TopologySnapshot> {
    let response: KeysResponse = serde_json::from_str(body)
        .map_err(|e| DeployError::Coordination(format!("failed to parse topology: {}", e)))?;

    let projects = response
        .node
        .nodes
        .iter()
        .map(|project| Project {
            name: project.name().to_string(),
            environments: project
                .child("environments")
                .map(|envs| envs.nodes.iter().map(environment).collect())
                .unwrap_or_default(),
        })
        .collect();

    Ok(TopologySnapshot::new(projects))
}

fn environment(node: &Node) -> Environment {
    Environment {
        name: node.name().to_string(),
        hosts: node
            .child("hosts")
            .map(|hosts| hosts.nodes.iter().map(|h| Host::new(h.name())).collect())
            .unwrap_or_default(),
    }
}

/// Reads the topology from an etcd server.
#[derive(Debug, Clone)]
pub struct EtcdTopologySource {
    endpoint: Url,
}

impl EtcdTopologySource {
    pub fn new(endpoint: Url) -> Self {
        Self { endpoint }
    }

    pub fn keys_url(&self) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|_| {
                DeployError::Coordination(format!("{} cannot be a base URL", self.endpoint))
            })?
            .pop_if_empty()
            .extend(["v2", "keys"])
            .extend(PROJECTS_KEY.split('/').filter(|s| !s.is_empty()));
        url.query_pairs_mut()
            .clear()
            .append_pair("recursive", "true")
            .append_pair("sorted", "true");
        Ok(url)
    }

    async fn fetch(&self) -> Result<TopologySnapshot> {
        let url = self.keys_url()?;
        debug!(url = %url, "querying coordination store");

        let client = http::client().map_err(|e| {
            DeployError::Coordination(format!("failed to build HTTP client: {}", e))
        })?;

        let response = client.get(url.clone()).send().await.map_err(|e| {
            DeployError::Coordination(format!("failed to query {}: {}", url, e))
        })?;

        if !response.status().is_success() {
            return Err(DeployError::Coordination(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let body = response.text().await.map_err(|e| {
            DeployError::Coordination(format!("failed to read response from {}: {}", url, e))
        })?;

        parse_keys_response(&body)
    }
}

impl TopologySource for EtcdTopologySource {
    fn snapshot(&self) -> Result<TopologySnapshot> {
        http::block_on(self.fetch()).map_err(|e| {
            DeployError::Coordination(format!("failed to start async runtime: {}", e))
        })?
    }
}
