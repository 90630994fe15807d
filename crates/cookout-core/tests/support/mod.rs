//! Scripted collaborators for driving deploy runs without processes or network.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::path::PathBuf;

use cookout_core::DeployError;
use cookout_core::runner::{CommandRunner, ExecContext, Invocation};
use cookout_core::settings::{Settings, UpstreamRepo};
use cookout_core::sync::{Revision, RevisionSource};
use cookout_core::topology::{Environment, Host, Project, TopologySnapshot, TopologySource};
use url::Url;

pub fn settings() -> Settings {
    Settings {
        chef_repo: PathBuf::from("/srv/devops-tools"),
        chef_path: PathBuf::from("/srv/devops-tools/chef"),
        knife_path: PathBuf::from("/srv/devops-tools/chef/.chef/knife.rb"),
        pem_key: PathBuf::from("/home/deploy/.ssh/deploy.pem"),
        deploy_user: "deploy".to_string(),
        etcd_server: Url::parse("http://127.0.0.1:4001").unwrap(),
        upstream: UpstreamRepo::parse("acme/devops-tools", "master").unwrap(),
        git_ssh_wrapper: PathBuf::from("/tmp/private_code/wrap-ssh4git.sh"),
        github_api_url: Url::parse("https://api.github.com").unwrap(),
    }
}

type Responder = Box<dyn Fn(&Invocation) -> cookout_core::Result<String>>;

/// Records every call and answers with a closure.
pub struct ScriptedRunner {
    respond: Responder,
    calls: RefCell<Vec<(Invocation, ExecContext)>>,
}

impl ScriptedRunner {
    pub fn new(respond: impl Fn(&Invocation) -> cookout_core::Result<String> + 'static) -> Self {
        Self {
            respond: Box::new(respond),
            calls: RefCell::new(Vec::new()),
        }
    }

    /// Answers `git rev-parse` with `head` and succeeds everything else.
    pub fn with_local_head(head: &str) -> Self {
        let head = head.to_string();
        Self::new(move |inv| {
            if is_rev_parse(inv) {
                Ok(format!("{head}\n"))
            } else {
                Ok(String::new())
            }
        })
    }

    pub fn calls(&self) -> Vec<(Invocation, ExecContext)> {
        self.calls.borrow().clone()
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.borrow().iter().map(|(inv, _)| inv.clone()).collect()
    }

    pub fn knife_targets(&self) -> Vec<String> {
        self.invocations()
            .iter()
            .filter(|inv| inv.program == "knife")
            .filter_map(|inv| inv.args.last().cloned())
            .collect()
    }

    pub fn pulls(&self) -> usize {
        self.invocations().iter().filter(|inv| is_pull(inv)).count()
    }
}

impl CommandRunner for ScriptedRunner {
    fn run(&self, invocation: &Invocation, ctx: &ExecContext) -> cookout_core::Result<String> {
        self.calls
            .borrow_mut()
            .push((invocation.clone(), ctx.clone()));
        (self.respond)(invocation)
    }
}

pub fn is_rev_parse(inv: &Invocation) -> bool {
    inv.program == "git" && inv.args.iter().any(|a| a == "rev-parse")
}

pub fn is_pull(inv: &Invocation) -> bool {
    inv.program == "git" && inv.args.iter().any(|a| a == "pull")
}

pub fn exec_failure(inv: &Invocation) -> DeployError {
    DeployError::Execution {
        command: inv.to_string(),
        reason: "exited with status 1".to_string(),
    }
}

/// Upstream head that never changes.
pub struct FixedRevision {
    head: Option<String>,
    calls: Cell<usize>,
}

impl FixedRevision {
    pub fn new(head: &str) -> Self {
        Self {
            head: Some(head.to_string()),
            calls: Cell::new(0),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            head: None,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl RevisionSource for FixedRevision {
    fn latest_revision(&self) -> cookout_core::Result<Revision> {
        self.calls.set(self.calls.get() + 1);
        match &self.head {
            Some(head) => Ok(Revision::new(head.clone())),
            None => Err(DeployError::RemoteReference("connection refused".to_string())),
        }
    }
}

/// Serves a fixed snapshot and counts queries.
pub struct StaticTopology {
    snapshot: TopologySnapshot,
    calls: Cell<usize>,
}

impl StaticTopology {
    pub fn new(snapshot: TopologySnapshot) -> Self {
        Self {
            snapshot,
            calls: Cell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.get()
    }
}

impl TopologySource for StaticTopology {
    fn snapshot(&self) -> cookout_core::Result<TopologySnapshot> {
        self.calls.set(self.calls.get() + 1);
        Ok(self.snapshot.clone())
    }
}

pub fn topology(project: &str, environment: &str, hosts: &[&str]) -> TopologySnapshot {
    TopologySnapshot::new(vec![Project {
        name: project.to_string(),
        environments: vec![Environment {
            name: environment.to_string(),
            hosts: hosts.iter().map(|h| Host::new(*h)).collect(),
        }],
    }])
}
