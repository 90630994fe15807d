//! The deploy run: sync the provisioning repo, then provision each host in
//! order, stopping at the first failure.

use std::path::PathBuf;

use tracing::info;

use crate::error::Result;
use crate::runner::{CommandRunner, ExecContext, Invocation};
use crate::settings::Settings;
use crate::sync::{RepoSync, RevisionSource, SyncOutcome};
use crate::topology::{Host, TopologySource};

/// Program used to provision hosts.
pub const KNIFE_PROGRAM: &str = "knife";

/// Which `knife solo` subcommand to run against each host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookMode {
    /// Install chef on a fresh host, then cook.
    Bootstrap,
    /// Converge an already bootstrapped host.
    #[default]
    Cook,
}

impl CookMode {
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap",
            Self::Cook => "cook",
        }
    }
}

/// What the caller asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRequest {
    pub project: String,
    pub environment: String,
    /// Skip the provisioning repo sync.
    pub skip_sync: bool,
    /// Stop after the sync.
    pub sync_only: bool,
    pub mode: CookMode,
}

impl DeployRequest {
    pub fn new(project: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            environment: environment.into(),
            skip_sync: false,
            sync_only: false,
            mode: CookMode::Cook,
        }
    }

    pub fn with_skip_sync(mut self, skip: bool) -> Self {
        self.skip_sync = skip;
        self
    }

    pub fn with_sync_only(mut self, sync_only: bool) -> Self {
        self.sync_only = sync_only;
        self
    }

    pub fn with_mode(mut self, mode: CookMode) -> Self {
        self.mode = mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// `sync_only` was set; no host was touched.
    SyncOnly { sync: Option<SyncOutcome> },
    /// Every host was provisioned.
    Deployed {
        sync: Option<SyncOutcome>,
        hosts: Vec<String>,
    },
}

/// Typed fields of one `knife solo` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnifeInvocation {
    pub mode: CookMode,
    pub knife_config: PathBuf,
    pub identity_file: PathBuf,
    pub user: String,
    pub host: String,
}

impl KnifeInvocation {
    pub fn for_host(settings: &Settings, host: &Host, mode: CookMode) -> Self {
        Self {
            mode,
            knife_config: settings.knife_path.clone(),
            identity_file: settings.pem_key.clone(),
            user: settings.deploy_user.clone(),
            host: host.uri.clone(),
        }
    }

    pub fn target(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    pub fn to_invocation(&self) -> Invocation {
        Invocation::new(KNIFE_PROGRAM)
            .args(["solo", self.mode.subcommand()])
            .arg("-c")
            .arg(self.knife_config.to_string_lossy())
            .arg("-i")
            .arg(self.identity_file.to_string_lossy())
            .arg("--no-host-key-verify")
            .arg(self.target())
    }
}

/// Drives one deploy run against injected collaborators.
pub struct Deployer<'a> {
    settings: &'a Settings,
    runner: &'a dyn CommandRunner,
    topology: &'a dyn TopologySource,
    remote: &'a dyn RevisionSource,
}

impl<'a> Deployer<'a> {
    pub fn new(
        settings: &'a Settings,
        runner: &'a dyn CommandRunner,
        topology: &'a dyn TopologySource,
        remote: &'a dyn RevisionSource,
    ) -> Self {
        Self {
            settings,
            runner,
            topology,
            remote,
        }
    }

    fn context(&self) -> ExecContext {
        ExecContext::new(&self.settings.chef_path)
    }

    pub fn run(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let ctx = self.context();

        let sync = if request.skip_sync {
            info!("skipping provisioning repo sync");
            None
        } else {
            Some(RepoSync::new(self.settings, self.runner, self.remote).sync(&ctx)?)
        };

        if request.sync_only {
            info!("sync only, not deploying");
            return Ok(DeployOutcome::SyncOnly { sync });
        }

        let snapshot = self.topology.snapshot()?;
        let hosts = snapshot.hosts(&request.project, &request.environment)?;
        info!(
            project = %request.project,
            environment = %request.environment,
            hosts = hosts.len(),
            "deploying"
        );

        let mut deployed = Vec::with_capacity(hosts.len());
        for host in hosts {
            self.provision(host, request.mode, &ctx)?;
            deployed.push(host.uri.clone());
        }

        Ok(DeployOutcome::Deployed {
            sync,
            hosts: deployed,
        })
    }

    fn provision(&self, host: &Host, mode: CookMode, ctx: &ExecContext) -> Result<()> {
        let knife = KnifeInvocation::for_host(self.settings, host, mode);
        let invocation = knife.to_invocation();

        info!(host = %host.uri, "deploying to server");
        info!(command = %invocation.redacted("-i"), "prepared knife command");

        self.runner.run(&invocation, ctx)?;
        Ok(())
    }
}
