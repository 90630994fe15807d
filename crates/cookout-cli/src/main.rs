//! Cookout - chef deploys driven by etcd
//!
//! Usage:
//!   cookout -p billing -e production        # sync chef repo, cook every host
//!   cookout -p billing -e production -b     # bootstrap instead of cook
//!   cookout -p billing -e production -o     # only sync the chef repo
//!   cookout -p billing -e production -m     # deploy without syncing

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cookout_core::DeployError;
use cookout_core::orchestrator::{CookMode, DeployOutcome, DeployRequest, Deployer};
use cookout_core::runner::SystemRunner;
use cookout_core::settings::{DEFAULT_SETTINGS_PATH, load_settings};
use cookout_core::sync::GitHubRevisionSource;
use cookout_core::topology::EtcdTopologySource;

#[derive(Parser, Debug)]
#[command(name = "cookout")]
#[command(about = "Sync the chef repository and run knife solo on every host of an environment", long_about = None)]
struct Cli {
    /// Project (required)
    #[arg(short = 'p', value_name = "PROJECT")]
    project: String,

    /// Environment (required)
    #[arg(short = 'e', value_name = "ENVIRONMENT")]
    environment: String,

    /// Shared settings file
    #[arg(short = 'g', value_name = "FILE", default_value = DEFAULT_SETTINGS_PATH)]
    config: PathBuf,

    /// Chef update only
    #[arg(short = 'o')]
    pull_only: bool,

    /// Skip the chef update
    #[arg(short = 'm')]
    skip_update: bool,

    /// Bootstrap the servers instead of cooking them
    #[arg(short = 'b')]
    bootstrap: bool,

    /// Debug logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

impl Cli {
    fn request(&self) -> DeployRequest {
        let mode = if self.bootstrap {
            CookMode::Bootstrap
        } else {
            CookMode::Cook
        };
        DeployRequest::new(&self.project, &self.environment)
            .with_skip_sync(self.skip_update)
            .with_sync_only(self.pull_only)
            .with_mode(mode)
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "warn,cookout=debug"
    } else {
        "warn,cookout=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(err) = run(&cli) {
        let kind = err
            .downcast_ref::<DeployError>()
            .map(DeployError::kind)
            .unwrap_or("internal");
        error!(kind, "{:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let settings = load_settings(&cli.config)?;

    let runner = SystemRunner::new();
    let topology = EtcdTopologySource::new(settings.etcd_server.clone());
    let remote = GitHubRevisionSource::from_settings(&settings);

    let outcome = Deployer::new(&settings, &runner, &topology, &remote).run(&cli.request())?;

    match outcome {
        DeployOutcome::SyncOnly { .. } => info!("chef repository sync finished"),
        DeployOutcome::Deployed { hosts, .. } => info!(
            project = %cli.project,
            environment = %cli.environment,
            hosts = hosts.len(),
            "deploy finished"
        ),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_map_onto_request() {
        let cli = Cli::try_parse_from(["cookout", "-p", "billing", "-e", "qa", "-b", "-m"]).unwrap();
        let request = cli.request();
        assert_eq!(request.project, "billing");
        assert_eq!(request.environment, "qa");
        assert_eq!(request.mode, CookMode::Bootstrap);
        assert!(request.skip_sync);
        assert!(!request.sync_only);
        assert_eq!(cli.config, PathBuf::from(DEFAULT_SETTINGS_PATH));
    }

    #[test]
    fn project_and_environment_are_required() {
        assert!(Cli::try_parse_from(["cookout", "-e", "qa"]).is_err());
        assert!(Cli::try_parse_from(["cookout", "-p", "billing"]).is_err());
    }
}
