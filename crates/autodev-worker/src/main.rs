//! autodevd - the long-running work-item remediation worker.
//!
//! No interactive command surface: behavior is controlled entirely by the
//! configuration supplied at startup (flags or environment).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use autodev_agent::{AgentConfig, ChatAgent};
use autodev_core::RemediationConfig;
use autodev_devops::{DevOpsConfig, DevOpsConnection};
use autodev_worker::driver::{Driver, DriverSettings};

#[derive(Parser)]
#[command(name = "autodevd")]
#[command(author = "Autodev Maintainers")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated work-item remediation worker", long_about = None)]
struct Cli {
    /// DevOps organization base URL, e.g. https://dev.azure.com/acme
    #[arg(long, env = "AUTODEV_ORG_URL")]
    organization_url: String,

    /// Project name within the organization
    #[arg(long, env = "AUTODEV_PROJECT")]
    project: String,

    /// Personal access token for the DevOps server
    #[arg(long, env = "AUTODEV_PAT", hide_env_values = true)]
    pat: String,

    /// API key for the code-generation agent
    #[arg(long, env = "AUTODEV_AGENT_API_KEY", hide_env_values = true)]
    agent_api_key: String,

    /// Chat-completions endpoint the agent speaks to
    #[arg(
        long,
        env = "AUTODEV_AGENT_ENDPOINT",
        default_value = "https://api.openai.com/v1/chat/completions"
    )]
    agent_endpoint: String,

    /// Model the agent runs on
    #[arg(long, env = "AUTODEV_AGENT_MODEL", default_value = "gpt-4.1")]
    agent_model: String,

    /// Work-item tag that opts a ticket into automation
    #[arg(long, default_value = "autocode")]
    tag: String,

    /// Branch pull requests target
    #[arg(long, default_value = "main")]
    target_branch: String,

    /// Seconds between ticket scans
    #[arg(long, default_value_t = 120)]
    scan_interval_secs: u64,

    /// Seconds between build status polls
    #[arg(long, default_value_t = 10)]
    poll_interval_secs: u64,

    /// Wall-clock bound on one build's polling, in seconds
    #[arg(long, default_value_t = 1800)]
    poll_timeout_secs: u64,

    /// Fix attempts per work item before giving up
    #[arg(long, default_value_t = 3)]
    max_attempts: u32,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    let connection = DevOpsConnection::new(DevOpsConfig {
        organization_url: cli.organization_url.clone(),
        project: cli.project.clone(),
        pat: cli.pat.clone(),
    })?;
    let agent = ChatAgent::new(AgentConfig {
        endpoint: cli.agent_endpoint.clone(),
        api_key: cli.agent_api_key.clone(),
        model: cli.agent_model.clone(),
        ..AgentConfig::default()
    })?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        }
    });

    let settings = DriverSettings {
        tag: cli.tag.clone(),
        target_branch: cli.target_branch.clone(),
        max_attempts: cli.max_attempts,
        remediation: RemediationConfig {
            poll_interval: Duration::from_secs(cli.poll_interval_secs),
            poll_timeout: Duration::from_secs(cli.poll_timeout_secs),
            ..RemediationConfig::default()
        },
    };
    let driver = Driver::new(
        Arc::new(connection.vcs()),
        Arc::new(connection.builds()),
        Arc::new(agent),
        Arc::new(connection.tickets()),
        settings,
        shutdown_rx.clone(),
    );

    info!(
        project = %cli.project,
        tag = %cli.tag,
        scan_interval_secs = cli.scan_interval_secs,
        "autodevd started"
    );

    let scan_interval = Duration::from_secs(cli.scan_interval_secs);
    let mut shutdown = shutdown_rx;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let processed = driver.scan_once().await;
        if processed > 0 {
            info!(processed, "scan complete");
        }

        tokio::select! {
            _ = tokio::time::sleep(scan_interval) => {}
            _ = shutdown.changed() => {}
        }
    }

    info!("autodevd stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
