//! Buildwatch - continuous integration trigger daemon
//!
//! CLI entry point for running the daemon and validating configuration.

use std::sync::Arc;

use clap::Parser;
use eyre::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use buildwatch::cli::{Cli, Command};
use buildwatch::config::Config;
use buildwatch::github::{GitHubClient, RepoClient};
use buildwatch::overseer::Overseer;
use buildwatch::trigger::{BuildTriggerQueue, JenkinsClient, TriggerClient};

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (verbose: {})", verbose);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    match cli.command {
        Some(Command::Validate) => cmd_validate(&config).await,
        Some(Command::Run) | None => cmd_run(config).await,
    }
}

/// Run the daemon until a termination signal arrives
async fn cmd_run(config: Config) -> Result<()> {
    config.validate()?;

    let repo: Arc<dyn RepoClient> =
        Arc::new(GitHubClient::new(&config.github).context("Failed to create API client")?);
    let trigger_client: Arc<dyn TriggerClient> = Arc::new(
        JenkinsClient::from_config(&config.build_server)
            .context("Failed to create build server client")?,
    );

    let shutdown = CancellationToken::new();
    let triggers = Arc::new(BuildTriggerQueue::new());
    let mut worker = tokio::spawn(triggers.clone().run(trigger_client, shutdown.clone()));

    let overseer = Overseer::new(config, repo, triggers, shutdown.clone());
    let mut overseer_task = tokio::spawn(overseer.run());

    info!("Buildwatch running. Press Ctrl+C to stop.");

    let mut failed = false;
    let mut overseer_done = false;
    let mut worker_done = false;
    tokio::select! {
        result = wait_for_shutdown_signal() => {
            if let Err(e) = result {
                error!(error = %e, "Signal handling failed; shutting down");
            }
        }
        result = &mut overseer_task => {
            // The overseer returning at all means something fatal happened.
            if overseer_exited_cleanly(result) {
                error!("Overseer exited unexpectedly");
            }
            overseer_done = true;
            failed = true;
        }
        result = &mut worker => {
            // The worker only returns once cancelled; anything earlier is fatal.
            match result {
                Ok(()) => error!("Trigger worker exited unexpectedly"),
                Err(_) => error!("Trigger worker panicked"),
            }
            worker_done = true;
            failed = true;
        }
    }

    shutdown.cancel();
    info!("Draining watchers and trigger worker");
    if !overseer_done && !overseer_exited_cleanly(overseer_task.await) {
        failed = true;
    }
    if !worker_done {
        let _ = worker.await;
    }

    info!("Buildwatch stopped");
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

fn overseer_exited_cleanly(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> bool {
    match result {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            error!(error = %e, "Overseer failed");
            false
        }
        Err(_) => {
            error!("Overseer panicked");
            false
        }
    }
}

/// Resolve when SIGINT or SIGTERM arrives. SIGHUP is ignored so a
/// dropped terminal does not kill the daemon; reconfiguration happens
/// through the configuration repository, not through signals.
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sighup = signal(SignalKind::hangup())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        loop {
            tokio::select! {
                _ = sighup.recv() => {
                    info!("SIGHUP received; edit the configuration repository to reconfigure");
                }
                _ = sigint.recv() => {
                    warn!("SIGINT received");
                    return Ok(());
                }
                _ = sigterm.recv() => {
                    warn!("SIGTERM received");
                    return Ok(());
                }
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok(())
    }
}

/// Load the project documents once and report what would be watched
async fn cmd_validate(config: &Config) -> Result<()> {
    config.validate()?;

    let repo: Arc<dyn RepoClient> =
        Arc::new(GitHubClient::new(&config.github).context("Failed to create API client")?);
    let overseer = Overseer::new(
        config.clone(),
        repo,
        Arc::new(BuildTriggerQueue::new()),
        CancellationToken::new(),
    );

    let (head, projects) = overseer.load_current().await?;

    println!(
        "Configuration {}/{} @ {} ({})",
        config.configuration.owner, config.configuration.repo, config.configuration.branch, head
    );
    if projects.is_empty() {
        println!("No projects to watch.");
        return Ok(());
    }
    println!("{} project(s):", projects.len());
    for project in &projects {
        let mode = if project.is_declarative() { "declarative" } else { "inferred" };
        println!(
            "  {} -> {} @ {} ({}, {} build url(s))",
            project.name,
            project.config.repo_url,
            project.config.branch,
            mode,
            project.config.build_urls.len()
        );
    }
    Ok(())
}
