//! Watcher supervision
//!
//! The overseer polls the configuration repository and keeps one watcher
//! running per valid project document. A configuration change replaces
//! the whole generation: the new set is loaded and validated first, then
//! the old watchers are cancelled and drained, then the new ones start.
//! Loading failures leave the running generation untouched.

use std::sync::Arc;

use eyre::{Result, eyre};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::github::{RepoClient, TYPE_BLOB};
use crate::project::{BuildProject, reject_duplicates};
use crate::trigger::BuildTriggerQueue;
use crate::watcher::ProjectWatcher;

/// A watcher task panicked. Always takes the process down, unlike the
/// retryable configuration errors the poll loop logs and absorbs.
#[derive(Debug, thiserror::Error)]
#[error("watcher {0} panicked")]
struct WatcherPanic(String);

/// Supervises one watcher per configured project
pub struct Overseer {
    config: Config,
    repo: Arc<dyn RepoClient>,
    triggers: Arc<BuildTriggerQueue>,
    shutdown: CancellationToken,
    /// Cancelling this stops the current watcher generation only
    generation: CancellationToken,
    watchers: Vec<(String, JoinHandle<Result<()>>)>,
    config_commit_id: Option<String>,
}

impl Overseer {
    pub fn new(
        config: Config,
        repo: Arc<dyn RepoClient>,
        triggers: Arc<BuildTriggerQueue>,
        shutdown: CancellationToken,
    ) -> Self {
        let generation = shutdown.child_token();
        Self {
            config,
            repo,
            triggers,
            shutdown,
            generation,
            watchers: Vec::new(),
            config_commit_id: None,
        }
    }

    /// Run until shutdown. Returns Err only for failures that must take
    /// the process down, such as a panicked watcher.
    pub async fn run(mut self) -> Result<()> {
        info!(
            owner = %self.config.configuration.owner,
            repo = %self.config.configuration.repo,
            branch = %self.config.configuration.branch,
            "Overseer started"
        );

        loop {
            if let Err(e) = self.check_configuration().await {
                if e.is::<WatcherPanic>() {
                    return Err(e);
                }
                warn!(error = %e, "Failed to check configuration; retrying next tick");
            }
            self.reap_finished().await?;

            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.config.watch.poll_interval()) => {}
            }
        }

        info!("Overseer draining watchers");
        self.drain_generation().await?;
        info!("Overseer stopped");
        Ok(())
    }

    /// Poll the configuration head; on change, replace the generation
    async fn check_configuration(&mut self) -> Result<()> {
        let cfg = &self.config.configuration;
        let head = self
            .repo
            .get_latest_commit_id(&cfg.owner, &cfg.repo, &cfg.branch)
            .await?
            .ok_or_else(|| {
                eyre!(
                    "configuration branch {}/{}@{} does not exist",
                    cfg.owner,
                    cfg.repo,
                    cfg.branch
                )
            })?;

        if self.config_commit_id.as_deref() == Some(head.as_str()) {
            return Ok(());
        }
        info!(head = %head, "Configuration changed; reloading projects");

        // Load before touching the running generation, so that a broken
        // fetch never leaves us with zero watchers.
        let projects = self.load_projects(&head).await?;

        self.drain_generation().await?;
        self.generation = self.shutdown.child_token();
        for project in projects {
            let name = project.name.clone();
            let watcher = ProjectWatcher::new(
                project,
                self.config.watch.clone(),
                self.repo.clone(),
                self.triggers.clone(),
                self.generation.clone(),
            );
            info!(project = %name, "Spawning watcher");
            self.watchers.push((name, tokio::spawn(watcher.run())));
        }
        self.config_commit_id = Some(head);
        Ok(())
    }

    /// Fetch and parse every project document at the given head.
    ///
    /// Documents are parsed in isolation; a malformed file rejects only
    /// itself. A failed blob fetch fails the whole load instead, since
    /// silently dropping a healthy project would unwatch it until the
    /// next configuration change.
    async fn load_projects(&self, head: &str) -> Result<Vec<BuildProject>> {
        let cfg = &self.config.configuration;
        let commit = self.repo.get_commit(&cfg.owner, &cfg.repo, head).await?;
        let tree = self.repo.get_tree(&cfg.owner, &cfg.repo, &commit.tree.sha).await?;

        let mut documents = Vec::new();
        for entry in &tree.entries {
            if entry.kind != TYPE_BLOB || !entry.path.to_ascii_lowercase().ends_with(".json") {
                continue;
            }
            let name = entry.path[..entry.path.len() - ".json".len()].to_string();
            documents.push((name, entry.sha.clone()));
        }

        let fetches = documents.into_iter().map(|(name, sha)| {
            let repo = self.repo.clone();
            let owner = cfg.owner.clone();
            let repo_name = cfg.repo.clone();
            async move {
                let blob = repo.get_blob(&owner, &repo_name, &sha).await;
                (name, blob)
            }
        });

        let mut projects = Vec::new();
        for (name, blob) in join_all(fetches).await {
            let blob = blob.map_err(|e| eyre!("failed to fetch project document {name}: {e}"))?;
            let content = match blob.decode() {
                Ok(content) => content,
                Err(e) => {
                    error!(project = %name, error = %e, "Undecodable project document; skipping");
                    continue;
                }
            };
            match BuildProject::from_json(&name, &content) {
                Ok(project) if project.config.disabled => {
                    info!(project = %name, "Project is disabled; skipping");
                }
                Ok(project) => projects.push(project),
                Err(e) => {
                    error!(project = %name, error = %e, "Invalid project document; skipping");
                }
            }
        }

        let (projects, rejected) = reject_duplicates(projects);
        for (name, target) in rejected {
            error!(project = %name, %target, "Projects share a build repository and branch; rejecting both");
        }
        info!(count = projects.len(), "Loaded build projects");
        Ok(projects)
    }

    /// Resolve the configuration head and load its projects. Used by the
    /// validate command.
    pub async fn load_current(&self) -> Result<(String, Vec<BuildProject>)> {
        let cfg = &self.config.configuration;
        let head = self
            .repo
            .get_latest_commit_id(&cfg.owner, &cfg.repo, &cfg.branch)
            .await?
            .ok_or_else(|| {
                eyre!(
                    "configuration branch {}/{}@{} does not exist",
                    cfg.owner,
                    cfg.repo,
                    cfg.branch
                )
            })?;
        let projects = self.load_projects(&head).await?;
        Ok((head, projects))
    }

    /// Reap watcher tasks that ended on their own. A watcher error only
    /// unwatches that project; a panic takes the daemon down.
    async fn reap_finished(&mut self) -> Result<()> {
        let mut alive = Vec::new();
        for (name, handle) in self.watchers.drain(..) {
            if !handle.is_finished() {
                alive.push((name, handle));
                continue;
            }
            match handle.await {
                Ok(Ok(())) => info!(project = %name, "Watcher exited"),
                Ok(Err(e)) => {
                    error!(
                        project = %name,
                        error = %e,
                        "Watcher terminated; project is unwatched until the next configuration change"
                    );
                }
                Err(e) if e.is_panic() => return Err(WatcherPanic(name).into()),
                Err(e) => warn!(project = %name, error = %e, "Watcher task aborted"),
            }
        }
        self.watchers = alive;
        Ok(())
    }

    /// Cancel the running generation and wait for every watcher to stop.
    /// Watchers unblock promptly on cancellation, so this is bounded by
    /// one in-flight request. Runs at both configuration changes and
    /// shutdown; a panic discovered at either is fatal.
    async fn drain_generation(&mut self) -> Result<()> {
        if self.watchers.is_empty() {
            return Ok(());
        }
        debug!(count = self.watchers.len(), "Cancelling watcher generation");
        self.generation.cancel();
        let (names, handles): (Vec<_>, Vec<_>) = self.watchers.drain(..).unzip();
        let mut panicked = None;
        for (name, result) in names.into_iter().zip(join_all(handles).await) {
            match result {
                Ok(Ok(())) => debug!(project = %name, "Watcher drained"),
                Ok(Err(e)) => warn!(project = %name, error = %e, "Watcher ended with error during drain"),
                Err(e) if e.is_panic() => panicked = Some(name),
                Err(_) => {}
            }
        }
        match panicked {
            Some(name) => Err(WatcherPanic(name).into()),
            None => Ok(()),
        }
    }
}
