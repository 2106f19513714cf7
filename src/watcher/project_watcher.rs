//! Per-project watcher
//!
//! One watcher owns one build repository branch. It polls the branch and
//! every tracked submodule's upstream, batches upstream changes until
//! they settle, then writes a single pinning commit through the git data
//! API and advances the branch with a compare-and-swap ref update.
//! Losing that race is normal (another daemon instance may have won);
//! the watcher backs off, re-reads the branch, and carries its
//! uncommitted updates forward.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use eyre::{Result, WrapErr, eyre};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::github::{GitTree, NewCommit, NewTree, RepoClient, TYPE_BLOB, TreeEntry};
use crate::project::{BuildProject, RepoAddress};
use crate::trigger::BuildTriggerQueue;

use super::gitmodules;
use super::message::{self, CommitSummary, ComparisonSummary, SubmoduleUpdate};

/// Path of the submodule definition blob in the repository root
pub const GITMODULES_PATH: &str = ".gitmodules";

/// Branch used as the fork point when the watched branch does not exist
const DEFAULT_BRANCH: &str = "master";

/// One tracked submodule of a build repository
#[derive(Debug, Clone)]
pub struct Submodule {
    pub path: String,
    pub url: String,
    pub address: RepoAddress,
    pub branch: String,
    /// Commit the build repository currently pins this submodule to
    pub latest_commit_id: String,
}

enum BuildRepoState {
    Unchanged,
    Changed(String),
    /// Transient poll failure; state unknown this tick
    Unknown,
}

enum LoadOutcome {
    Ready,
    /// A reconciliation commit lost the ref update race
    LostRace,
}

/// Watches one build project until cancelled or a fatal error
pub struct ProjectWatcher {
    project: BuildProject,
    config: WatchConfig,
    repo: Arc<dyn RepoClient>,
    triggers: Arc<BuildTriggerQueue>,
    cancel: CancellationToken,

    /// Tracked submodules, keyed by path
    submodules: HashMap<String, Submodule>,
    last_build_commit_id: Option<String>,
    /// Observed-but-uncommitted submodule updates, path to new sha.
    /// Survives lost ref races so batched work is never thrown away.
    pending: HashMap<String, String>,
    retry_delay: Duration,
}

impl ProjectWatcher {
    pub fn new(
        project: BuildProject,
        config: WatchConfig,
        repo: Arc<dyn RepoClient>,
        triggers: Arc<BuildTriggerQueue>,
        cancel: CancellationToken,
    ) -> Self {
        let retry_delay = config.retry_floor();
        Self {
            project,
            config,
            repo,
            triggers,
            cancel,
            submodules: HashMap::new(),
            last_build_commit_id: None,
            pending: HashMap::new(),
            retry_delay,
        }
    }

    /// Head commit the watcher currently believes the branch points at
    pub fn last_build_commit_id(&self) -> Option<&str> {
        self.last_build_commit_id.as_deref()
    }

    fn owner(&self) -> &str {
        &self.project.address.owner
    }

    fn repo_name(&self) -> &str {
        &self.project.address.repo
    }

    /// Run until cancelled (Ok) or a fatal error (Err).
    pub async fn run(mut self) -> Result<()> {
        info!(
            project = %self.project.name,
            repo = %self.project.config.repo_url,
            branch = %self.project.config.branch,
            "ProjectWatcher started"
        );
        let cancel = self.cancel.clone();
        let result = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(project = %self.project.name, "ProjectWatcher cancelled");
                Ok(())
            }
            result = self.watch() => result,
        };
        info!(project = %self.project.name, ok = result.is_ok(), "ProjectWatcher stopped");
        result
    }

    async fn watch(&mut self) -> Result<()> {
        self.initialize().await?;

        loop {
            match self.poll_build_repo().await? {
                BuildRepoState::Changed(head) => {
                    // Another writer (or another daemon) advanced the
                    // branch. A build of the new head is due, and our
                    // view of the submodule set may be stale.
                    info!(project = %self.project.name, head = %head, "Build repository changed; reloading");
                    self.trigger_builds().await;
                    self.last_build_commit_id = Some(head);
                    self.load_submodules().await?;
                    continue;
                }
                BuildRepoState::Unknown => {
                    tokio::time::sleep(self.config.poll_interval()).await;
                    continue;
                }
                BuildRepoState::Unchanged => {}
            }

            let changed_this_tick = self.poll_submodules().await?;
            tokio::time::sleep(self.config.poll_interval()).await;
            if changed_this_tick {
                // Keep batching until a full tick passes with nothing new.
                continue;
            }
            if !self.pending.is_empty() {
                self.commit_pending().await?;
            }
        }
    }

    /// Resolve the branch head (creating the branch if necessary) and
    /// load the submodule set. No builds are triggered for the initial
    /// head; only changes observed after startup do that.
    async fn initialize(&mut self) -> Result<()> {
        let branch = self.project.config.branch.clone();
        let head = self
            .repo
            .get_latest_commit_id(self.owner(), self.repo_name(), &branch)
            .await
            .wrap_err("failed to resolve build repository head")?;
        let head = match head {
            Some(sha) => sha,
            None => self.create_branch(&branch).await?,
        };
        debug!(project = %self.project.name, head = %head, "Resolved build repository head");
        self.last_build_commit_id = Some(head);
        self.load_submodules().await
    }

    /// The watched branch does not exist; fork it from the default branch.
    async fn create_branch(&mut self, branch: &str) -> Result<String> {
        info!(project = %self.project.name, %branch, "Branch missing; creating from default branch");
        let base = self
            .repo
            .get_latest_commit_id(self.owner(), self.repo_name(), DEFAULT_BRANCH)
            .await
            .wrap_err("failed to resolve default branch head")?
            .ok_or_else(|| {
                eyre!(
                    "cannot create branch {branch}: {} has no {DEFAULT_BRANCH} branch",
                    self.project.config.repo_url
                )
            })?;
        self.repo
            .create_branch(self.owner(), self.repo_name(), branch, &base)
            .await
            .wrap_err_with(|| format!("failed to create branch {branch}"))?;
        // Let the new ref propagate before reading through it.
        tokio::time::sleep(self.config.branch_create_pause()).await;
        Ok(base)
    }

    async fn poll_build_repo(&mut self) -> Result<BuildRepoState> {
        let branch = &self.project.config.branch;
        match self
            .repo
            .get_latest_commit_id(self.owner(), self.repo_name(), branch)
            .await
        {
            Ok(Some(head)) => {
                if self.last_build_commit_id.as_deref() == Some(head.as_str()) {
                    Ok(BuildRepoState::Unchanged)
                } else {
                    Ok(BuildRepoState::Changed(head))
                }
            }
            Ok(None) => Err(eyre!(
                "branch {branch} of {} no longer exists",
                self.project.config.repo_url
            )),
            Err(e) => {
                warn!(project = %self.project.name, error = %e, "Failed to poll build repository head");
                Ok(BuildRepoState::Unknown)
            }
        }
    }

    /// Poll every submodule upstream. A head that differs from both the
    /// current pin and any already-pending update is recorded; returning
    /// true keeps the watcher in its batching phase.
    async fn poll_submodules(&mut self) -> Result<bool> {
        let mut changed = false;
        let paths: Vec<String> = self.submodules.keys().cloned().collect();
        for path in paths {
            let Some(submodule) = self.submodules.get(&path) else {
                continue;
            };
            let head = match self
                .repo
                .get_latest_commit_id(&submodule.address.owner, &submodule.address.repo, &submodule.branch)
                .await
            {
                Ok(Some(sha)) => sha,
                Ok(None) => {
                    return Err(eyre!(
                        "branch {} of submodule {} no longer exists",
                        submodule.branch,
                        submodule.url
                    ));
                }
                Err(e) => {
                    warn!(
                        project = %self.project.name,
                        submodule = %path,
                        error = %e,
                        "Failed to poll submodule head"
                    );
                    continue;
                }
            };
            if head != submodule.latest_commit_id
                && self.pending.get(&path).map(String::as_str) != Some(head.as_str())
            {
                info!(
                    project = %self.project.name,
                    submodule = %path,
                    from = %submodule.latest_commit_id,
                    to = %head,
                    "Submodule upstream changed"
                );
                self.pending.insert(path, head);
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Rebuild the submodule table from the current head, retrying when
    /// declarative reconciliation loses the ref race.
    async fn load_submodules(&mut self) -> Result<()> {
        loop {
            match self.try_load_submodules().await? {
                LoadOutcome::Ready => return Ok(()),
                LoadOutcome::LostRace => {
                    self.backoff().await;
                    self.refresh_head().await?;
                }
            }
        }
    }

    async fn try_load_submodules(&mut self) -> Result<LoadOutcome> {
        let head = self
            .last_build_commit_id
            .clone()
            .ok_or_else(|| eyre!("no build repository head"))?;
        let commit = self
            .repo
            .get_commit(self.owner(), self.repo_name(), &head)
            .await
            .wrap_err("failed to fetch head commit")?;
        let tree = self
            .repo
            .get_tree(self.owner(), self.repo_name(), &commit.tree.sha)
            .await
            .wrap_err("failed to fetch root tree")?;

        let outcome = if self.project.is_declarative() {
            self.load_declared_submodules(&head, &tree).await?
        } else {
            self.load_inferred_submodules(&tree).await?;
            LoadOutcome::Ready
        };

        // Updates already applied by whoever moved the head are done;
        // everything else stays pending.
        let submodules = &self.submodules;
        self.pending.retain(|path, sha| match submodules.get(path) {
            Some(submodule) => submodule.latest_commit_id != *sha,
            None => false,
        });

        Ok(outcome)
    }

    /// Inferred mode: the repository's own `.gitmodules` blob and gitlink
    /// entries define the submodule set.
    async fn load_inferred_submodules(&mut self, tree: &GitTree) -> Result<()> {
        self.submodules.clear();

        let Some(definition) = tree
            .entries
            .iter()
            .find(|e| e.path == GITMODULES_PATH && e.kind == TYPE_BLOB)
        else {
            warn!(project = %self.project.name, "No .gitmodules in build repository; nothing to track");
            return Ok(());
        };
        let blob = self
            .repo
            .get_blob(self.owner(), self.repo_name(), &definition.sha)
            .await
            .wrap_err("failed to fetch .gitmodules blob")?;
        let content = match blob.decode() {
            Ok(content) => content,
            Err(e) => {
                warn!(project = %self.project.name, error = %e, "Could not decode .gitmodules; nothing to track");
                return Ok(());
            }
        };

        for entry in gitmodules::parse(&content) {
            let Some(gitlink) = tree.entries.iter().find(|e| e.path == entry.path && e.is_gitlink()) else {
                warn!(
                    project = %self.project.name,
                    submodule = %entry.path,
                    "Submodule is defined but has no gitlink in the tree; skipping"
                );
                continue;
            };
            let address = match RepoAddress::parse(&entry.url) {
                Ok(address) => address,
                Err(e) => {
                    warn!(
                        project = %self.project.name,
                        submodule = %entry.path,
                        error = %e,
                        "Skipping submodule with unparsable url"
                    );
                    continue;
                }
            };
            let branch = self.project.branch_for(&entry.path).to_string();
            debug!(
                project = %self.project.name,
                submodule = %entry.path,
                %branch,
                pinned = %gitlink.sha,
                "Tracking submodule"
            );
            self.submodules.insert(
                entry.path.clone(),
                Submodule {
                    path: entry.path,
                    url: entry.url,
                    address,
                    branch,
                    latest_commit_id: gitlink.sha.clone(),
                },
            );
        }
        info!(project = %self.project.name, count = self.submodules.len(), "Loaded submodules");
        Ok(())
    }

    /// Declarative mode: the project document names the exact submodule
    /// set. Differences between it and the repository contents are
    /// repaired with a reconciliation commit.
    async fn load_declared_submodules(&mut self, head: &str, tree: &GitTree) -> Result<LoadOutcome> {
        let declared = self.project.config.submodules.clone().unwrap_or_default();
        self.submodules.clear();

        let mut needs_reconcile = false;
        for (url, branch) in &declared {
            let address = RepoAddress::parse(url)
                .map_err(|e| eyre!("declared submodule {url}: {e}"))?;
            let path = address.repo.clone();
            let latest = match tree.entries.iter().find(|e| e.path == path && e.is_gitlink()) {
                Some(gitlink) => gitlink.sha.clone(),
                None => {
                    info!(project = %self.project.name, submodule = %path, "Declared submodule missing from tree");
                    needs_reconcile = true;
                    self.repo
                        .get_latest_commit_id(&address.owner, &address.repo, branch)
                        .await
                        .wrap_err_with(|| format!("failed to resolve head of declared submodule {url}"))?
                        .ok_or_else(|| eyre!("declared submodule {url} has no branch {branch}"))?
                }
            };
            self.submodules.insert(
                path.clone(),
                Submodule {
                    path,
                    url: url.clone(),
                    address,
                    branch: branch.clone(),
                    latest_commit_id: latest,
                },
            );
        }

        for entry in tree.entries.iter().filter(|e| e.is_gitlink()) {
            if !self.submodules.contains_key(&entry.path) {
                info!(project = %self.project.name, submodule = %entry.path, "Undeclared submodule present in tree");
                needs_reconcile = true;
            }
        }

        // The definition blob must describe exactly the declared set.
        let recorded = self.recorded_definitions(tree).await?;
        let wanted: HashSet<(String, String)> = self
            .submodules
            .values()
            .map(|s| (s.path.clone(), s.url.clone()))
            .collect();
        if recorded != wanted {
            debug!(project = %self.project.name, "Submodule definitions are out of date");
            needs_reconcile = true;
        }

        info!(project = %self.project.name, count = self.submodules.len(), "Loaded declared submodules");

        if needs_reconcile {
            return self.reconcile(head, tree).await;
        }
        Ok(LoadOutcome::Ready)
    }

    /// (path, url) pairs recorded in the repository's `.gitmodules` blob
    async fn recorded_definitions(&self, tree: &GitTree) -> Result<HashSet<(String, String)>> {
        let Some(definition) = tree
            .entries
            .iter()
            .find(|e| e.path == GITMODULES_PATH && e.kind == TYPE_BLOB)
        else {
            return Ok(HashSet::new());
        };
        let blob = self
            .repo
            .get_blob(self.owner(), self.repo_name(), &definition.sha)
            .await
            .wrap_err("failed to fetch .gitmodules blob")?;
        match blob.decode() {
            Ok(content) => Ok(gitmodules::parse(&content)
                .into_iter()
                .map(|e| (e.path, e.url))
                .collect()),
            Err(e) => {
                // Treat an undecodable blob as empty; reconciliation
                // rewrites it either way.
                warn!(project = %self.project.name, error = %e, "Could not decode .gitmodules");
                Ok(HashSet::new())
            }
        }
    }

    /// Rewrite the root tree so the gitlinks and the definition blob
    /// match the declared set exactly. Everything that is not a gitlink
    /// or the definition blob is carried over untouched.
    async fn reconcile(&mut self, head: &str, tree: &GitTree) -> Result<LoadOutcome> {
        info!(project = %self.project.name, "Reconciling submodules");

        let before: HashSet<&str> = tree
            .entries
            .iter()
            .filter(|e| e.is_gitlink())
            .map(|e| e.path.as_str())
            .collect();
        let after: HashSet<&str> = self.submodules.keys().map(String::as_str).collect();
        let mut added: Vec<&str> = after.difference(&before).copied().collect();
        added.sort_unstable();
        let mut removed: Vec<&str> = before.difference(&after).copied().collect();
        removed.sort_unstable();

        let mut entries: Vec<TreeEntry> = tree
            .entries
            .iter()
            .filter(|e| !e.is_gitlink() && e.path != GITMODULES_PATH)
            .cloned()
            .collect();

        let mut submodules: Vec<&Submodule> = self.submodules.values().collect();
        submodules.sort_by(|a, b| a.path.cmp(&b.path));
        for submodule in &submodules {
            entries.push(TreeEntry::gitlink(&submodule.path, &submodule.latest_commit_id));
        }

        let definition = gitmodules::render(
            submodules.iter().map(|s| (s.path.as_str(), s.url.as_str())),
        );
        let blob_sha = self
            .repo
            .create_blob(self.owner(), self.repo_name(), &definition)
            .await
            .wrap_err("failed to create .gitmodules blob")?;
        entries.push(TreeEntry::blob(GITMODULES_PATH, &blob_sha));

        let mut lines = vec!["Reconcile submodules".to_string(), String::new()];
        lines.extend(added.iter().map(|path| format!("Added {path}.")));
        lines.extend(removed.iter().map(|path| format!("Removed {path}.")));
        if added.is_empty() && removed.is_empty() {
            lines.push("Rewrote submodule definitions.".to_string());
        }
        let message = lines.join("\n");

        let tree_sha = self
            .repo
            .create_tree(self.owner(), self.repo_name(), &NewTree { base_tree: None, entries })
            .await
            .wrap_err("failed to create reconciled tree")?;
        let commit_sha = self
            .repo
            .create_commit(
                self.owner(),
                self.repo_name(),
                &NewCommit {
                    message,
                    tree: tree_sha,
                    parents: vec![head.to_string()],
                },
            )
            .await
            .wrap_err("failed to create reconciliation commit")?;

        if self.update_branch(head, &commit_sha).await? {
            info!(project = %self.project.name, commit = %commit_sha, "Reconciliation commit pushed");
            self.last_build_commit_id = Some(commit_sha);
            self.retry_delay = self.config.retry_floor();
            self.trigger_builds().await;
            // Let the remote settle before the next poll.
            tokio::time::sleep(self.config.post_commit_pause()).await;
            Ok(LoadOutcome::Ready)
        } else {
            Ok(LoadOutcome::LostRace)
        }
    }

    /// Write one pinning commit covering every pending update.
    async fn commit_pending(&mut self) -> Result<()> {
        let head = self
            .last_build_commit_id
            .clone()
            .ok_or_else(|| eyre!("no build repository head"))?;
        info!(
            project = %self.project.name,
            updates = self.pending.len(),
            "Committing submodule updates"
        );

        let commit = self
            .repo
            .get_commit(self.owner(), self.repo_name(), &head)
            .await
            .wrap_err("failed to fetch head commit")?;
        let tree = self
            .repo
            .get_tree(self.owner(), self.repo_name(), &commit.tree.sha)
            .await
            .wrap_err("failed to fetch root tree")?;

        let mut paths: Vec<String> = self.pending.keys().cloned().collect();
        paths.sort_unstable();

        let mut entries = Vec::new();
        let mut updates = Vec::new();
        for path in &paths {
            let Some(new_sha) = self.pending.get(path).cloned() else {
                continue;
            };
            let Some(submodule) = self.submodules.get(path) else {
                continue;
            };
            entries.push(TreeEntry::gitlink(path, &new_sha));
            updates.push(self.describe_update(submodule, &new_sha).await);
        }

        let build_number = self.next_build_number(&tree).await?;
        if let Some(number) = build_number {
            let blob_sha = self
                .repo
                .create_blob(self.owner(), self.repo_name(), &format!("{number}\n"))
                .await
                .wrap_err("failed to create build number blob")?;
            entries.push(TreeEntry::blob(&self.config.build_number_path, &blob_sha));
        }

        let header = match build_number {
            Some(number) => format!("Build {number}"),
            None => "Update submodules".to_string(),
        };
        let message = message::build(&header, &updates);

        let tree_sha = self
            .repo
            .create_tree(
                self.owner(),
                self.repo_name(),
                &NewTree {
                    base_tree: Some(tree.sha.clone()),
                    entries,
                },
            )
            .await
            .wrap_err("failed to create tree")?;
        let commit_sha = self
            .repo
            .create_commit(
                self.owner(),
                self.repo_name(),
                &NewCommit {
                    message,
                    tree: tree_sha,
                    parents: vec![head.clone()],
                },
            )
            .await
            .wrap_err("failed to create commit")?;

        if self.update_branch(&head, &commit_sha).await? {
            info!(project = %self.project.name, commit = %commit_sha, "Pushed submodule update commit");
            for path in &paths {
                if let (Some(submodule), Some(sha)) =
                    (self.submodules.get_mut(path), self.pending.get(path))
                {
                    submodule.latest_commit_id = sha.clone();
                }
            }
            self.pending.clear();
            self.last_build_commit_id = Some(commit_sha);
            self.retry_delay = self.config.retry_floor();
            self.trigger_builds().await;
            // Let the remote settle before the next poll.
            tokio::time::sleep(self.config.post_commit_pause()).await;
        } else {
            self.backoff().await;
        }
        Ok(())
    }

    /// Everything the commit message needs to say about one update.
    /// Lookups that fail only degrade the message, never the commit.
    async fn describe_update(&self, submodule: &Submodule, new_sha: &str) -> SubmoduleUpdate {
        let update = |comparison| SubmoduleUpdate {
            path: submodule.path.clone(),
            old_sha: submodule.latest_commit_id.clone(),
            new_sha: new_sha.to_string(),
            comparison,
        };

        let comparison = match self
            .repo
            .compare_commits(
                &submodule.address.owner,
                &submodule.address.repo,
                &submodule.latest_commit_id,
                new_sha,
            )
            .await
        {
            Ok(Some(comparison)) => comparison,
            Ok(None) => return update(None),
            Err(e) => {
                debug!(
                    project = %self.project.name,
                    submodule = %submodule.path,
                    error = %e,
                    "Comparison unavailable"
                );
                return update(None);
            }
        };

        let total = comparison.total_commits.max(comparison.commits.len());
        let mut commits = Vec::new();
        for commit in message::recent_window(&comparison.commits) {
            let files = match self
                .repo
                .get_full_commit(&submodule.address.owner, &submodule.address.repo, &commit.sha)
                .await
            {
                Ok(Some(full)) => full.files.into_iter().map(|f| f.filename).collect(),
                _ => Vec::new(),
            };
            commits.push(CommitSummary {
                sha: commit.sha.clone(),
                author: commit
                    .commit
                    .author
                    .as_ref()
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| "unknown".to_string()),
                message: commit.commit.message.clone(),
                files,
            });
        }
        update(Some(ComparisonSummary { total, commits }))
    }

    /// Parse and bump the build number blob, if the repository has one
    async fn next_build_number(&self, tree: &GitTree) -> Result<Option<u64>> {
        let Some(entry) = tree
            .entries
            .iter()
            .find(|e| e.path == self.config.build_number_path && e.kind == TYPE_BLOB)
        else {
            return Ok(None);
        };
        let blob = self
            .repo
            .get_blob(self.owner(), self.repo_name(), &entry.sha)
            .await
            .wrap_err("failed to fetch build number blob")?;
        let content = blob.decode().wrap_err("failed to decode build number blob")?;
        let number: u64 = content
            .trim()
            .parse()
            .wrap_err_with(|| format!("build number blob {:?} is not an integer", content.trim()))?;
        Ok(Some(number + 1))
    }

    /// Conditionally advance the branch. Ok(false) means another writer
    /// moved it first; a transport error is treated the same way, since
    /// the next head poll resolves either outcome.
    async fn update_branch(&self, expected: &str, new_sha: &str) -> Result<bool> {
        match self
            .repo
            .update_branch(
                self.owner(),
                self.repo_name(),
                &self.project.config.branch,
                expected,
                new_sha,
            )
            .await
        {
            Ok(updated) => Ok(updated),
            Err(e) => {
                warn!(project = %self.project.name, error = %e, "Branch update failed");
                Ok(false)
            }
        }
    }

    /// Wait out the current retry delay, then double it (bounded)
    async fn backoff(&mut self) {
        warn!(
            project = %self.project.name,
            delay_ms = self.retry_delay.as_millis() as u64,
            "Lost the ref update race; backing off"
        );
        tokio::time::sleep(self.retry_delay).await;
        self.retry_delay = (self.retry_delay * 2).min(self.config.retry_cap());
    }

    /// Re-resolve the branch head after a lost race. A transient poll
    /// failure keeps the stale head; the next attempt backs off further.
    async fn refresh_head(&mut self) -> Result<()> {
        match self
            .repo
            .get_latest_commit_id(self.owner(), self.repo_name(), &self.project.config.branch)
            .await
        {
            Ok(Some(sha)) => {
                self.last_build_commit_id = Some(sha);
                Ok(())
            }
            Ok(None) => Err(eyre!(
                "branch {} of {} no longer exists",
                self.project.config.branch,
                self.project.config.repo_url
            )),
            Err(e) => {
                warn!(project = %self.project.name, error = %e, "Failed to refresh build repository head");
                Ok(())
            }
        }
    }

    /// Enqueue every configured build url
    async fn trigger_builds(&self) {
        for url in &self.project.config.build_urls {
            debug!(project = %self.project.name, %url, "Requesting build");
            self.triggers.enqueue(url).await;
        }
    }
}
