//! Repository API client trait
//!
//! Abstracts the git object-store HTTP API so watchers can be driven by
//! an in-memory implementation in tests.

use async_trait::async_trait;

use super::error::RepoError;
use super::types::{
    CommitComparison, FullCommit, GitBlob, GitCommit, GitTree, NewCommit, NewTree,
};

/// Read and write access to hosted git repositories.
///
/// Read methods that resolve refs return `Ok(None)` when the ref or
/// object does not exist; `Err` is reserved for transport and server
/// failures.
#[async_trait]
pub trait RepoClient: Send + Sync {
    /// Head commit sha of a branch, or `None` when the branch is absent
    async fn get_latest_commit_id(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<Option<String>, RepoError>;

    /// Fetch a raw commit object
    async fn get_commit(&self, owner: &str, repo: &str, sha: &str)
    -> Result<GitCommit, RepoError>;

    /// Fetch a tree object
    async fn get_tree(&self, owner: &str, repo: &str, sha: &str) -> Result<GitTree, RepoError>;

    /// Fetch a blob object
    async fn get_blob(&self, owner: &str, repo: &str, sha: &str) -> Result<GitBlob, RepoError>;

    /// Create a blob from text content, returning its sha
    async fn create_blob(&self, owner: &str, repo: &str, content: &str)
    -> Result<String, RepoError>;

    /// Create a tree, returning its sha
    async fn create_tree(&self, owner: &str, repo: &str, tree: &NewTree)
    -> Result<String, RepoError>;

    /// Create a commit, returning its sha
    async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        commit: &NewCommit,
    ) -> Result<String, RepoError>;

    /// Commits reachable from `head` but not `base`, oldest first.
    /// `Ok(None)` when either end is unknown to the server.
    async fn compare_commits(
        &self,
        owner: &str,
        repo: &str,
        base: &str,
        head: &str,
    ) -> Result<Option<CommitComparison>, RepoError>;

    /// A commit with the files it changed, or `None` when unknown
    async fn get_full_commit(
        &self,
        owner: &str,
        repo: &str,
        sha: &str,
    ) -> Result<Option<FullCommit>, RepoError>;

    /// Create a branch pointing at an existing commit
    async fn create_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), RepoError>;

    /// Fast-forward a branch from `expected_sha` to `new_sha`.
    ///
    /// Returns `Ok(false)` when the branch no longer points at
    /// `expected_sha`, meaning another writer won the race.
    async fn update_branch(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        expected_sha: &str,
        new_sha: &str,
    ) -> Result<bool, RepoError>;
}
