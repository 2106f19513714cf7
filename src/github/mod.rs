//! Hosted-git repository access
//!
//! Everything the daemon knows about remote repositories goes through
//! the [`RepoClient`] trait: branch head lookups, raw object reads, and
//! the blob/tree/commit/ref writes that synthesize pinning commits.
//! [`GitHubClient`] is the production implementation.

mod client;
mod error;
mod http;
mod types;

pub use client::RepoClient;
pub use error::RepoError;
pub use http::GitHubClient;
pub use types::{
    ChangedFile, CommitComparison, CommitDetail, ComparisonCommit, FullCommit, GitActor, GitBlob,
    GitCommit, GitRef, GitTree, MODE_FILE, MODE_GITLINK, NewBlob, NewCommit, NewTree, ObjectRef,
    TYPE_BLOB, TYPE_COMMIT, TreeEntry,
};

#[cfg(test)]
pub use client::mock;
