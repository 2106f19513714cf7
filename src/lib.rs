//! Buildwatch - continuous integration trigger daemon
//!
//! Buildwatch watches build repositories that aggregate their upstream
//! repositories as git submodules. When an upstream branch moves, the
//! daemon writes a commit to the build repository pinning the submodules
//! to their new heads, then asks the build server to build it. All git
//! work happens through the hosting service's HTTP API; the daemon never
//! clones anything.
//!
//! # Core Concepts
//!
//! - **Projects as documents**: Each watched project is a JSON file in a
//!   configuration repository; editing that repository reconfigures the
//!   daemon within one polling interval
//! - **Optimistic concurrency**: Branch updates are non-forced ref
//!   updates; losing the race to another writer means back off, re-read,
//!   and re-apply the still-pending submodule updates
//! - **Batched pinning commits**: Upstream changes are held until a full
//!   polling interval passes with no further movement, so a burst of
//!   pushes produces one commit and one build
//!
//! # Modules
//!
//! - [`github`] - Git object-store HTTP API client
//! - [`project`] - Build project documents and validation
//! - [`watcher`] - Per-project polling and pinning commits
//! - [`trigger`] - Build trigger queue and Jenkins client
//! - [`overseer`] - Watcher supervision and configuration reloads
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod cli;
pub mod config;
pub mod github;
pub mod overseer;
pub mod project;
pub mod trigger;
pub mod watcher;

// Re-export commonly used types
pub use config::{BuildServerConfig, Config, ConfigRepo, GitHubConfig, WatchConfig};
pub use github::{GitHubClient, RepoClient, RepoError};
pub use overseer::Overseer;
pub use project::{BuildProject, BuildProjectConfig, ProjectConfigError, RepoAddress};
pub use trigger::{BuildTriggerQueue, JenkinsClient, TriggerClient, TriggerResponse};
pub use watcher::ProjectWatcher;
