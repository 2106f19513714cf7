//! Build repository watching
//!
//! [`ProjectWatcher`] is the per-project polling loop. [`gitmodules`]
//! parses and renders submodule definition blobs, and [`message`] shapes
//! the pinning commit messages.

pub mod gitmodules;
pub mod message;

mod project_watcher;

pub use project_watcher::{GITMODULES_PATH, ProjectWatcher, Submodule};
