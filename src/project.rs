//! Build project definitions
//!
//! Projects are stored as JSON documents in the configuration
//! repository, one file per project. A project names a build repository
//! and either overrides branches for the submodules already present in
//! it, or declares the exact submodule set the repository must contain.

use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;
use thiserror::Error;

/// SSH-style remote url: `git@server:owner/repo.git`
static REPO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^git@(?P<server>[^:/]+):(?P<owner>[^/]+)/(?P<repo>.+)\.git$")
        .expect("repo url pattern")
});

/// Errors rejecting a project document
#[derive(Debug, Error)]
pub enum ProjectConfigError {
    #[error("repoUrl is required")]
    MissingRepoUrl,

    #[error("repoUrl {0:?} is not a git remote url")]
    BadRepoUrl(String),

    #[error("submoduleBranches and submodules are mutually exclusive")]
    ConflictingSubmoduleModes,

    #[error("declared submodule url {0:?} is not a git remote url")]
    BadSubmoduleUrl(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Server, owner, and repository name split out of a remote url
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RepoAddress {
    pub server: String,
    pub owner: String,
    pub repo: String,
}

impl RepoAddress {
    /// Split `git@server:owner/repo.git` into its parts
    pub fn parse(url: &str) -> Result<Self, ProjectConfigError> {
        let caps = REPO_URL
            .captures(url)
            .ok_or_else(|| ProjectConfigError::BadRepoUrl(url.to_string()))?;
        Ok(Self {
            server: caps["server"].to_string(),
            owner: caps["owner"].to_string(),
            repo: caps["repo"].to_string(),
        })
    }
}

/// A project document as written in the configuration repository
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BuildProjectConfig {
    /// Skip this project entirely
    pub disabled: bool,
    /// Remote url of the build repository
    pub repo_url: String,
    /// Branch of the build repository to watch and advance
    pub branch: String,
    /// Build jobs to trigger after each pinning commit
    pub build_urls: Vec<String>,
    /// Inferred mode: branch overrides keyed by submodule path
    pub submodule_branches: Option<HashMap<String, String>>,
    /// Declarative mode: the exact submodule set, url to branch
    pub submodules: Option<BTreeMap<String, String>>,
}

impl Default for BuildProjectConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            repo_url: String::new(),
            branch: "master".to_string(),
            build_urls: Vec::new(),
            submodule_branches: None,
            submodules: None,
        }
    }
}

/// A validated project ready to be watched
#[derive(Debug, Clone)]
pub struct BuildProject {
    /// Document file name without its `.json` extension
    pub name: String,
    pub config: BuildProjectConfig,
    /// Split form of `config.repo_url`
    pub address: RepoAddress,
}

impl BuildProject {
    /// Parse and validate one project document
    pub fn from_json(name: &str, json: &str) -> Result<Self, ProjectConfigError> {
        let config: BuildProjectConfig = serde_json::from_str(json)?;
        Self::from_config(name, config)
    }

    pub fn from_config(name: &str, config: BuildProjectConfig) -> Result<Self, ProjectConfigError> {
        if config.repo_url.is_empty() {
            return Err(ProjectConfigError::MissingRepoUrl);
        }
        let address = RepoAddress::parse(&config.repo_url)?;
        if config.submodule_branches.is_some() && config.submodules.is_some() {
            return Err(ProjectConfigError::ConflictingSubmoduleModes);
        }
        if let Some(submodules) = &config.submodules {
            for url in submodules.keys() {
                RepoAddress::parse(url)
                    .map_err(|_| ProjectConfigError::BadSubmoduleUrl(url.clone()))?;
            }
        }
        Ok(Self {
            name: name.to_string(),
            config,
            address,
        })
    }

    /// True when the document declares the submodule set instead of
    /// inferring it from the repository contents
    pub fn is_declarative(&self) -> bool {
        self.config.submodules.is_some()
    }

    /// Branch to track for a submodule in inferred mode
    pub fn branch_for(&self, path: &str) -> &str {
        self.config
            .submodule_branches
            .as_ref()
            .and_then(|overrides| overrides.get(path))
            .unwrap_or(&self.config.branch)
    }
}

/// Drop every project that shares a (repoUrl, branch) pair with another.
///
/// Two watchers advancing the same branch would race each other forever,
/// so both sides of a collision are rejected. Returns the survivors and
/// the rejected (name, repoUrl@branch) pairs.
pub fn reject_duplicates(projects: Vec<BuildProject>) -> (Vec<BuildProject>, Vec<(String, String)>) {
    let mut counts: HashMap<(String, String), usize> = HashMap::new();
    for project in &projects {
        let key = (project.config.repo_url.clone(), project.config.branch.clone());
        *counts.entry(key).or_default() += 1;
    }

    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    for project in projects {
        let key = (project.config.repo_url.clone(), project.config.branch.clone());
        if counts[&key] > 1 {
            rejected.push((project.name, format!("{}@{}", key.0, key.1)));
        } else {
            kept.push(project);
        }
    }
    (kept, rejected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_repo_address() {
        let address = RepoAddress::parse("git@git.example.com:build/deploy.git").unwrap();
        assert_eq!(address.server, "git.example.com");
        assert_eq!(address.owner, "build");
        assert_eq!(address.repo, "deploy");
    }

    #[test]
    fn test_parse_repo_address_rejects_other_shapes() {
        for bad in [
            "https://git.example.com/build/deploy.git",
            "git@git.example.com:build/deploy",
            "git@git.example.com/build/deploy.git",
            "",
        ] {
            assert!(RepoAddress::parse(bad).is_err(), "should reject {bad:?}");
        }
    }

    #[test]
    fn test_minimal_document_defaults() {
        let project =
            BuildProject::from_json("app", r#"{"repoUrl": "git@example.com:build/app.git"}"#)
                .unwrap();
        assert_eq!(project.name, "app");
        assert_eq!(project.config.branch, "master");
        assert!(!project.config.disabled);
        assert!(project.config.build_urls.is_empty());
        assert!(!project.is_declarative());
        assert_eq!(project.address.repo, "app");
    }

    #[test]
    fn test_missing_repo_url_rejected() {
        let result = BuildProject::from_json("app", r#"{"branch": "main"}"#);
        assert!(matches!(result, Err(ProjectConfigError::MissingRepoUrl)));
    }

    #[test]
    fn test_conflicting_modes_rejected() {
        let json = r#"{
            "repoUrl": "git@example.com:build/app.git",
            "submoduleBranches": {"lib": "dev"},
            "submodules": {"git@example.com:code/lib.git": "dev"}
        }"#;
        let result = BuildProject::from_json("app", json);
        assert!(matches!(
            result,
            Err(ProjectConfigError::ConflictingSubmoduleModes)
        ));
    }

    #[test]
    fn test_declared_submodule_urls_validated() {
        let json = r#"{
            "repoUrl": "git@example.com:build/app.git",
            "submodules": {"not-a-remote": "master"}
        }"#;
        let result = BuildProject::from_json("app", json);
        assert!(matches!(result, Err(ProjectConfigError::BadSubmoduleUrl(_))));
    }

    #[test]
    fn test_branch_for_uses_overrides() {
        let json = r#"{
            "repoUrl": "git@example.com:build/app.git",
            "branch": "main",
            "submoduleBranches": {"lib": "release-1.4"}
        }"#;
        let project = BuildProject::from_json("app", json).unwrap();
        assert_eq!(project.branch_for("lib"), "release-1.4");
        assert_eq!(project.branch_for("other"), "main");
    }

    #[test]
    fn test_reject_duplicates_drops_both_sides() {
        let make = |name: &str, branch: &str| {
            let config = BuildProjectConfig {
                repo_url: "git@example.com:build/app.git".to_string(),
                branch: branch.to_string(),
                ..Default::default()
            };
            BuildProject::from_config(name, config).unwrap()
        };
        let projects = vec![make("one", "master"), make("two", "master"), make("three", "dev")];

        let (kept, rejected) = reject_duplicates(projects);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].name, "three");
        assert_eq!(rejected.len(), 2);
        assert!(rejected.iter().all(|(_, key)| key.ends_with("@master")));
    }

    #[test]
    fn test_empty_declared_set_is_declarative() {
        let json = r#"{"repoUrl": "git@example.com:build/app.git", "submodules": {}}"#;
        let project = BuildProject::from_json("app", json).unwrap();
        assert!(project.is_declarative());
    }
}
