//! Buildwatch configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main buildwatch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Repository hosting API access
    pub github: GitHubConfig,

    /// Where the project documents live
    pub configuration: ConfigRepo,

    /// Build server access
    #[serde(rename = "build-server")]
    pub build_server: BuildServerConfig,

    /// Polling and commit timing
    pub watch: WatchConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Checks that required environment variables and fields are set.
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.configuration.owner.is_empty() || self.configuration.repo.is_empty() {
            return Err(eyre::eyre!(
                "configuration.owner and configuration.repo must be set; \
                 there is nothing to watch without a configuration repository"
            ));
        }
        if std::env::var(&self.github.token_env).is_err() {
            return Err(eyre::eyre!(
                "API token not found. Set the {} environment variable.",
                self.github.token_env
            ));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(eyre::eyre!("watch.poll-interval-ms must be greater than zero"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: buildwatch.yml
        let local_config = PathBuf::from("buildwatch.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/buildwatch/buildwatch.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("buildwatch").join("buildwatch.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Repository hosting API access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// API base url; for GitHub Enterprise use `https://host/api/v3`
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Environment variable containing the API token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            token_env: "BUILDWATCH_GITHUB_TOKEN".to_string(),
            user_agent: concat!("buildwatch/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl GitHubConfig {
    /// API token from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env).ok().filter(|t| !t.is_empty())
    }
}

/// Location of the repository holding project documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigRepo {
    pub owner: String,
    pub repo: String,
    pub branch: String,
}

impl Default for ConfigRepo {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            branch: "master".to_string(),
        }
    }
}

/// Build server access
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildServerConfig {
    /// Basic-auth username; empty disables authentication
    pub username: String,

    /// Environment variable containing the API token
    #[serde(rename = "api-token-env")]
    pub api_token_env: String,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for BuildServerConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            api_token_env: "BUILDWATCH_BUILD_TOKEN".to_string(),
            timeout_ms: 30_000,
        }
    }
}

impl BuildServerConfig {
    /// API token from the configured environment variable, if set
    pub fn api_token(&self) -> Option<String> {
        std::env::var(&self.api_token_env).ok().filter(|t| !t.is_empty())
    }
}

/// Polling and commit timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// How often branch heads are polled
    #[serde(rename = "poll-interval-ms")]
    pub poll_interval_ms: u64,

    /// First retry delay after losing a ref update race
    #[serde(rename = "retry-floor-ms")]
    pub retry_floor_ms: u64,

    /// Retry delay ceiling; doubling stops here
    #[serde(rename = "retry-cap-ms")]
    pub retry_cap_ms: u64,

    /// Pause after a successful pinning commit
    #[serde(rename = "post-commit-pause-ms")]
    pub post_commit_pause_ms: u64,

    /// Pause after creating a missing branch before reading through it
    #[serde(rename = "branch-create-pause-ms")]
    pub branch_create_pause_ms: u64,

    /// Path of the build number file in the build repository root
    #[serde(rename = "build-number-path")]
    pub build_number_path: String,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            retry_floor_ms: 15_000,
            retry_cap_ms: 1_800_000,
            post_commit_pause_ms: 15_000,
            branch_create_pause_ms: 5_000,
            build_number_path: "BuildNumber.txt".to_string(),
        }
    }
}

impl WatchConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_floor(&self) -> Duration {
        Duration::from_millis(self.retry_floor_ms)
    }

    pub fn retry_cap(&self) -> Duration {
        Duration::from_millis(self.retry_cap_ms)
    }

    pub fn post_commit_pause(&self) -> Duration {
        Duration::from_millis(self.post_commit_pause_ms)
    }

    pub fn branch_create_pause(&self) -> Duration {
        Duration::from_millis(self.branch_create_pause_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.github.token_env, "BUILDWATCH_GITHUB_TOKEN");
        assert_eq!(config.configuration.branch, "master");
        assert_eq!(config.watch.poll_interval_ms, 5_000);
        assert_eq!(config.watch.retry_floor_ms, 15_000);
        assert_eq!(config.watch.retry_cap_ms, 1_800_000);
        assert_eq!(config.watch.build_number_path, "BuildNumber.txt");
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
github:
  api-base: "https://git.example.com/api/v3"
  token-env: "GHE_TOKEN"
  timeout-ms: 10000
configuration:
  owner: "build"
  repo: "watch-config"
  branch: "deploy"
build-server:
  username: "buildwatch"
watch:
  poll-interval-ms: 2000
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.github.api_base, "https://git.example.com/api/v3");
        assert_eq!(config.github.token_env, "GHE_TOKEN");
        assert_eq!(config.github.timeout_ms, 10_000);
        assert_eq!(config.configuration.owner, "build");
        assert_eq!(config.configuration.branch, "deploy");
        assert_eq!(config.build_server.username, "buildwatch");
        assert_eq!(config.watch.poll_interval_ms, 2_000);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
configuration:
  owner: "build"
  repo: "watch-config"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.configuration.owner, "build");
        assert_eq!(config.configuration.branch, "master");
        assert_eq!(config.github.api_base, "https://api.github.com");
        assert_eq!(config.watch.post_commit_pause_ms, 15_000);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("buildwatch.yml");
        std::fs::write(&path, "configuration:\n  owner: ops\n  repo: projects\n")
            .expect("Failed to write config");

        let config = Config::load(Some(&path)).expect("Failed to load config");
        assert_eq!(config.configuration.owner, "ops");
        assert_eq!(config.configuration.repo, "projects");
    }

    #[test]
    fn test_validate_requires_configuration_repo() {
        let config = Config::default();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("configuration.owner"));
    }

    #[test]
    fn test_validate_requires_token() {
        let mut config = Config::default();
        config.configuration.owner = "build".to_string();
        config.configuration.repo = "projects".to_string();
        config.github.token_env = "BUILDWATCH_TEST_TOKEN_UNSET_12345".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("BUILDWATCH_TEST_TOKEN_UNSET_12345"));
    }

    #[test]
    fn test_timing_helpers() {
        let watch = WatchConfig::default();
        assert_eq!(watch.poll_interval(), Duration::from_secs(5));
        assert_eq!(watch.retry_cap(), Duration::from_secs(1800));
    }
}
