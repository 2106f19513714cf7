//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Buildwatch - continuous integration trigger daemon
#[derive(Parser)]
#[command(
    name = "bw",
    about = "Watches build repositories and triggers builds when submodule upstreams change",
    version
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, help = "Enable verbose output")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Run the daemon in the foreground
    Run,

    /// Load the project documents once and report what would be watched
    Validate,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_no_command() {
        let cli = Cli::parse_from(["bw"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_cli_parse_run() {
        let cli = Cli::parse_from(["bw", "run"]);
        assert!(matches!(cli.command, Some(Command::Run)));
    }

    #[test]
    fn test_cli_parse_validate() {
        let cli = Cli::parse_from(["bw", "validate"]);
        assert!(matches!(cli.command, Some(Command::Validate)));
    }

    #[test]
    fn test_cli_with_config() {
        let cli = Cli::parse_from(["bw", "-c", "/path/to/buildwatch.yml", "run"]);
        assert_eq!(cli.config, Some(PathBuf::from("/path/to/buildwatch.yml")));
    }

    #[test]
    fn test_cli_verbose_flag_after_subcommand() {
        let cli = Cli::parse_from(["bw", "run", "--verbose"]);
        assert!(cli.verbose);
    }
}
