//! CLI - Command-line argument parsing
//!
//! Keeps argument parsing separate from execution logic.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Launchpad CLI
#[derive(Parser, Debug)]
#[command(name = "launchpadctl")]
#[command(about = "Launchpad - cached tool runner with self-update", long_about = None)]
#[command(version = env!("LAUNCHPAD_VERSION"))]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Config file (overrides $LAUNCHPAD_CONFIG and the user config)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Skip the update check that normally runs first
    #[arg(long, global = true)]
    pub no_update: bool,

    /// Subcommand (if not provided, checks for updates then syncs)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Download every artifact, refreshing cached copies
    Sync,

    /// Run one artifact, fetching it first if needed
    Run {
        /// Label, repository path or local file name
        id: String,
    },

    /// Show the catalog and what is cached
    List,

    /// Run the configured automatic commands
    Auto,

    /// Check for a new version now
    Update,

    /// Print the local cache folder
    CacheDir,
}

impl Cli {
    /// Whether the startup update check runs before the command
    ///
    /// `update` runs its own check and `cache-dir` never touches the network.
    pub fn startup_check(&self, enabled_in_config: bool) -> bool {
        if self.no_update || !enabled_in_config {
            return false;
        }
        !matches!(self.command, Some(Commands::Update) | Some(Commands::CacheDir))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_no_subcommand() {
        let cli = parse(&["launchpadctl"]);
        assert!(cli.command.is_none());
        assert!(cli.startup_check(true));
        assert!(!cli.startup_check(false));
    }

    #[test]
    fn test_run_with_id() {
        let cli = parse(&["launchpadctl", "run", "Otimizar SSD.bat"]);
        assert_eq!(
            cli.command,
            Some(Commands::Run {
                id: "Otimizar SSD.bat".to_string()
            })
        );
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["launchpadctl", "sync", "--no-update", "--config", "/tmp/lp.toml"]);
        assert_eq!(cli.command, Some(Commands::Sync));
        assert!(cli.no_update);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/lp.toml")));
        assert!(!cli.startup_check(true));
    }

    #[test]
    fn test_update_and_cache_dir_skip_startup_check() {
        assert!(!parse(&["launchpadctl", "update"]).startup_check(true));
        assert!(!parse(&["launchpadctl", "cache-dir"]).startup_check(true));
        assert!(parse(&["launchpadctl", "list"]).startup_check(true));
    }

    #[test]
    fn test_run_requires_id() {
        assert!(Cli::try_parse_from(["launchpadctl", "run"]).is_err());
    }
}
