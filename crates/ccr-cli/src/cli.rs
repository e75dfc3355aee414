use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ccr-syncer")]
#[command(about = "Replicate tables between two clusters")]
#[command(version)]
pub struct Cli {
    /// Path to the ccr.toml settings file
    #[arg(short, long, global = true, default_value = "ccr.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Parse and validate a job file
    Check {
        /// Job file (TOML)
        job: PathBuf,
    },

    /// Register a job in the job store
    Create {
        /// Job file (TOML)
        job: PathBuf,
    },

    /// Show the sync state of every job
    Status,

    /// Print a job's definition and progress as JSON
    Show {
        /// Job name
        name: String,
    },

    /// Delete a job and its progress
    Remove {
        /// Job name
        name: String,

        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_config_defaults_to_ccr_toml() {
        let cli = Cli::parse_from(["ccr-syncer", "status"]);
        assert_eq!(cli.config, PathBuf::from("ccr.toml"));
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_remove_flags() {
        let cli = Cli::parse_from(["ccr-syncer", "remove", "t1", "--yes", "-c", "/etc/ccr.toml"]);
        assert_eq!(cli.config, PathBuf::from("/etc/ccr.toml"));
        assert!(matches!(cli.command, Commands::Remove { ref name, yes: true } if name == "t1"));
    }
}
