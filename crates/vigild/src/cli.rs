//! CLI argument definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vigil_core::CONFIG_ENV;

#[derive(Parser)]
#[command(name = "vigild")]
#[command(version, about = "Keeps services alive, records host metrics and syncs the API catalogue")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file (default: vigil.toml / vigil.yaml / vigil.json in the working directory)
    #[arg(short, long, env = CONFIG_ENV, global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output in JSON format instead of tables
    #[arg(long, global = true)]
    pub json: bool,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run supervisor, metrics collector and catalogue sync (default)
    Run,

    /// Run only the service supervisor
    Supervise,

    /// Run only the metrics collector
    Monitor,

    /// Run only the catalogue sync
    Sync {
        /// Run a single fetch-and-store cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Create the database and its tables
    InitDb,

    /// Probe every configured service once and print the result
    Status,
}

impl Cli {
    pub fn command(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_run() {
        let cli = Cli::parse_from(["vigild"]);
        assert_eq!(cli.command(), Commands::Run);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["vigild", "sync", "--once", "-vv", "--config", "/etc/vigil.toml"]);
        assert_eq!(cli.command(), Commands::Sync { once: true });
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/vigil.toml")));
    }

    #[test]
    fn test_init_db_subcommand() {
        let cli = Cli::parse_from(["vigild", "init-db"]);
        assert_eq!(cli.command(), Commands::InitDb);
    }
}
