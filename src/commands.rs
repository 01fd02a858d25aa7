//! CLI command definitions
//!
//! Defines the clap commands for the scout CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

/// Where to find environment, suite and runner settings
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// Environment definitions (default: $SCOUT_ENVIRONMENTS or environments.yml)
    #[arg(long, value_name = "FILE")]
    pub environments: Option<PathBuf>,

    /// Suite definitions (default: $SCOUT_SUITES or suites.yml)
    #[arg(long, value_name = "FILE")]
    pub suites: Option<PathBuf>,

    /// Runner settings TOML (default: platform config dir)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run suites against environments and alert on failures
    Run {
        /// Environment(s) to run against (default: all).
        /// Repeat or comma-separate: --env staging,prod
        #[arg(id = "env", long = "env", short = 'e', value_delimiter = ',')]
        environments: Vec<String>,

        /// Suite(s) to run (default: all)
        #[arg(id = "suite", long = "suite", short = 's', value_delimiter = ',')]
        suites: Vec<String>,

        /// Stream framework output live instead of capturing it
        #[arg(long, short)]
        verbose: bool,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// List configured environments and suites
    List {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Validate configuration and resolve each suite's test files
    Check {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

impl Commands {
    pub fn verbose(&self) -> bool {
        matches!(self, Commands::Run { verbose: true, .. })
    }
}
