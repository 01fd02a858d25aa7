//! Scout - runs test suites against deployment environments and alerts on failure

use clap::Parser;
use scout::common::logging;
use scout::{cli, commands::Commands};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "scout", about = "Run test suites per environment and alert on failures")]
#[command(version, long_about = None)]
struct Cli {
    /// Also append logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Settings may come from a local .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    logging::init(cli.command.verbose(), cli.log_file.as_deref());

    if let Err(e) = cli::dispatch(cli.command).await {
        if e.is_fatal() {
            tracing::error!(error = %e, "Configuration error, nothing was run");
        } else {
            tracing::error!(error = %e, "Fatal error, stopping");
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
