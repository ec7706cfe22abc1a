//! Chicory CLI
//!
//! Usage:
//!   chicory health
//!   chicory windows
//!   chicory execute --plan plan.json --dry-run
//!   chicory analyze --window 1234 --query "open the settings tab"

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod utils;

use crate::cli::Cli;

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Logging first: the local UTC offset can only be read while single-threaded.
    let _guard = utils::init_logging(cli.log_dir.as_deref())?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(commands::run(cli))
}
