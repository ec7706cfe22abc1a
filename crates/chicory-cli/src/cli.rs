use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "chicory")]
#[command(about = "Chicory - drive application windows from a reasoning service's action plan")]
#[command(version)]
pub struct Cli {
    /// JSON config file; CHICORY_* environment variables override it
    #[arg(long, short = 'c', global = true, env = "CHICORY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Automation backend base URL (overrides config and environment)
    #[arg(long, global = true)]
    pub backend_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory for log files (default: <data dir>/chicory/logs)
    #[arg(long, global = true, env = "CHICORY_LOG_DIR")]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check that the automation backend is up
    Health,
    /// List capturable windows
    Windows,
    /// List displays
    Displays,
    /// Execute a saved plan document
    Execute(ExecuteArgs),
    /// Capture a window, ask the reasoning service what to do, and do it
    Analyze(AnalyzeArgs),
}

#[derive(Args, Debug)]
pub struct ExecuteArgs {
    /// Plan document: {"window": {...}, "response": {...}}
    #[arg(long, short = 'p')]
    pub plan: PathBuf,

    /// Resolve screen points only; send nothing to the backend
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct AnalyzeArgs {
    /// Window id as printed by `chicory windows`
    #[arg(long, short = 'w')]
    pub window: u32,

    /// What to do in the window
    #[arg(long, short = 'q')]
    pub query: String,

    /// Reasoning service endpoint (overrides config and environment)
    #[arg(long)]
    pub reasoning_url: Option<String>,
}
