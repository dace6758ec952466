use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "wiggum")]
#[command(author, version, about = "Autonomous task orchestrator", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize wiggum in the current project
    Init,

    /// Run the scheduler until the board drains
    Run {
        /// Upper bound on concurrent workers
        #[arg(long, env = "WIGGUM_MAX_WORKERS")]
        max_workers: Option<usize>,
    },

    /// Show board and worker status
    Status,

    /// Remove finished worker directories and prune stale worktrees
    Clean,

    /// Internal: run one worker process against a worker directory
    #[command(hide = true)]
    Worker {
        /// The worker directory (created if absent)
        #[arg(long)]
        dir: PathBuf,

        /// Resume from an explicit step instead of the earliest missing one
        #[arg(long)]
        start_from: Option<String>,
    },

    /// Internal: violation monitor loop for one worker
    #[command(hide = true)]
    Monitor {
        /// The main project root
        #[arg(long)]
        project: PathBuf,

        /// The worker directory being monitored
        #[arg(long)]
        worker: PathBuf,

        /// Poll cadence in seconds
        #[arg(long, default_value = "30")]
        interval: u64,
    },
}
