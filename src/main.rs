use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use wiggum::agent::AgentRegistry;
use wiggum::board::Board;
use wiggum::cli::{Cli, Commands, Display};
use wiggum::config::{ProjectPaths, WiggumConfig};
use wiggum::error::{Result, WiggumError};
use wiggum::git::GitRunner;
use wiggum::pipeline::Pipeline;
use wiggum::pool::WorkerPool;
use wiggum::proc::is_process_running;
use wiggum::scheduler::Scheduler;
use wiggum::worker::{run_monitor, WorkerDir, WorkerLifecycle, WorkerOutcome};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            if is_environment_error(&e) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("wiggum=debug")
    } else {
        EnvFilter::new("wiggum=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

/// Environment and configuration problems exit with code 2; everything
/// else is an orchestration failure (code 1).
fn is_environment_error(error: &WiggumError) -> bool {
    matches!(
        error,
        WiggumError::Config(_)
            | WiggumError::NotInitialized
            | WiggumError::NotInGitRepo
            | WiggumError::Toml(_)
            | WiggumError::Pipeline(_)
            | WiggumError::UnknownAgent(_)
    )
}

async fn run(cli: Cli) -> Result<ExitCode> {
    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Run { max_workers } => cmd_run(max_workers).await,
        Commands::Status => cmd_status().await,
        Commands::Clean => cmd_clean().await,
        Commands::Worker { dir, start_from } => cmd_worker(dir, start_from).await,
        Commands::Monitor {
            project,
            worker,
            interval,
        } => {
            run_monitor(&project, &worker, Duration::from_secs(interval)).await?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn find_project_root() -> Result<PathBuf> {
    let current = std::env::current_dir()?;

    let mut path = current.as_path();
    loop {
        if path.join(".git").exists() {
            return Ok(path.to_path_buf());
        }
        path = path.parent().ok_or(WiggumError::NotInGitRepo)?;
    }
}

fn ensure_initialized(paths: &ProjectPaths) -> Result<()> {
    if !paths.ralph_dir.exists() {
        return Err(WiggumError::NotInitialized);
    }
    Ok(())
}

async fn load_project() -> Result<(ProjectPaths, WiggumConfig)> {
    let root = find_project_root()?;
    let paths = ProjectPaths::new(root);
    ensure_initialized(&paths)?;
    let config = WiggumConfig::load(&paths.ralph_dir).await?;
    Ok((paths, config))
}

const KANBAN_TEMPLATE: &str = "\
# Task board

<!-- wiggum only rewrites the status glyphs; everything else is yours. -->
<!-- Glyphs: [ ] pending, [=] in progress, [x] done, [*] failed, [P] pending approval -->

## TASKS
";

async fn cmd_init() -> Result<ExitCode> {
    let display = Display::new();
    let root = find_project_root()?;
    let paths = ProjectPaths::new(root);

    if paths.ralph_dir.exists() {
        display.print_warning("wiggum is already initialized in this project.");
        return Ok(ExitCode::SUCCESS);
    }

    paths.ensure_dirs().await?;

    let config = WiggumConfig::default();
    config.save(&paths.ralph_dir).await?;

    if !paths.kanban_path.exists() {
        tokio::fs::write(&paths.kanban_path, KANBAN_TEMPLATE).await?;
    }

    let pipeline_path = paths.pipeline_file(&config);
    if !pipeline_path.exists() {
        let pipeline = Pipeline::builtin_default();
        tokio::fs::write(&pipeline_path, serde_json::to_string_pretty(&pipeline)?).await?;
    }

    display.print_success("Initialized wiggum.");
    display.print_info(&format!(
        "Board:    {}",
        paths.kanban_path.display()
    ));
    display.print_info(&format!(
        "Config:   {}",
        paths.ralph_dir.join("config.toml").display()
    ));
    display.print_info(&format!("Pipeline: {}", pipeline_path.display()));
    display.print_info("Add [agents.agents.<type>] entries to config.toml before running.");

    Ok(ExitCode::SUCCESS)
}

async fn cmd_run(max_workers: Option<usize>) -> Result<ExitCode> {
    let display = Display::new();
    let (paths, mut config) = load_project().await?;

    if let Some(n) = max_workers {
        config.scheduler.max_workers = n;
    }
    config.validate()?;

    // Surface missing agent bindings before any worker spawns.
    let pipeline = Pipeline::load_or_default(&paths.pipeline_file(&config)).await?;
    let registry = AgentRegistry::from_config(&config.agents);
    registry.check_types(pipeline.agent_types())?;

    let mut scheduler = Scheduler::new(paths, config, registry).await?;
    let summary = scheduler.run().await?;

    if summary.drained && summary.failed_tasks == 0 {
        display.print_success("All tasks drained.");
        Ok(ExitCode::SUCCESS)
    } else {
        if summary.interrupted {
            display.print_warning("Run interrupted before the board drained.");
        }
        if summary.failed_tasks > 0 {
            display.print_error(&format!("{} task(s) failed.", summary.failed_tasks));
        }
        Ok(ExitCode::FAILURE)
    }
}

async fn cmd_status() -> Result<ExitCode> {
    let display = Display::new();
    let (paths, _config) = load_project().await?;

    let board = Board::new(&paths.kanban_path, paths.board_lock());
    let counts = board.counts().await?;

    display.print_header("Wiggum Status");
    display.print_counts(&counts);

    let tasks = board.list(None).await?;
    if !tasks.is_empty() {
        println!();
        for task in &tasks {
            display.print_task_row(task);
        }
    }

    let pool = WorkerPool::new();
    pool.restore_from_disk(&paths.workers_dir).await?;
    let workers = pool.snapshot();
    if !workers.is_empty() {
        println!();
        display.print_info(&format!("{} live worker(s):", workers.len()));
        for entry in &workers {
            display.print_worker_row(entry);
        }
    }

    Ok(ExitCode::SUCCESS)
}

async fn cmd_clean() -> Result<ExitCode> {
    let display = Display::new();
    let (paths, config) = load_project().await?;

    let lifecycle = WorkerLifecycle::new(paths.clone(), config.clone(), AgentRegistry::new());

    let mut removed = 0;
    if paths.workers_dir.exists() {
        let mut entries = tokio::fs::read_dir(&paths.workers_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let Some(dir) = WorkerDir::parse(&entry.path()) else {
                continue;
            };

            // Never touch a directory whose worker is still alive.
            if let Some(pid) = dir.read_pid().await {
                if is_process_running(pid) {
                    display.print_info(&format!("{} still running, keeping", dir.name()));
                    continue;
                }
            }

            lifecycle.remove_worktree(&dir).await;
            tokio::fs::remove_dir_all(dir.path()).await?;
            removed += 1;
        }
    }

    GitRunner::new(&paths.root).worktree_prune().await?;

    display.print_success(&format!("Removed {} finished worker directories.", removed));
    Ok(ExitCode::SUCCESS)
}

/// Hidden worker-process entrypoint: everything around one task attempt.
async fn cmd_worker(dir: PathBuf, start_from: Option<String>) -> Result<ExitCode> {
    let root = find_project_root()?;
    let paths = ProjectPaths::new(root);
    ensure_initialized(&paths)?;
    let config = WiggumConfig::load(&paths.ralph_dir).await?;

    let worker = WorkerDir::parse(&dir).ok_or_else(|| {
        WiggumError::WorkerDir(format!("not a worker directory name: {}", dir.display()))
    })?;

    let registry = AgentRegistry::from_config(&config.agents);
    let lifecycle = WorkerLifecycle::new(paths, config, registry);

    let result = lifecycle.execute(&worker, start_from.as_deref()).await?;

    Ok(match result.outcome {
        WorkerOutcome::Success => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
