use std::path::Path;
use std::time::Duration;

use serde_json::json;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::activity::{ActivityEvent, ActivityLog};
use crate::config::ProjectPaths;
use crate::error::Result;
use crate::git::GitRunner;

use super::layout::WorkerDir;

/// Spawn the violation monitor as a background child of the worker
/// process, re-invoking this binary's hidden `monitor` subcommand.
pub fn spawn_monitor(
    project_dir: &Path,
    worker_dir: &WorkerDir,
    interval_secs: u64,
) -> Result<Child> {
    let exe = std::env::current_exe()?;
    let child = Command::new(exe)
        .arg("monitor")
        .arg("--project")
        .arg(project_dir)
        .arg("--worker")
        .arg(worker_dir.path())
        .arg("--interval")
        .arg(interval_secs.to_string())
        .kill_on_drop(true)
        .spawn()?;

    debug!(
        pid = ?child.id(),
        worker = %worker_dir.name(),
        "Violation monitor started"
    );
    Ok(child)
}

/// The monitor loop itself. Periodically inspects the *main* checkout for
/// uncommitted changes outside the orchestrator's metadata directory;
/// anything found means an agent escaped its worktree. Exits when the
/// worker directory disappears.
pub async fn run_monitor(project_dir: &Path, worker_path: &Path, interval: Duration) -> Result<()> {
    let Some(worker) = WorkerDir::parse(worker_path) else {
        return Err(crate::error::WiggumError::WorkerDir(format!(
            "not a worker directory: {}",
            worker_path.display()
        )));
    };

    let git = GitRunner::new(project_dir);
    let paths = ProjectPaths::new(project_dir.to_path_buf());
    let activity = ActivityLog::new(paths.activity_log());

    info!(
        worker = %worker.name(),
        interval_secs = interval.as_secs(),
        "Monitoring main checkout for boundary violations"
    );

    loop {
        if !worker.path().exists() {
            debug!(worker = %worker.name(), "Worker directory gone, monitor exiting");
            return Ok(());
        }

        // A crashed worker leaves its directory behind; follow its PID so
        // the monitor never outlives it.
        if let Some(pid) = worker.read_pid().await {
            if !crate::proc::is_process_running(pid) {
                debug!(worker = %worker.name(), pid, "Worker process gone, monitor exiting");
                return Ok(());
            }
        }

        match git.status_porcelain().await {
            Ok(lines) => {
                let violations: Vec<String> = lines
                    .iter()
                    .filter_map(|line| porcelain_path(line))
                    .filter(|path| !is_metadata_path(path))
                    .map(str::to_string)
                    .collect();

                if !violations.is_empty() {
                    record_violations(&worker, &activity, &violations).await;
                }
            }
            Err(e) => warn!(error = %e, "Violation check failed"),
        }

        tokio::time::sleep(interval).await;
    }
}

/// Extract the path from one `git status --porcelain` line.
fn porcelain_path(line: &str) -> Option<&str> {
    if line.len() < 4 {
        return None;
    }
    let path = line[3..].trim();
    // Renames report "old -> new"; the write landed at the new path.
    let path = path.rsplit(" -> ").next().unwrap_or(path);
    let path = path.trim_matches('"');
    if path.is_empty() {
        None
    } else {
        Some(path)
    }
}

fn is_metadata_path(path: &str) -> bool {
    path == ".ralph" || path.starts_with(".ralph/")
}

async fn record_violations(worker: &WorkerDir, activity: &ActivityLog, paths: &[String]) {
    warn!(
        worker = %worker.name(),
        count = paths.len(),
        "Uncommitted changes outside the worktree"
    );

    let record = json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "paths": paths,
    });
    match fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(worker.violations_log())
        .await
    {
        Ok(mut file) => {
            let _ = file.write_all(format!("{}\n", record).as_bytes()).await;
        }
        Err(e) => warn!(error = %e, "Failed to append violation record"),
    }

    // The sentinel converts the worker outcome to failure at cleanup.
    if let Err(e) = fs::write(worker.violation_flag(), "boundary violation\n").await {
        warn!(error = %e, "Failed to write violation sentinel");
    }

    activity
        .emit(
            ActivityEvent::ViolationDetected,
            worker.task_id.as_str(),
            &[("paths", json!(paths))],
        )
        .await;
}
