use std::time::Duration;

use tokio::fs;
use tracing::{debug, error, info, warn};

use crate::activity::ActivityLog;
use crate::agent::AgentRegistry;
use crate::board::{Board, Task};
use crate::config::{ProjectPaths, WiggumConfig};
use crate::error::{Result, WiggumError};
use crate::git::{GhRunner, GitRunner};
use crate::pipeline::{Pipeline, PipelineReport, PipelineRunner};

use super::batch::{BatchContext, BatchCoordinator};
use super::layout::{self, GitState, WorkerDir, WorkerKind, WorkerOutcome, WorkerResult};
use super::monitor::spawn_monitor;

const PUBLISH_ATTEMPTS: u32 = 3;

/// Everything that happens inside one worker process: workspace creation,
/// the pipeline run, and result finalization. The scheduler only spawns
/// the process and reaps its published result.
pub struct WorkerLifecycle {
    paths: ProjectPaths,
    config: WiggumConfig,
    registry: AgentRegistry,
    activity: ActivityLog,
}

impl WorkerLifecycle {
    pub fn new(paths: ProjectPaths, config: WiggumConfig, registry: AgentRegistry) -> Self {
        let activity = ActivityLog::new(paths.activity_log());
        Self {
            paths,
            config,
            registry,
            activity,
        }
    }

    /// Entry point of the worker child process. Always publishes a
    /// `result.json` before returning, success or not.
    pub async fn execute(
        &self,
        dir: &WorkerDir,
        start_from: Option<&str>,
    ) -> Result<WorkerResult> {
        let board = Board::new(&self.paths.kanban_path, self.paths.board_lock());
        let task = board.get(&dir.task_id).await?;

        self.create(dir, &task).await?;

        let mut monitor = match spawn_monitor(
            &self.paths.root,
            dir,
            self.config.monitor.interval_secs,
        ) {
            Ok(child) => Some(child),
            Err(e) => {
                warn!(error = %e, "Violation monitor failed to start");
                None
            }
        };

        let run = self.run_pipeline(dir, start_from).await;

        if let Some(child) = monitor.as_mut() {
            let _ = child.kill().await;
        }

        let result = self.finalize(dir, &task, run).await?;
        Ok(result)
    }

    /// Create the isolated workspace: directory skeleton, worktree pinned
    /// to the base branch, per-task requirements file, PID file. Idempotent
    /// so a resumed worker can re-enter its own directory.
    pub async fn create(&self, dir: &WorkerDir, task: &Task) -> Result<()> {
        if !dir.path().exists() {
            layout::create_layout(dir).await?;
        }

        dir.write_pid(std::process::id()).await?;

        if !dir.workspace().exists() {
            let branch = dir.branch_name(&self.config.git.branch_prefix);
            GitRunner::new(&self.paths.root)
                .worktree_add(&dir.workspace(), &branch, &self.config.git.base_branch)
                .await?;
            info!(
                worker = %dir.name(),
                branch = %branch,
                "Worktree created"
            );
        }

        if !dir.prd().exists() {
            fs::write(dir.prd(), self.render_prd(dir, task)).await?;
        }

        dir.log_phase("created", &dir.name()).await?;
        Ok(())
    }

    fn render_prd(&self, dir: &WorkerDir, task: &Task) -> String {
        let mut out = format!("# {}: {}\n\n", task.id, task.title);

        if !task.description.is_empty() {
            out.push_str(&format!("## Description\n\n{}\n\n", task.description));
        }

        if !task.scope.is_empty() {
            out.push_str("## Scope\n\n");
            for item in &task.scope {
                out.push_str(&format!("- {}\n", item));
            }
            out.push('\n');
        }

        if !task.acceptance_criteria.is_empty() {
            out.push_str("## Acceptance Criteria\n\n");
            for item in &task.acceptance_criteria {
                out.push_str(&format!("- [ ] {}\n", item));
            }
            out.push('\n');
        }

        match dir.kind {
            WorkerKind::Fix => {
                out.push_str(
                    "## Fix Pass\n\nA previous attempt reported fixable errors; \
                     address them and bring every step back to PASS.\n",
                );
            }
            WorkerKind::Resolve => {
                out.push_str(&format!(
                    "## Conflict Resolution\n\nThe branch for this task conflicts with \
                     `{}`. Merge the current base into the branch and resolve every \
                     conflict before re-running the pipeline.\n",
                    self.config.git.base_branch
                ));
            }
            WorkerKind::Main => {}
        }

        out
    }

    async fn run_pipeline(
        &self,
        dir: &WorkerDir,
        start_from: Option<&str>,
    ) -> Result<PipelineReport> {
        let batch = self.join_batch(dir).await?;

        dir.log_phase("pipeline.start", "").await?;

        let pipeline =
            Pipeline::load_or_default(&self.paths.pipeline_file(&self.config)).await?;
        let runner = PipelineRunner::new(
            pipeline,
            self.registry.clone(),
            self.activity.clone(),
            &self.paths.root,
            Duration::from_secs(self.config.pipeline.step_timeout_secs),
            self.config.pipeline.max_agent_turns,
        )?;

        let report = runner.run_all(dir, start_from).await;

        if let Some(coordinator) = &batch {
            match &report {
                Ok(r) if r.is_success() => coordinator.advance(&dir.task_id).await?,
                _ => coordinator.fail(&dir.task_id).await?,
            }
        }

        report
    }

    /// Block until the batch position reaches this task, when the worker
    /// carries a batch context.
    async fn join_batch(&self, dir: &WorkerDir) -> Result<Option<BatchCoordinator>> {
        let context_path = dir.batch_context();
        if !context_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&context_path).await?;
        let context: BatchContext = serde_json::from_str(&content)?;
        let coordinator = BatchCoordinator::new(
            self.paths.batch_record(&context.batch_id),
            Duration::from_millis(self.config.batch.poll_interval_ms),
        );

        debug!(batch_id = %context.batch_id, task_id = %dir.task_id, "Joining batch");
        coordinator.wait_for_turn(&dir.task_id).await?;
        Ok(Some(coordinator))
    }

    /// Compute the final outcome from the pipeline report and the
    /// violation sentinel, publish `result.json` and `git-state.json`, and
    /// remove the worktree.
    async fn finalize(
        &self,
        dir: &WorkerDir,
        task: &Task,
        run: Result<PipelineReport>,
    ) -> Result<WorkerResult> {
        let violation = dir.violation_flag().exists();

        let mut result = match run {
            Ok(report) if violation => {
                error!(
                    worker = %dir.name(),
                    "Boundary violation recorded; outcome forced to failed"
                );
                let mut failed = WorkerResult::failed(
                    dir.task_id.clone(),
                    report.failed_step(),
                    vec!["workspace boundary violation".to_string()],
                );
                failed.violation = true;
                failed
            }
            Ok(report) if report.is_success() => {
                match self.publish(dir, task).await {
                    Ok(pr_url) => WorkerResult::success(dir.task_id.clone(), pr_url),
                    Err(e) => WorkerResult::failed(
                        dir.task_id.clone(),
                        None,
                        vec![format!("publish failed: {}", e)],
                    ),
                }
            }
            Ok(report) if report.fix_requested() => WorkerResult {
                task_id: dir.task_id.clone(),
                outcome: WorkerOutcome::FixRequested,
                failed_step: report.failed_step(),
                errors: report.step_errors(),
                pr_url: None,
                violation: false,
            },
            Ok(report) => WorkerResult::failed(
                dir.task_id.clone(),
                report.failed_step(),
                report.step_errors(),
            ),
            Err(e) => WorkerResult::failed(dir.task_id.clone(), None, vec![e.to_string()]),
        };
        result.violation = result.violation || violation;

        dir.write_result(&result).await?;
        dir.write_git_state(&GitState {
            needs_fix: result.outcome == WorkerOutcome::FixRequested,
            needs_resolve: false,
        })
        .await?;

        self.remove_worktree(dir).await;
        dir.log_phase("finalized", &format!("{:?}", result.outcome)).await?;

        Ok(result)
    }

    /// Push the branch and open a PR. Transient hosting failures are
    /// retried with backoff before giving up.
    async fn publish(&self, dir: &WorkerDir, task: &Task) -> Result<Option<String>> {
        let branch = dir.branch_name(&self.config.git.branch_prefix);
        let git = GitRunner::new(&self.paths.root);
        let gh = GhRunner::new(&self.paths.root);

        let title = format!("[{}] {}", task.id, task.title);
        let body = format!(
            "## {}\n\n{}\n\n---\nAutomated by wiggum",
            task.id, task.description
        );

        let mut delay = Duration::from_secs(2);
        let mut last_error = None;
        for attempt in 1..=PUBLISH_ATTEMPTS {
            let outcome = async {
                git.push(&self.config.git.remote, &branch).await?;
                gh.create_pr(&branch, &title, &body).await
            }
            .await;

            match outcome {
                Ok(url) => {
                    fs::write(dir.pr_url_file(), &url).await?;
                    info!(url = %url, "Pull request created");
                    return Ok(Some(url));
                }
                Err(e) => {
                    warn!(attempt, error = %e, "Publish attempt failed");
                    last_error = Some(e);
                    if attempt < PUBLISH_ATTEMPTS {
                        tokio::time::sleep(delay).await;
                        delay *= 2;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| WiggumError::Other("publish failed".into())))
    }

    /// Force-remove the worktree, falling back to a plain directory delete
    /// when git refuses.
    pub async fn remove_worktree(&self, dir: &WorkerDir) {
        let workspace = dir.workspace();
        if !workspace.exists() {
            return;
        }

        let git = GitRunner::new(&self.paths.root);
        if let Err(e) = git.worktree_remove(&workspace).await {
            debug!(error = %e, "Worktree remove failed, deleting directory");
            if let Err(e) = fs::remove_dir_all(&workspace).await {
                warn!(path = %workspace.display(), error = %e, "Force remove failed");
            }
            let _ = git.worktree_prune().await;
        }
    }
}
