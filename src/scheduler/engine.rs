use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::process::Child;
use tracing::{debug, error, info, warn};

use crate::activity::{ActivityEvent, ActivityLog};
use crate::agent::AgentRegistry;
use crate::board::{detect_cycles, Board, StatusMarker, Task, TaskId};
use crate::config::{ProjectPaths, SchedulerConfig, WiggumConfig};
use crate::error::Result;
use crate::git::{GhRunner, GitRunner};
use crate::pool::{PoolEntry, WorkerPool};
use crate::proc::terminate_with_grace;
use crate::utils::epoch_now;
use crate::worker::{WorkerDir, WorkerKind, WorkerLifecycle, WorkerOutcome};

use super::claims::ClaimSet;
use super::score::{priority_score, AgingTracker, ScoreInputs};
use super::spawner::{ProcessSpawner, WorkerSpawner};

/// How far a failed board write pushes a task's skip counter; the counter
/// decays by one per tick.
const SKIP_BACKOFF: u32 = 3;

/// Outcome of one scheduler run, mapped to the CLI exit code.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub drained: bool,
    pub failed_tasks: usize,
    pub interrupted: bool,
}

/// Everything the pure ranking step needs besides the tasks themselves.
#[derive(Debug, Default)]
pub struct RankContext {
    pub ticks: HashMap<TaskId, u64>,
    pub plans: HashSet<TaskId>,
    pub dependents: HashMap<TaskId, usize>,
    pub active_prefixes: Vec<String>,
}

/// Order ready tasks by score, highest first; equal scores break
/// lexicographically by identifier.
pub fn rank_ready(ready: &[Task], ctx: &RankContext, config: &SchedulerConfig) -> Vec<TaskId> {
    let mut scored: Vec<(i64, &TaskId)> = ready
        .iter()
        .map(|task| {
            let inputs = ScoreInputs {
                ticks_ready: ctx.ticks.get(&task.id).copied().unwrap_or(0),
                has_plan: ctx.plans.contains(&task.id),
                dependent_count: ctx.dependents.get(&task.id).copied().unwrap_or(0),
                sibling_in_progress: ctx
                    .active_prefixes
                    .iter()
                    .any(|p| p == task.id.prefix()),
            };
            (priority_score(task, inputs, config), &task.id)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, id)| id.clone()).collect()
}

struct QueuedBoardUpdate {
    id: TaskId,
    observed: StatusMarker,
    to: StatusMarker,
}

/// The long-running control loop: reap exits, refresh the board, score and
/// spawn, follow up, age, terminate when drained. One cooperative thread;
/// all real work happens in worker child processes.
pub struct Scheduler {
    paths: ProjectPaths,
    config: WiggumConfig,
    board: Board,
    pool: WorkerPool,
    activity: ActivityLog,
    lifecycle: WorkerLifecycle,
    spawner: Arc<dyn WorkerSpawner>,
    aging: AgingTracker,
    skip_counters: HashMap<TaskId, u32>,
    fix_attempts: HashMap<TaskId, u32>,
    resolve_attempts: HashMap<TaskId, u32>,
    cyclic: HashSet<TaskId>,
    dead_reported: HashSet<TaskId>,
    children: HashMap<u32, Child>,
    claims: HashMap<u32, ClaimSet>,
    queued_updates: Vec<QueuedBoardUpdate>,
    failed_tasks: usize,
}

impl Scheduler {
    pub async fn new(
        paths: ProjectPaths,
        config: WiggumConfig,
        registry: AgentRegistry,
    ) -> Result<Self> {
        Self::with_spawner(paths, config, registry, Arc::new(ProcessSpawner)).await
    }

    /// Build a scheduler with a custom worker spawner; tests drive ticks
    /// against a recording spawner instead of forking processes.
    pub async fn with_spawner(
        paths: ProjectPaths,
        config: WiggumConfig,
        registry: AgentRegistry,
        spawner: Arc<dyn WorkerSpawner>,
    ) -> Result<Self> {
        let board = Board::new(&paths.kanban_path, paths.board_lock());
        let activity = ActivityLog::new(paths.activity_log());
        let lifecycle = WorkerLifecycle::new(paths.clone(), config.clone(), registry);
        let aging = AgingTracker::load(paths.aging_file()).await;

        Ok(Self {
            paths,
            config,
            board,
            pool: WorkerPool::new(),
            activity,
            lifecycle,
            spawner,
            aging,
            skip_counters: HashMap::new(),
            fix_attempts: HashMap::new(),
            resolve_attempts: HashMap::new(),
            cyclic: HashSet::new(),
            dead_reported: HashSet::new(),
            children: HashMap::new(),
            claims: HashMap::new(),
            queued_updates: Vec::new(),
            failed_tasks: 0,
        })
    }

    pub async fn run(&mut self) -> Result<RunSummary> {
        self.paths.ensure_dirs().await?;
        self.reconcile_orphans().await?;
        self.report_board_problems().await?;

        let tick_interval = Duration::from_millis(self.config.scheduler.tick_interval_ms);
        let mut interrupted = false;
        let mut shutdown_signal = Box::pin(tokio::signal::ctrl_c());

        loop {
            if self.tick().await? {
                break;
            }

            // Sleep out the tick boundary, waking early on shutdown.
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutdown signal received");
                    self.shutdown().await;
                    interrupted = true;
                    break;
                }
                _ = tokio::time::sleep(tick_interval) => {}
            }
        }

        if let Err(e) = self.aging.save().await {
            warn!(error = %e, "Failed to persist aging tracker");
        }

        let drained = !interrupted;
        info!(
            drained,
            failed_tasks = self.failed_tasks,
            "Scheduler finished"
        );

        Ok(RunSummary {
            drained,
            failed_tasks: self.failed_tasks,
            interrupted,
        })
    }

    /// Adopt live workers left behind by a previous scheduler process, and
    /// re-queue in-progress tasks that no live worker owns.
    async fn reconcile_orphans(&mut self) -> Result<()> {
        let adopted = self.pool.restore_from_disk(&self.paths.workers_dir).await?;
        if adopted > 0 {
            warn!(adopted, "Adopted live workers from a previous run");
        }

        let parsed = self.board.read().await?;

        // Rebuild claim predictions for adopted workers so the conflict
        // filter keeps holding.
        for entry in self.pool.snapshot() {
            if let Some(task) = parsed.task(&entry.task_id) {
                let plan = tokio::fs::read_to_string(self.paths.plan_doc(task.id.as_str()))
                    .await
                    .ok();
                self.claims
                    .insert(entry.pid, ClaimSet::predict(task, plan.as_deref()));
            }
        }

        // A crashed run can leave in-progress glyphs with no worker behind
        // them; put those tasks back in the queue.
        for task in &parsed.tasks {
            if task.marker == StatusMarker::InProgress && !self.pool.has_worker_for(&task.id, None)
            {
                warn!(task_id = %task.id, "In-progress task has no live worker; re-queueing");
                self.update_board(&task.id, StatusMarker::InProgress, StatusMarker::Pending)
                    .await;
            }
        }

        Ok(())
    }

    /// One-time validation pass: cycles are excluded permanently, unknown
    /// dependencies reported.
    async fn report_board_problems(&mut self) -> Result<()> {
        let parsed = self.board.read().await?;

        let report = detect_cycles(&parsed.tasks);
        if !report.is_empty() {
            self.cyclic = report.cyclic_ids();
            for id in &report.self_loops {
                warn!(task_id = %id, "Task depends on itself; skipped permanently");
            }
            for component in &report.components {
                let members: Vec<&str> = component.iter().map(|t| t.as_str()).collect();
                warn!(members = ?members, "Dependency cycle; members skipped permanently");
            }
            for id in &self.cyclic {
                self.activity
                    .emit(ActivityEvent::CycleDetected, id.as_str(), &[])
                    .await;
            }
        }

        for (task, dep) in parsed.validate_dependencies() {
            warn!(
                task_id = %task,
                dependency = %dep,
                "Dependency references an unknown task; task can never run"
            );
        }

        Ok(())
    }

    /// One scheduler tick: reap, refresh, score, spawn, age. Returns true
    /// when the board is drained. Public so tests can single-step the
    /// loop; `run` is the production driver.
    pub async fn tick(&mut self) -> Result<bool> {
        let mut scheduling_event = false;

        // 1. Reap exited workers.
        for entry in self.pool.snapshot() {
            if self.has_exited(&entry).await {
                self.reap(entry).await;
                scheduling_event = true;
            }
        }

        // Flush board writes that previously hit a concurrent edit.
        self.retry_queued_updates().await;

        // 2. Refresh the board view.
        let parsed = self.board.read().await?;
        let ready = Board::ready_of(&parsed);
        let pending: Vec<&Task> = parsed
            .tasks
            .iter()
            .filter(|t| t.marker == StatusMarker::Pending)
            .collect();

        let dead = self.dead_tasks(&parsed.tasks);
        for id in &dead {
            if self.dead_reported.insert(id.clone()) {
                warn!(task_id = %id, "Task is unschedulable (failed or unknown dependency)");
            }
        }

        // 7. Termination: nothing actionable left and nobody running.
        let actionable = pending
            .iter()
            .filter(|t| !self.cyclic.contains(&t.id) && !dead.contains(&t.id))
            .count();
        if actionable == 0 && self.pool.is_empty() && self.queued_updates.is_empty() {
            return Ok(true);
        }

        // 3. Score ready tasks.
        let candidates: Vec<Task> = ready
            .iter()
            .filter(|t| !self.cyclic.contains(&t.id))
            .cloned()
            .collect();
        let ranked = rank_ready(
            &candidates,
            &self.rank_context(&candidates, &pending).await,
            &self.config.scheduler,
        );

        // 4. Spawn in score order until capacity or filters stop us.
        // Feature affinity is a hard gate within a tick: once a prefix has
        // a live or just-spawned worker, its siblings wait for the reap.
        let mut busy_prefixes: HashSet<String> = self.pool.active_prefixes().into_iter().collect();
        let mut spawned: HashSet<TaskId> = HashSet::new();
        for id in ranked {
            if self.pool.count(None) >= self.config.scheduler.max_workers {
                break;
            }
            let Some(task) = candidates.iter().find(|t| t.id == id) else {
                continue;
            };
            if self.skip_counters.get(&id).copied().unwrap_or(0) > 0 {
                debug!(task_id = %id, "Skip counter active, deferring");
                continue;
            }
            if self.pool.has_worker_for(&id, None) {
                continue;
            }
            if busy_prefixes.contains(id.prefix()) {
                debug!(task_id = %id, "Sibling task in progress, deferring");
                continue;
            }

            let claims = self.predict_claims(task).await;
            if self.claims.values().any(|live| live.overlaps(&claims)) {
                debug!(task_id = %id, "Predicted file claims overlap a live worker, deferring");
                continue;
            }

            match self.spawn(task, WorkerKind::Main, claims).await {
                Ok(()) => {
                    busy_prefixes.insert(id.prefix().to_string());
                    spawned.insert(id);
                    scheduling_event = true;
                }
                Err(e) => {
                    error!(task_id = %id, error = %e, "Failed to spawn worker");
                    self.bump_skip(&id);
                }
            }
        }

        // 6. Aging: bump tasks that stayed ready through a scheduling event.
        if scheduling_event {
            let still_ready: Vec<TaskId> = candidates
                .iter()
                .map(|t| t.id.clone())
                .filter(|id| !spawned.contains(id))
                .collect();
            self.aging.increment(&still_ready);
            if let Err(e) = self.aging.save().await {
                warn!(error = %e, "Failed to persist aging tracker");
            }
        }

        // Skip counters decay every tick.
        self.skip_counters.retain(|_, count| {
            *count = count.saturating_sub(1);
            *count > 0
        });

        Ok(false)
    }

    async fn rank_context(&self, candidates: &[Task], pending: &[&Task]) -> RankContext {
        let mut dependents: HashMap<TaskId, usize> = HashMap::new();
        for task in pending {
            for dep in &task.dependencies {
                *dependents.entry(dep.clone()).or_insert(0) += 1;
            }
        }

        let mut plans = HashSet::new();
        for task in candidates {
            if self.paths.plan_doc(task.id.as_str()).exists() {
                plans.insert(task.id.clone());
            }
        }

        let ticks = candidates
            .iter()
            .map(|t| (t.id.clone(), self.aging.ticks(&t.id)))
            .collect();

        RankContext {
            ticks,
            plans,
            dependents,
            active_prefixes: self.pool.active_prefixes(),
        }
    }

    /// Pending tasks that can never become ready: a dependency failed, is
    /// unknown, is cyclic, or is itself dead. Computed to a fixpoint.
    fn dead_tasks(&self, tasks: &[Task]) -> HashSet<TaskId> {
        let known: HashSet<&TaskId> = tasks.iter().map(|t| &t.id).collect();
        let failed: HashSet<&TaskId> = tasks
            .iter()
            .filter(|t| t.marker == StatusMarker::Failed)
            .map(|t| &t.id)
            .collect();

        let mut dead: HashSet<TaskId> = HashSet::new();
        loop {
            let mut changed = false;
            for task in tasks {
                if task.marker != StatusMarker::Pending || dead.contains(&task.id) {
                    continue;
                }
                let doomed = task.dependencies.iter().any(|dep| {
                    !known.contains(dep)
                        || failed.contains(dep)
                        || self.cyclic.contains(dep)
                        || dead.contains(dep)
                });
                if doomed {
                    dead.insert(task.id.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }
        dead
    }

    async fn predict_claims(&self, task: &Task) -> ClaimSet {
        let plan = tokio::fs::read_to_string(self.paths.plan_doc(task.id.as_str()))
            .await
            .ok();
        ClaimSet::predict(task, plan.as_deref())
    }

    async fn has_exited(&mut self, entry: &PoolEntry) -> bool {
        if let Some(child) = self.children.get_mut(&entry.pid) {
            match child.try_wait() {
                Ok(Some(_)) => true,
                Ok(None) => false,
                Err(e) => {
                    warn!(pid = entry.pid, error = %e, "try_wait failed, assuming exit");
                    true
                }
            }
        } else {
            // Adopted worker; only PID liveness is available.
            !crate::proc::is_process_running(entry.pid)
        }
    }

    async fn spawn(&mut self, task: &Task, kind: WorkerKind, claims: ClaimSet) -> Result<()> {
        let epoch = epoch_now();
        let dir = WorkerDir::allocate(&self.paths.workers_dir, &task.id, kind, epoch);

        let spawned = self.spawner.spawn(&dir, &self.paths.root).await?;
        let pid = spawned.pid;

        info!(
            task_id = %task.id,
            kind = %kind,
            pid,
            worker = %dir.name(),
            "Worker spawned"
        );

        if let Some(child) = spawned.child {
            self.children.insert(pid, child);
        }
        self.claims.insert(pid, claims);
        self.pool.add(pid, kind, task.id.clone(), dir.clone());
        self.aging.remove(&task.id);

        self.activity
            .emit(
                ActivityEvent::WorkerSpawned,
                task.id.as_str(),
                &[
                    ("kind", json!(kind.to_string())),
                    ("pid", json!(pid)),
                    ("worker", json!(dir.name())),
                ],
            )
            .await;

        // Main workers flip pending -> in-progress; follow-up workers run
        // against a task that is already in progress.
        if kind == WorkerKind::Main {
            self.update_board(&task.id, StatusMarker::Pending, StatusMarker::InProgress)
                .await;
        }

        Ok(())
    }

    /// Post-exit processing for one worker: read its published result,
    /// clean up whatever the worker left behind, update the board, and
    /// decide follow-ups.
    async fn reap(&mut self, entry: PoolEntry) {
        self.children.remove(&entry.pid);
        self.claims.remove(&entry.pid);
        self.pool.remove(entry.pid);

        let result = entry.dir.read_result().await;

        // Crashed workers never got to remove their worktree.
        self.lifecycle.remove_worktree(&entry.dir).await;

        let outcome_label = match &result {
            Some(r) => format!("{:?}", r.outcome),
            None => "crashed".to_string(),
        };
        info!(
            task_id = %entry.task_id,
            kind = %entry.kind,
            outcome = %outcome_label,
            "Worker reaped"
        );
        self.activity
            .emit(
                ActivityEvent::WorkerReaped,
                entry.task_id.as_str(),
                &[
                    ("kind", json!(entry.kind.to_string())),
                    ("outcome", json!(outcome_label)),
                ],
            )
            .await;

        match result {
            Some(result) if result.outcome == WorkerOutcome::Success => {
                if self.config.git.auto_merge {
                    self.merge_or_resolve(&entry).await;
                } else {
                    self.update_board(&entry.task_id, StatusMarker::InProgress, StatusMarker::Done)
                        .await;
                }
            }
            Some(result) if result.outcome == WorkerOutcome::FixRequested => {
                let attempts = self
                    .fix_attempts
                    .get(&entry.task_id)
                    .copied()
                    .unwrap_or(0);
                let budget = self.config.scheduler.max_fix_retries;

                if !result.errors.is_empty()
                    && attempts < budget
                    && self.pool.count(None) < self.config.scheduler.max_workers
                {
                    info!(
                        task_id = %entry.task_id,
                        attempt = attempts + 1,
                        budget,
                        "Spawning fix worker"
                    );
                    self.fix_attempts.insert(entry.task_id.clone(), attempts + 1);

                    let task = self.board.get(&entry.task_id).await;
                    match task {
                        Ok(task) => {
                            let claims = self.predict_claims(&task).await;
                            if let Err(e) = self.spawn(&task, WorkerKind::Fix, claims).await {
                                error!(task_id = %entry.task_id, error = %e, "Fix worker spawn failed");
                                self.fail_task(&entry.task_id).await;
                            }
                        }
                        Err(e) => {
                            error!(task_id = %entry.task_id, error = %e, "Task lookup failed");
                            self.fail_task(&entry.task_id).await;
                        }
                    }
                } else {
                    debug!(task_id = %entry.task_id, "Fix budget exhausted");
                    self.fail_task(&entry.task_id).await;
                }
            }
            _ => {
                // Explicit failure, violation, or process death.
                self.fail_task(&entry.task_id).await;
            }
        }
    }

    /// Auto-merge path: trial-merge the worker's branch; a conflict spawns
    /// a resolve worker instead of completing the task.
    async fn merge_or_resolve(&mut self, entry: &PoolEntry) {
        let branch = entry.dir.branch_name(&self.config.git.branch_prefix);
        let git = GitRunner::new(&self.paths.root);

        match git.merge_would_conflict(&branch).await {
            Ok(false) => {
                let gh = GhRunner::new(&self.paths.root);
                if let Err(e) = gh.merge_pr(&branch).await {
                    warn!(branch = %branch, error = %e, "PR merge failed; branch left for manual merge");
                }
                self.update_board(&entry.task_id, StatusMarker::InProgress, StatusMarker::Done)
                    .await;
            }
            Ok(true) => {
                warn!(
                    task_id = %entry.task_id,
                    branch = %branch,
                    "Merge conflict against base; spawning resolve worker"
                );
                if self.pool.has_worker_for(&entry.task_id, Some(WorkerKind::Resolve)) {
                    return;
                }
                let attempts = self
                    .resolve_attempts
                    .get(&entry.task_id)
                    .copied()
                    .unwrap_or(0);
                if attempts >= self.config.scheduler.max_fix_retries {
                    error!(
                        task_id = %entry.task_id,
                        attempts,
                        "Conflict persisted through resolve attempts; failing task"
                    );
                    self.fail_task(&entry.task_id).await;
                    return;
                }
                self.resolve_attempts
                    .insert(entry.task_id.clone(), attempts + 1);

                if let Err(e) = entry
                    .dir
                    .write_git_state(&crate::worker::GitState {
                        needs_fix: false,
                        needs_resolve: true,
                    })
                    .await
                {
                    warn!(error = %e, "Failed to record needs_resolve marker");
                }

                match self.board.get(&entry.task_id).await {
                    Ok(task) => {
                        let claims = self.predict_claims(&task).await;
                        if let Err(e) = self.spawn(&task, WorkerKind::Resolve, claims).await {
                            error!(task_id = %entry.task_id, error = %e, "Resolve worker spawn failed");
                            self.fail_task(&entry.task_id).await;
                        }
                    }
                    Err(e) => {
                        error!(task_id = %entry.task_id, error = %e, "Task lookup failed");
                        self.fail_task(&entry.task_id).await;
                    }
                }
            }
            Err(e) => {
                warn!(branch = %branch, error = %e, "Trial merge failed; completing without merge");
                self.update_board(&entry.task_id, StatusMarker::InProgress, StatusMarker::Done)
                    .await;
            }
        }
    }

    async fn fail_task(&mut self, task_id: &TaskId) {
        self.failed_tasks += 1;
        self.update_board(task_id, StatusMarker::InProgress, StatusMarker::Failed)
            .await;
    }

    /// Board writes go through here so transient collisions feed the skip
    /// counter and get retried on later ticks.
    async fn update_board(&mut self, id: &TaskId, observed: StatusMarker, to: StatusMarker) {
        match self.board.set_status_checked(id, observed, to).await {
            Ok(()) => {}
            Err(e) if e.is_transient() => {
                warn!(task_id = %id, error = %e, "Board update collided; queued for retry");
                self.bump_skip(id);
                self.queued_updates.push(QueuedBoardUpdate {
                    id: id.clone(),
                    observed,
                    to,
                });
            }
            Err(e) => {
                error!(task_id = %id, error = %e, "Board update failed");
            }
        }
    }

    async fn retry_queued_updates(&mut self) {
        let queued = std::mem::take(&mut self.queued_updates);
        for update in queued {
            match self
                .board
                .set_status_checked(&update.id, update.observed, update.to)
                .await
            {
                Ok(()) => debug!(task_id = %update.id, "Queued board update applied"),
                Err(e) if e.is_transient() => {
                    self.bump_skip(&update.id);
                    self.queued_updates.push(update);
                }
                Err(e) => {
                    // A human moved the task; their edit wins.
                    warn!(task_id = %update.id, error = %e, "Dropping stale board update");
                }
            }
        }
    }

    fn bump_skip(&mut self, id: &TaskId) {
        *self.skip_counters.entry(id.clone()).or_insert(0) += SKIP_BACKOFF;
    }

    /// Signal-initiated shutdown: TERM every pool entry, grace, KILL, then
    /// reap whatever published a result.
    async fn shutdown(&mut self) {
        let grace = Duration::from_secs(self.config.scheduler.shutdown_grace_secs);
        let entries = self.pool.snapshot();

        for entry in &entries {
            terminate_with_grace(entry.pid, grace).await;
        }

        for entry in entries {
            self.reap(entry).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Priority;

    fn task(id: &str, priority: Priority, deps: &[&str]) -> Task {
        Task::new(id.parse().unwrap(), id)
            .with_priority(priority)
            .with_dependencies(deps.iter().map(|d| d.parse().unwrap()).collect())
    }

    #[test]
    fn rank_orders_by_score_then_id() {
        let config = SchedulerConfig::default();
        let ready = vec![
            task("BB-1", Priority::Medium, &[]),
            task("AA-1", Priority::Medium, &[]),
            task("CC-1", Priority::High, &[]),
        ];

        let ranked = rank_ready(&ready, &RankContext::default(), &config);
        let ids: Vec<&str> = ranked.iter().map(|t| t.as_str()).collect();
        assert_eq!(ids, vec!["CC-1", "AA-1", "BB-1"]);
    }

    #[test]
    fn sibling_penalty_defers_same_prefix() {
        let config = SchedulerConfig::default();
        let ready = vec![
            task("AUTH-2", Priority::High, &[]),
            task("UI-1", Priority::Low, &[]),
        ];
        let ctx = RankContext {
            active_prefixes: vec!["AUTH".to_string()],
            ..Default::default()
        };

        let ranked = rank_ready(&ready, &ctx, &config);
        assert_eq!(ranked[0].as_str(), "UI-1");
    }

    #[test]
    fn dependency_fanin_boosts_unblocking_work() {
        let config = SchedulerConfig::default();
        let ready = vec![
            task("AA-1", Priority::Medium, &[]),
            task("BB-1", Priority::High, &[]),
        ];
        let mut dependents = HashMap::new();
        dependents.insert("AA-1".parse().unwrap(), 3);

        let ranked = rank_ready(
            &ready,
            &RankContext {
                dependents,
                ..Default::default()
            },
            &config,
        );
        assert_eq!(ranked[0].as_str(), "AA-1");
    }
}
