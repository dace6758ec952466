use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::activity::{ActivityEvent, ActivityLog};
use crate::agent::{AgentRegistry, StepContext};
use crate::error::{Result, WiggumError};
use crate::git::GitRunner;
use crate::utils::{epoch_now, write_atomic};
use crate::worker::WorkerDir;

use super::definition::{Pipeline, Step};
use super::result::{GateResult, ResultStore, StepResult};

/// Agent type consulted before a resume to pick the starting step.
const RESUME_AGENT: &str = "resume-decide";

/// Per-step progress through the runner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepState {
    NotStarted,
    GatedOut,
    DepBlocked,
    Retrying,
    Completed(GateResult),
}

#[derive(Debug, Clone)]
pub struct StepRun {
    pub id: String,
    pub state: StepState,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    CompletedAll,
    HaltedBlocking { step: String },
    HaltedByAgent { step: String },
    Aborted,
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: PipelineOutcome,
    pub steps: Vec<StepRun>,
}

impl PipelineReport {
    /// A halted-by-agent pipeline is a deliberate early finish, not a
    /// failure.
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            PipelineOutcome::CompletedAll | PipelineOutcome::HaltedByAgent { .. }
        )
    }

    /// The last step that completed with a non-SKIP gate.
    pub fn last_gate(&self) -> Option<(&str, GateResult)> {
        self.steps.iter().rev().find_map(|run| match run.state {
            StepState::Completed(gate) if gate != GateResult::Skip => {
                Some((run.id.as_str(), gate))
            }
            _ => None,
        })
    }

    /// Whether a FIX gate survived its retry budget; the scheduler may
    /// spawn a fix worker off this.
    pub fn fix_requested(&self) -> bool {
        self.steps
            .iter()
            .any(|run| run.state == StepState::Completed(GateResult::Fix))
    }

    pub fn step_errors(&self) -> Vec<String> {
        self.steps.iter().flat_map(|run| run.errors.clone()).collect()
    }

    pub fn failed_step(&self) -> Option<String> {
        match &self.outcome {
            PipelineOutcome::HaltedBlocking { step } => Some(step.clone()),
            _ => None,
        }
    }
}

/// Drives one worker through the pipeline's steps in file order.
pub struct PipelineRunner {
    pipeline: Pipeline,
    registry: AgentRegistry,
    activity: ActivityLog,
    project_dir: PathBuf,
    step_timeout: Duration,
    max_turns: u32,
}

impl PipelineRunner {
    pub fn new(
        pipeline: Pipeline,
        registry: AgentRegistry,
        activity: ActivityLog,
        project_dir: impl Into<PathBuf>,
        step_timeout: Duration,
        max_turns: u32,
    ) -> Result<Self> {
        pipeline.validate()?;
        registry.check_types(pipeline.agent_types())?;
        Ok(Self {
            pipeline,
            registry,
            activity,
            project_dir: project_dir.into(),
            step_timeout,
            max_turns,
        })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Run every step from `start_from` (an explicit identifier, or the
    /// earliest step without a persisted result) to the end.
    pub async fn run_all(
        &self,
        worker: &WorkerDir,
        start_from: Option<&str>,
    ) -> Result<PipelineReport> {
        let store = ResultStore::new(worker.results_dir());
        let task_id = worker.task_id.to_string();

        let start_idx = match self.resolve_start(worker, &store, start_from).await? {
            StartDecision::From(idx) => idx,
            StartDecision::Abort => {
                warn!(task_id = %task_id, "Resume agent aborted the pipeline");
                return Ok(PipelineReport {
                    outcome: PipelineOutcome::Aborted,
                    steps: Vec::new(),
                });
            }
        };

        let mut steps: Vec<StepRun> = self
            .pipeline
            .steps
            .iter()
            .map(|s| StepRun {
                id: s.id.clone(),
                state: StepState::NotStarted,
                errors: Vec::new(),
            })
            .collect();

        for (idx, step) in self.pipeline.steps.iter().enumerate() {
            if idx < start_idx {
                // Already ran in a previous attempt; reflect the persisted
                // gate so downstream dependency checks and the report agree.
                if let Some((_, prior)) = store.latest(&step.id).await {
                    steps[idx].state = StepState::Completed(prior.gate_result);
                    steps[idx].errors = prior.errors;
                }
                continue;
            }

            // Gate check: the named environment variable must equal "true".
            if let Some(var) = &step.enabled_by {
                let enabled = std::env::var(var).map(|v| v == "true").unwrap_or(false);
                if !enabled {
                    debug!(step_id = %step.id, gate = %var, "Step gated out");
                    steps[idx].state = StepState::GatedOut;
                    store.write(&step.id, epoch_now(), &StepResult::skip()).await?;
                    self.activity
                        .emit(
                            ActivityEvent::StepSkipped,
                            &task_id,
                            &[("step", json!(step.id)), ("reason", json!("gated"))],
                        )
                        .await;
                    continue;
                }
            }

            // Dependency check: the referenced prior step must have PASSed.
            if let Some(dep) = &step.depends_on {
                let passed = store
                    .latest(dep)
                    .await
                    .map(|(_, r)| r.gate_result == GateResult::Pass)
                    .unwrap_or(false);
                if !passed {
                    debug!(step_id = %step.id, dep = %dep, "Step dependency not PASS, skipping");
                    steps[idx].state = StepState::DepBlocked;
                    store.write(&step.id, epoch_now(), &StepResult::skip()).await?;
                    self.activity
                        .emit(
                            ActivityEvent::StepSkipped,
                            &task_id,
                            &[("step", json!(step.id)), ("reason", json!("dependency"))],
                        )
                        .await;
                    continue;
                }
            }

            let result = self.run_step_with_retry(worker, &store, step, &mut steps[idx]).await?;

            match result.gate_result {
                GateResult::Pass => {
                    steps[idx].state = StepState::Completed(GateResult::Pass);
                    self.activity
                        .emit(
                            ActivityEvent::StepCompleted,
                            &task_id,
                            &[("step", json!(step.id))],
                        )
                        .await;
                }
                GateResult::Skip => {
                    steps[idx].state = StepState::Completed(GateResult::Skip);
                    self.activity
                        .emit(
                            ActivityEvent::StepSkipped,
                            &task_id,
                            &[("step", json!(step.id)), ("reason", json!("agent"))],
                        )
                        .await;
                }
                GateResult::Fix | GateResult::Fail => {
                    let gate = result.gate_result;
                    steps[idx].state = StepState::Completed(gate);
                    steps[idx].errors = result.errors.clone();

                    if step.blocking {
                        info!(step_id = %step.id, gate = %gate, "Blocking step halted the pipeline");
                        self.activity
                            .emit(
                                ActivityEvent::PipelineHalted,
                                &task_id,
                                &[("step", json!(step.id)), ("gate", json!(gate.to_string()))],
                            )
                            .await;
                        return Ok(PipelineReport {
                            outcome: PipelineOutcome::HaltedBlocking { step: step.id.clone() },
                            steps,
                        });
                    }

                    self.activity
                        .emit(
                            ActivityEvent::StepFailedSoft,
                            &task_id,
                            &[("step", json!(step.id)), ("gate", json!(gate.to_string()))],
                        )
                        .await;
                }
                GateResult::Stop => {
                    steps[idx].state = StepState::Completed(GateResult::Stop);
                    info!(step_id = %step.id, "Agent stopped the pipeline");
                    self.activity
                        .emit(
                            ActivityEvent::PipelineHaltedByAgent,
                            &task_id,
                            &[("step", json!(step.id))],
                        )
                        .await;
                    return Ok(PipelineReport {
                        outcome: PipelineOutcome::HaltedByAgent { step: step.id.clone() },
                        steps,
                    });
                }
            }
        }

        self.activity
            .emit(ActivityEvent::PipelineCompleted, &task_id, &[])
            .await;

        Ok(PipelineReport {
            outcome: PipelineOutcome::CompletedAll,
            steps,
        })
    }

    /// Execute one step, re-running it through the fix agent while the
    /// retry budget lasts.
    async fn run_step_with_retry(
        &self,
        worker: &WorkerDir,
        store: &ResultStore,
        step: &Step,
        run: &mut StepRun,
    ) -> Result<StepResult> {
        let task_id = worker.task_id.to_string();
        let mut last_epoch = 0;
        let mut attempts: u32 = 0;

        loop {
            let epoch = epoch_now().max(last_epoch + 1);
            last_epoch = epoch;

            let result = self.execute_step(worker, store, step, epoch).await?;

            let Some(policy) = step.retry.as_ref() else {
                return Ok(result);
            };
            if result.gate_result != policy.on || attempts >= policy.max {
                return Ok(result);
            }

            attempts += 1;
            run.state = StepState::Retrying;

            info!(
                step_id = %step.id,
                attempt = attempts,
                max = policy.max,
                "Re-running step after fix agent"
            );
            self.activity
                .emit(
                    ActivityEvent::StepRetrying,
                    &task_id,
                    &[("step", json!(step.id)), ("attempt", json!(attempts))],
                )
                .await;

            if let Some(fix_agent) = &policy.fix_agent {
                let fix_epoch = epoch_now().max(last_epoch + 1);
                last_epoch = fix_epoch;
                let ctx = self.step_context(worker, step, &format!("{}-fix", step.id), fix_epoch);
                let invoker = self.registry.get(fix_agent)?;
                if let Err(e) = invoker.invoke(&ctx).await {
                    warn!(step_id = %step.id, error = %e, "Fix agent failed; retrying step anyway");
                }
            }
        }
    }

    /// One attempt: prepare, invoke, read back or synthesize the result,
    /// commit workspace changes for non-readonly steps.
    async fn execute_step(
        &self,
        worker: &WorkerDir,
        store: &ResultStore,
        step: &Step,
        epoch: u64,
    ) -> Result<StepResult> {
        let task_id = worker.task_id.to_string();

        let config = self.pipeline.effective_config(step);
        write_atomic(&worker.step_config(), &serde_json::to_string_pretty(&config)?).await?;

        let log_dir = worker.step_log_dir(&step.id, epoch);
        fs::create_dir_all(&log_dir).await?;

        self.activity
            .emit(
                ActivityEvent::StepStarted,
                &task_id,
                &[("step", json!(step.id)), ("agent", json!(step.agent))],
            )
            .await;

        let ctx = self.step_context(worker, step, &step.id, epoch);
        let invoker = self.registry.get(&step.agent)?;

        let result = match invoker.invoke(&ctx).await {
            Ok(()) => match store.latest(&step.id).await {
                Some((result_epoch, result)) if result_epoch >= epoch => result,
                _ => {
                    warn!(step_id = %step.id, "Agent produced no output file, synthesizing FAIL");
                    let synthesized = StepResult::missing_output();
                    store.write(&step.id, epoch, &synthesized).await?;
                    synthesized
                }
            },
            Err(e) => {
                warn!(step_id = %step.id, error = %e, "Agent invocation failed");
                let synthesized = StepResult::fail(vec![e.to_string()]);
                store.write(&step.id, epoch, &synthesized).await?;
                synthesized
            }
        };

        if !step.readonly {
            let git = GitRunner::new(worker.workspace());
            if git.has_uncommitted_changes().await.unwrap_or(false) {
                git.add_all().await?;
                let message = format!("chore({}): {} pipeline output", step.id, task_id);
                if git.commit(&message).await? {
                    debug!(step_id = %step.id, "Committed workspace changes");
                }
            }
        }

        Ok(result)
    }

    fn step_context(
        &self,
        worker: &WorkerDir,
        step: &Step,
        step_id: &str,
        epoch: u64,
    ) -> StepContext {
        StepContext {
            step_id: step_id.to_string(),
            task_id: worker.task_id.to_string(),
            readonly: step.readonly,
            epoch,
            worker_dir: worker.path().to_path_buf(),
            project_dir: self.project_dir.clone(),
            workspace_dir: worker.workspace(),
            log_dir: worker.step_log_dir(step_id, epoch),
            timeout: self.step_timeout,
            max_turns: self.max_turns,
        }
    }

    /// Resolve where to start: an explicit step, the resume agent's pick,
    /// or the earliest step without a persisted result.
    async fn resolve_start(
        &self,
        worker: &WorkerDir,
        store: &ResultStore,
        explicit: Option<&str>,
    ) -> Result<StartDecision> {
        if let Some(step_id) = explicit {
            let idx = self
                .pipeline
                .step_index(step_id)
                .ok_or_else(|| WiggumError::UnknownStep(step_id.to_string()))?;
            write_atomic(&worker.resume_step(), step_id).await?;
            return Ok(StartDecision::From(idx));
        }

        let mut earliest_missing = None;
        for (idx, step) in self.pipeline.steps.iter().enumerate() {
            if !store.has_result(&step.id).await {
                earliest_missing = Some(idx);
                break;
            }
        }

        let Some(missing_idx) = earliest_missing else {
            // Every step already has output; nothing re-runs.
            return Ok(StartDecision::From(self.pipeline.steps.len()));
        };

        // A fresh worker has no history; no resume decision to make.
        if missing_idx == 0 {
            return Ok(StartDecision::From(0));
        }

        if self.registry.contains(RESUME_AGENT) {
            let epoch = epoch_now();
            let resume_step = &self.pipeline.steps[missing_idx];
            let ctx = self.step_context(worker, resume_step, RESUME_AGENT, epoch);
            fs::create_dir_all(&ctx.log_dir).await?;
            if let Err(e) = self.registry.get(RESUME_AGENT)?.invoke(&ctx).await {
                warn!(error = %e, "Resume agent failed, falling back to earliest missing step");
            }

            if let Ok(decision) = fs::read_to_string(worker.resume_step()).await {
                let decision = decision.trim().to_string();
                if decision == "ABORT" {
                    return Ok(StartDecision::Abort);
                }
                if let Some(idx) = self.pipeline.step_index(&decision) {
                    debug!(step = %decision, "Resume agent selected starting step");
                    return Ok(StartDecision::From(idx));
                }
                if !decision.is_empty() {
                    warn!(decision = %decision, "Resume agent named an unknown step, ignoring");
                }
            }
        }

        let step_id = &self.pipeline.steps[missing_idx].id;
        write_atomic(&worker.resume_step(), step_id).await?;
        Ok(StartDecision::From(missing_idx))
    }

}

enum StartDecision {
    From(usize),
    Abort,
}
