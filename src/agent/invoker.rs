use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, WiggumError};

/// Everything an agent invocation may depend on. The contract with agent
/// implementations is exactly this: the worker directory, the project
/// directory, the exported environment, and `step-config.json`.
#[derive(Debug, Clone)]
pub struct StepContext {
    pub step_id: String,
    pub task_id: String,
    pub readonly: bool,
    /// Suffix for this invocation's result file
    /// (`results/<step>-<epoch>.json`).
    pub epoch: u64,
    pub worker_dir: PathBuf,
    pub project_dir: PathBuf,
    pub workspace_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timeout: Duration,
    pub max_turns: u32,
}

/// A pluggable agent backend. The production backend is a subprocess; tests
/// register in-process scripted agents.
#[async_trait]
pub trait AgentInvoker: Send + Sync {
    /// Run the agent to completion. The agent reports its gate result by
    /// writing `results/<step>-<epoch>.json`; this call only surfaces
    /// process-level failures (spawn errors, timeouts).
    async fn invoke(&self, ctx: &StepContext) -> Result<()>;
}

/// Uniform subprocess spec: one OS process per invocation, stdout/stderr
/// captured into the step's log directory.
pub struct SubprocessAgent {
    command: String,
    args: Vec<String>,
}

impl SubprocessAgent {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }
}

#[async_trait]
impl AgentInvoker for SubprocessAgent {
    async fn invoke(&self, ctx: &StepContext) -> Result<()> {
        tokio::fs::create_dir_all(&ctx.log_dir).await?;
        let stdout_log = std::fs::File::create(ctx.log_dir.join("stdout.log"))?;
        let stderr_log = std::fs::File::create(ctx.log_dir.join("stderr.log"))?;

        debug!(
            step_id = %ctx.step_id,
            task_id = %ctx.task_id,
            command = %self.command,
            "Invoking agent subprocess"
        );

        let mut child = Command::new(&self.command)
            .args(&self.args)
            .arg(&ctx.worker_dir)
            .arg(&ctx.project_dir)
            .current_dir(&ctx.workspace_dir)
            .env("WIGGUM_STEP_ID", &ctx.step_id)
            .env("WIGGUM_STEP_READONLY", ctx.readonly.to_string())
            .env("WIGGUM_TASK_ID", &ctx.task_id)
            .env("WIGGUM_STEP_EPOCH", ctx.epoch.to_string())
            .env("WIGGUM_MAX_TURNS", ctx.max_turns.to_string())
            .stdout(std::process::Stdio::from(stdout_log))
            .stderr(std::process::Stdio::from(stderr_log))
            .spawn()
            .map_err(|e| {
                WiggumError::AgentInvocation(format!("failed to spawn {}: {}", self.command, e))
            })?;

        let status = match tokio::time::timeout(ctx.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                warn!(step_id = %ctx.step_id, "Agent exceeded wall-time limit, killing");
                let _ = child.kill().await;
                return Err(WiggumError::StepTimeout {
                    step: ctx.step_id.clone(),
                    secs: ctx.timeout.as_secs(),
                });
            }
        };

        debug!(
            step_id = %ctx.step_id,
            code = ?status.code(),
            "Agent subprocess exited"
        );

        // A non-zero exit is not itself an error: the runner classifies the
        // result file, synthesizing FAIL when the agent left none.
        Ok(())
    }
}
