use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::board::TaskId;
use crate::error::{Result, WiggumError};
use crate::utils::write_atomic;

fn dir_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^worker-([A-Za-z]{2,8}-[0-9]{1,4})(?:-(fix|resolve))?-([0-9]+)$")
            .expect("valid regex")
    })
}

/// Which follow-up role a worker plays. Kind determines the capacity bucket
/// it counts against and the follow-up behavior at reap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Main,
    Fix,
    Resolve,
}

impl WorkerKind {
    fn infix(&self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Fix => "-fix",
            Self::Resolve => "-resolve",
        }
    }
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Main => "main",
            Self::Fix => "fix",
            Self::Resolve => "resolve",
        };
        write!(f, "{}", name)
    }
}

/// One worker's directory under the workers root. The directory name
/// encodes task, kind, and spawn epoch: `worker-AUTH-1-fix-1700000000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerDir {
    path: PathBuf,
    pub task_id: TaskId,
    pub kind: WorkerKind,
    pub epoch: u64,
}

impl WorkerDir {
    pub fn allocate(workers_root: &Path, task_id: &TaskId, kind: WorkerKind, epoch: u64) -> Self {
        let name = format!("worker-{}{}-{}", task_id, kind.infix(), epoch);
        Self {
            path: workers_root.join(name),
            task_id: task_id.clone(),
            kind,
            epoch,
        }
    }

    /// Parse a directory path back into its components. Returns None for
    /// paths that do not follow the worker naming scheme.
    pub fn parse(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let captures = dir_pattern().captures(name)?;
        let task_id: TaskId = captures.get(1)?.as_str().parse().ok()?;
        let kind = match captures.get(2).map(|m| m.as_str()) {
            None => WorkerKind::Main,
            Some("fix") => WorkerKind::Fix,
            Some("resolve") => WorkerKind::Resolve,
            Some(_) => return None,
        };
        let epoch: u64 = captures.get(3)?.as_str().parse().ok()?;
        Some(Self {
            path: path.to_path_buf(),
            task_id,
            kind,
            epoch,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn workspace(&self) -> PathBuf {
        self.path.join("workspace")
    }

    pub fn prd(&self) -> PathBuf {
        self.path.join("prd.md")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.path.join("agent.pid")
    }

    pub fn step_config(&self) -> PathBuf {
        self.path.join("step-config.json")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.path.join("logs")
    }

    pub fn step_log_dir(&self, step_id: &str, epoch: u64) -> PathBuf {
        self.logs_dir().join(format!("{}-{}", step_id, epoch))
    }

    pub fn results_dir(&self) -> PathBuf {
        self.path.join("results")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.path.join("reports")
    }

    pub fn worker_log(&self) -> PathBuf {
        self.path.join("worker.log")
    }

    pub fn git_state(&self) -> PathBuf {
        self.path.join("git-state.json")
    }

    pub fn batch_context(&self) -> PathBuf {
        self.path.join("batch-context.json")
    }

    pub fn violation_flag(&self) -> PathBuf {
        self.path.join("violation_flag.txt")
    }

    pub fn violations_log(&self) -> PathBuf {
        self.path.join("violations.log")
    }

    pub fn result_file(&self) -> PathBuf {
        self.path.join("result.json")
    }

    pub fn resume_step(&self) -> PathBuf {
        self.path.join("resume-step.txt")
    }

    pub fn pr_url_file(&self) -> PathBuf {
        self.path.join("pr_url.txt")
    }

    /// One branch per task, shared by main, fix, and resolve attempts so a
    /// follow-up worker continues where the previous one stopped.
    pub fn branch_name(&self, prefix: &str) -> String {
        format!("{}/{}", prefix, self.task_id)
    }

    pub async fn write_pid(&self, pid: u32) -> Result<()> {
        fs::write(self.pid_file(), pid.to_string()).await?;
        Ok(())
    }

    pub async fn read_pid(&self) -> Option<u32> {
        let content = fs::read_to_string(self.pid_file()).await.ok()?;
        content.trim().parse().ok()
    }

    /// Append a phase-level structured event to `worker.log`.
    pub async fn log_phase(&self, phase: &str, detail: &str) -> Result<()> {
        let record = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "phase": phase,
            "detail": detail,
        });
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.worker_log())
            .await?;
        file.write_all(format!("{}\n", record).as_bytes()).await?;
        Ok(())
    }

    pub async fn read_git_state(&self) -> GitState {
        match fs::read_to_string(self.git_state()).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => GitState::default(),
        }
    }

    pub async fn write_git_state(&self, state: &GitState) -> Result<()> {
        write_atomic(&self.git_state(), &serde_json::to_string_pretty(state)?).await
    }

    pub async fn read_result(&self) -> Option<WorkerResult> {
        let content = fs::read_to_string(self.result_file()).await.ok()?;
        serde_json::from_str(&content).ok()
    }

    pub async fn write_result(&self, result: &WorkerResult) -> Result<()> {
        write_atomic(&self.result_file(), &serde_json::to_string_pretty(result)?).await
    }
}

/// Markers the scheduler reads at reap to decide follow-up workers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GitState {
    pub needs_fix: bool,
    pub needs_resolve: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerOutcome {
    Success,
    Failed,
    FixRequested,
}

/// Final result of one worker run, published to `result.json` before the
/// process exits so the reaper can act on it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerResult {
    pub task_id: TaskId,
    pub outcome: WorkerOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default)]
    pub violation: bool,
}

impl WorkerResult {
    pub fn success(task_id: TaskId, pr_url: Option<String>) -> Self {
        Self {
            task_id,
            outcome: WorkerOutcome::Success,
            failed_step: None,
            errors: Vec::new(),
            pr_url,
            violation: false,
        }
    }

    pub fn failed(task_id: TaskId, failed_step: Option<String>, errors: Vec<String>) -> Self {
        Self {
            task_id,
            outcome: WorkerOutcome::Failed,
            failed_step,
            errors,
            pr_url: None,
            violation: false,
        }
    }
}

/// Create the worker directory skeleton.
pub async fn create_layout(dir: &WorkerDir) -> Result<()> {
    if dir.path().exists() {
        return Err(WiggumError::WorkerDir(format!(
            "{} already exists",
            dir.path().display()
        )));
    }
    fs::create_dir_all(dir.path()).await?;
    fs::create_dir_all(dir.logs_dir()).await?;
    fs::create_dir_all(dir.results_dir()).await?;
    fs::create_dir_all(dir.reports_dir()).await?;
    Ok(())
}
