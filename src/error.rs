use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WiggumError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid task identifier: {0}")]
    InvalidTaskId(String),

    #[error("Board parse error at line {line}: {message}")]
    BoardParse { line: usize, message: String },

    #[error("Board changed on disk since it was read")]
    ConcurrentEdit,

    #[error("Unknown dependency {dependency} referenced by {task}")]
    UnknownDependency { task: String, dependency: String },

    #[error("Pipeline definition error: {0}")]
    Pipeline(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Unknown agent type: {0}")]
    UnknownAgent(String),

    #[error("Agent invocation failed: {0}")]
    AgentInvocation(String),

    #[error("Step {step} timed out after {secs}s")]
    StepTimeout { step: String, secs: u64 },

    #[error("Git error: {0}")]
    Git(String),

    #[error("Worktree error: {message}")]
    Worktree { message: String, path: PathBuf },

    #[error("Worker directory error: {0}")]
    WorkerDir(String),

    #[error("Batch {batch_id} failed by task {failed_task}")]
    BatchFailed {
        batch_id: String,
        failed_task: String,
    },

    #[error("Failed to acquire lock: {0}")]
    LockAcquisition(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not in a git repository")]
    NotInGitRepo,

    #[error("Project not initialized. Run 'wiggum init' first.")]
    NotInitialized,

    #[error("Pull request creation failed: {0}")]
    PullRequest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl WiggumError {
    /// Transient errors are retried with skip-counter backoff rather than
    /// failing the task.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConcurrentEdit | Self::LockAcquisition(_) | Self::PullRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WiggumError>;
