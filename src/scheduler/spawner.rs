use std::path::Path;

use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::debug;

use crate::error::{Result, WiggumError};
use crate::worker::WorkerDir;

/// Handle to a freshly spawned worker process. `child` is present when the
/// spawner owns the OS handle; adopted or test workers carry only a PID.
pub struct SpawnedWorker {
    pub pid: u32,
    pub child: Option<Child>,
}

/// How the scheduler turns an allocated worker directory into a running
/// process. Production re-invokes this binary's hidden `worker`
/// subcommand; tests substitute a recorder so a tick can be driven
/// without forking.
#[async_trait]
pub trait WorkerSpawner: Send + Sync {
    async fn spawn(&self, dir: &WorkerDir, project_root: &Path) -> Result<SpawnedWorker>;
}

/// The real thing: `<wiggum> worker --dir <dir>`, detached from the
/// scheduler's terminal. Worker output goes to the files under the worker
/// directory, not to the scheduler's console.
pub struct ProcessSpawner;

#[async_trait]
impl WorkerSpawner for ProcessSpawner {
    async fn spawn(&self, dir: &WorkerDir, project_root: &Path) -> Result<SpawnedWorker> {
        let exe = std::env::current_exe()?;
        let child = Command::new(exe)
            .arg("worker")
            .arg("--dir")
            .arg(dir.path())
            .current_dir(project_root)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .spawn()?;

        let pid = child
            .id()
            .ok_or_else(|| WiggumError::Other("spawned worker has no PID".into()))?;
        debug!(pid, worker = %dir.name(), "Worker process forked");

        Ok(SpawnedWorker {
            pid,
            child: Some(child),
        })
    }
}
