use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::board::TaskId;
use crate::error::{Result, WiggumError};
use crate::proc::FileLock;
use crate::utils::write_atomic;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Active,
    Failed,
}

/// Shared record for a group of tasks that must run serially. Lives at
/// `.ralph/batches/<id>.json`; every mutation happens under the batch
/// lock, and `position` only ever advances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRecord {
    pub batch_id: String,
    pub task_ids: Vec<TaskId>,
    pub position: usize,
    pub status: BatchStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_task: Option<TaskId>,
}

impl BatchRecord {
    pub fn new(batch_id: impl Into<String>, task_ids: Vec<TaskId>) -> Self {
        Self {
            batch_id: batch_id.into(),
            task_ids,
            position: 0,
            status: BatchStatus::Active,
            failed_task: None,
        }
    }

    pub fn current_task(&self) -> Option<&TaskId> {
        self.task_ids.get(self.position)
    }
}

/// Reference to a batch from inside a worker directory
/// (`batch-context.json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchContext {
    pub batch_id: String,
}

pub struct BatchCoordinator {
    record_path: PathBuf,
    lock_path: PathBuf,
    poll_interval: Duration,
}

impl BatchCoordinator {
    pub fn new(record_path: impl Into<PathBuf>, poll_interval: Duration) -> Self {
        let record_path = record_path.into();
        let lock_path = record_path.with_extension("lock");
        Self {
            record_path,
            lock_path,
            poll_interval,
        }
    }

    pub async fn read(&self) -> Result<BatchRecord> {
        let content = tokio::fs::read_to_string(&self.record_path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    pub async fn write(&self, record: &BatchRecord) -> Result<()> {
        write_atomic(&self.record_path, &serde_json::to_string_pretty(record)?).await
    }

    async fn with_lock<T>(
        &self,
        mutate: impl FnOnce(&mut BatchRecord) -> Result<T>,
    ) -> Result<T> {
        let _lock = FileLock::acquire(&self.lock_path, LOCK_TIMEOUT)?;
        let mut record = self.read().await?;
        let value = mutate(&mut record)?;
        self.write(&record).await?;
        Ok(value)
    }

    /// Block until it is this task's turn. Errors out immediately when the
    /// batch is marked failed.
    pub async fn wait_for_turn(&self, task_id: &TaskId) -> Result<()> {
        loop {
            let record = self.read().await?;

            if record.status == BatchStatus::Failed {
                return Err(WiggumError::BatchFailed {
                    batch_id: record.batch_id,
                    failed_task: record
                        .failed_task
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "unknown".to_string()),
                });
            }

            match record.current_task() {
                Some(current) if current == task_id => {
                    info!(batch_id = %record.batch_id, task_id = %task_id, "Batch turn reached");
                    return Ok(());
                }
                Some(current) => {
                    debug!(
                        batch_id = %record.batch_id,
                        task_id = %task_id,
                        waiting_on = %current,
                        "Waiting for batch turn"
                    );
                }
                None => {
                    return Err(WiggumError::Other(format!(
                        "task {} not in batch {}",
                        task_id, record.batch_id
                    )));
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Advance past this task. Only the task currently at `position` may
    /// advance; anything else is a stale completion and is ignored.
    pub async fn advance(&self, task_id: &TaskId) -> Result<()> {
        self.with_lock(|record| {
            if record.current_task() == Some(task_id) {
                record.position += 1;
                debug!(batch_id = %record.batch_id, position = record.position, "Batch advanced");
            }
            Ok(())
        })
        .await
    }

    /// Mark the whole batch failed; waiting members abort on next poll.
    pub async fn fail(&self, task_id: &TaskId) -> Result<()> {
        self.with_lock(|record| {
            record.status = BatchStatus::Failed;
            record.failed_task = Some(task_id.clone());
            Ok(())
        })
        .await
    }
}
