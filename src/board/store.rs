use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;
use tracing::{debug, warn};

use super::graph::{detect_cycles, CycleReport};
use super::parser::{parse_board, ParsedBoard};
use super::task::{StatusMarker, Task, TaskId};
use crate::error::{Result, WiggumError};
use crate::proc::FileLock;

const LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Per-marker totals for the status surface.
#[derive(Debug, Default, Clone, Copy)]
pub struct BoardCounts {
    pub pending: usize,
    pub in_progress: usize,
    pub done: usize,
    pub failed: usize,
    pub pending_approval: usize,
}

impl BoardCounts {
    pub fn total(&self) -> usize {
        self.pending + self.in_progress + self.done + self.failed + self.pending_approval
    }
}

/// On-disk kanban board. Reads parse the whole file; the only mutation the
/// orchestrator performs is flipping one status glyph, done as a whole-file
/// replacement under the board lock.
pub struct Board {
    path: PathBuf,
    lock_path: PathBuf,
}

impl Board {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    pub async fn read(&self) -> Result<ParsedBoard> {
        let content = fs::read_to_string(&self.path).await?;
        let parsed = parse_board(&content);
        for (line, message) in &parsed.invalid {
            warn!(line, message = %message, "Invalid board entry excluded");
        }
        Ok(parsed)
    }

    pub async fn list(&self, marker: Option<StatusMarker>) -> Result<Vec<Task>> {
        let parsed = self.read().await?;
        Ok(parsed
            .tasks
            .into_iter()
            .filter(|t| marker.is_none_or(|m| t.marker == m))
            .collect())
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task> {
        let parsed = self.read().await?;
        parsed
            .task(id)
            .cloned()
            .ok_or_else(|| WiggumError::TaskNotFound(id.to_string()))
    }

    /// Pending tasks whose dependencies are all done.
    pub async fn ready(&self) -> Result<Vec<Task>> {
        let parsed = self.read().await?;
        Ok(Self::ready_of(&parsed))
    }

    /// Pending tasks with at least one unmet dependency.
    pub async fn blocked(&self) -> Result<Vec<Task>> {
        let parsed = self.read().await?;
        Ok(Self::blocked_of(&parsed))
    }

    pub fn ready_of(parsed: &ParsedBoard) -> Vec<Task> {
        let done: Vec<&TaskId> = parsed
            .tasks
            .iter()
            .filter(|t| t.marker.satisfies_dependency())
            .map(|t| &t.id)
            .collect();
        parsed
            .tasks
            .iter()
            .filter(|t| t.is_ready(&done))
            .cloned()
            .collect()
    }

    pub fn blocked_of(parsed: &ParsedBoard) -> Vec<Task> {
        let done: Vec<&TaskId> = parsed
            .tasks
            .iter()
            .filter(|t| t.marker.satisfies_dependency())
            .map(|t| &t.id)
            .collect();
        parsed
            .tasks
            .iter()
            .filter(|t| t.is_blocked(&done))
            .cloned()
            .collect()
    }

    pub async fn detect_cycles(&self) -> Result<CycleReport> {
        let parsed = self.read().await?;
        Ok(detect_cycles(&parsed.tasks))
    }

    pub async fn counts(&self) -> Result<BoardCounts> {
        let parsed = self.read().await?;
        let mut counts = BoardCounts::default();
        for task in &parsed.tasks {
            match task.marker {
                StatusMarker::Pending => counts.pending += 1,
                StatusMarker::InProgress => counts.in_progress += 1,
                StatusMarker::Done => counts.done += 1,
                StatusMarker::Failed => counts.failed += 1,
                StatusMarker::PendingApproval => counts.pending_approval += 1,
            }
        }
        Ok(counts)
    }

    /// Atomically rewrite one task's status glyph.
    ///
    /// The read-modify-write runs under the exclusive board lock. If the
    /// entry line moved or changed between the caller's read and this write
    /// (a human edited the board), the write fails with `ConcurrentEdit`
    /// and the caller backs off via its skip counter.
    pub async fn set_status(&self, id: &TaskId, marker: StatusMarker) -> Result<()> {
        self.set_status_inner(id, marker, None).await
    }

    /// Like [`set_status`](Self::set_status) but verifies the marker last
    /// observed by the caller is still on disk, failing with
    /// `ConcurrentEdit` otherwise.
    pub async fn set_status_checked(
        &self,
        id: &TaskId,
        observed: StatusMarker,
        marker: StatusMarker,
    ) -> Result<()> {
        self.set_status_inner(id, marker, Some(observed)).await
    }

    async fn set_status_inner(
        &self,
        id: &TaskId,
        marker: StatusMarker,
        observed: Option<StatusMarker>,
    ) -> Result<()> {
        let path = self.path.clone();
        let lock_path = self.lock_path.clone();
        let id = id.clone();

        // The lock is synchronous and short-held; keep the whole critical
        // section off the async executor.
        tokio::task::spawn_blocking(move || {
            let _lock = FileLock::acquire(&lock_path, LOCK_TIMEOUT)?;

            let content = std::fs::read_to_string(&path)?;
            let parsed = parse_board(&content);
            let line_no = *parsed
                .entry_lines
                .get(&id)
                .ok_or_else(|| WiggumError::TaskNotFound(id.to_string()))?;

            if let Some(observed) = observed {
                let current = parsed
                    .task(&id)
                    .map(|t| t.marker)
                    .ok_or(WiggumError::ConcurrentEdit)?;
                if current != observed {
                    return Err(WiggumError::ConcurrentEdit);
                }
            }

            let mut lines: Vec<String> = content.lines().map(str::to_string).collect();
            let entry = lines
                .get(line_no)
                .cloned()
                .ok_or(WiggumError::ConcurrentEdit)?;

            if !entry.contains(&format!("[{}]", id)) {
                return Err(WiggumError::ConcurrentEdit);
            }

            let open = entry.find("[").ok_or(WiggumError::ConcurrentEdit)?;
            let close = entry[open..]
                .find(']')
                .map(|i| open + i)
                .ok_or(WiggumError::ConcurrentEdit)?;
            let rewritten = format!("{}{}{}", &entry[..open], marker.glyph(), &entry[close + 1..]);
            lines[line_no] = rewritten;

            let mut updated = lines.join("\n");
            if content.ends_with('\n') {
                updated.push('\n');
            }

            write_atomic_sync(&path, &updated)?;
            debug!(task_id = %id, marker = %marker, "Board status updated");
            Ok(())
        })
        .await
        .map_err(|e| WiggumError::Other(format!("board write task panicked: {}", e)))?
    }
}

fn write_atomic_sync(path: &std::path::Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("md.tmp");
    std::fs::write(&tmp_path, content)?;
    if let Ok(file) = std::fs::File::open(&tmp_path) {
        let _ = file.sync_all();
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
