//! In-memory index of live worker processes, keyed by PID.
//!
//! The pool is rebuilt from the workers directory on startup so a
//! restarted scheduler adopts workers that survived it. Mutation is
//! serialized behind a lock; iteration always works on a snapshot.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::board::TaskId;
use crate::error::Result;
use crate::proc::is_process_running;
use crate::worker::{WorkerDir, WorkerKind};

#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub pid: u32,
    pub kind: WorkerKind,
    pub task_id: TaskId,
    pub dir: WorkerDir,
    pub started_at: DateTime<Utc>,
}

#[derive(Default, Clone)]
pub struct WorkerPool {
    entries: Arc<RwLock<HashMap<u32, PoolEntry>>>,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, pid: u32, kind: WorkerKind, task_id: TaskId, dir: WorkerDir) {
        let entry = PoolEntry {
            pid,
            kind,
            task_id,
            dir,
            started_at: Utc::now(),
        };
        let mut entries = self.entries.write();
        if let Some(previous) = entries.insert(pid, entry) {
            warn!(
                pid,
                task_id = %previous.task_id,
                "PID reused while previous pool entry was still present"
            );
        }
    }

    pub fn remove(&self, pid: u32) -> Option<PoolEntry> {
        self.entries.write().remove(&pid)
    }

    pub fn get(&self, pid: u32) -> Option<PoolEntry> {
        self.entries.read().get(&pid).cloned()
    }

    pub fn count(&self, kind: Option<WorkerKind>) -> usize {
        let entries = self.entries.read();
        match kind {
            None => entries.len(),
            Some(k) => entries.values().filter(|e| e.kind == k).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Snapshot of all entries; safe to iterate while the pool mutates.
    pub fn snapshot(&self) -> Vec<PoolEntry> {
        let mut entries: Vec<PoolEntry> = self.entries.read().values().cloned().collect();
        entries.sort_by_key(|e| e.pid);
        entries
    }

    pub fn snapshot_kind(&self, kind: WorkerKind) -> Vec<PoolEntry> {
        self.snapshot()
            .into_iter()
            .filter(|e| e.kind == kind)
            .collect()
    }

    /// Visit entries (optionally one kind) over a snapshot, so the pool
    /// may be mutated from inside the callback.
    pub fn for_each<F: FnMut(&PoolEntry)>(&self, kind: Option<WorkerKind>, mut f: F) {
        for entry in self.snapshot() {
            if kind.is_none_or(|k| entry.kind == k) {
                f(&entry);
            }
        }
    }

    /// Whether a live worker of this kind exists for the task. The
    /// scheduler guarantees at most one per (task, kind).
    pub fn has_worker_for(&self, task_id: &TaskId, kind: Option<WorkerKind>) -> bool {
        self.entries
            .read()
            .values()
            .any(|e| &e.task_id == task_id && kind.is_none_or(|k| e.kind == k))
    }

    /// Task prefixes with a live main worker; feeds the sibling-WIP
    /// penalty.
    pub fn active_prefixes(&self) -> Vec<String> {
        let entries = self.entries.read();
        let mut prefixes: Vec<String> = entries
            .values()
            .map(|e| e.task_id.prefix().to_string())
            .collect();
        prefixes.sort();
        prefixes.dedup();
        prefixes
    }

    /// Rebuild the pool by scanning worker directories on disk. A directory
    /// whose recorded PID is alive is re-registered with the kind inferred
    /// from the directory name.
    pub async fn restore_from_disk(&self, workers_root: &Path) -> Result<usize> {
        if !workers_root.exists() {
            return Ok(0);
        }

        let mut adopted = 0;
        let mut read_dir = tokio::fs::read_dir(workers_root).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let Some(dir) = WorkerDir::parse(&entry.path()) else {
                continue;
            };
            let Some(pid) = dir.read_pid().await else {
                continue;
            };
            if !is_process_running(pid) {
                continue;
            }
            if self.get(pid).is_some() {
                continue;
            }

            debug!(pid, task_id = %dir.task_id, kind = %dir.kind, "Adopting live worker from disk");
            self.add(pid, dir.kind, dir.task_id.clone(), dir);
            adopted += 1;
        }

        Ok(adopted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dir_for(id: &str, kind: WorkerKind) -> WorkerDir {
        WorkerDir::allocate(
            Path::new("/tmp/workers"),
            &id.parse().unwrap(),
            kind,
            1_700_000_000,
        )
    }

    #[test]
    fn add_remove_count() {
        let pool = WorkerPool::new();
        pool.add(
            10,
            WorkerKind::Main,
            "AUTH-1".parse().unwrap(),
            dir_for("AUTH-1", WorkerKind::Main),
        );
        pool.add(
            11,
            WorkerKind::Fix,
            "AUTH-2".parse().unwrap(),
            dir_for("AUTH-2", WorkerKind::Fix),
        );

        assert_eq!(pool.count(None), 2);
        assert_eq!(pool.count(Some(WorkerKind::Main)), 1);
        assert_eq!(pool.count(Some(WorkerKind::Fix)), 1);
        assert_eq!(pool.count(Some(WorkerKind::Resolve)), 0);

        let removed = pool.remove(10).unwrap();
        assert_eq!(removed.task_id.as_str(), "AUTH-1");
        assert_eq!(pool.count(None), 1);
        assert!(pool.remove(10).is_none());
    }

    #[test]
    fn has_worker_for_task_and_kind() {
        let pool = WorkerPool::new();
        let id: TaskId = "AUTH-1".parse().unwrap();
        pool.add(10, WorkerKind::Main, id.clone(), dir_for("AUTH-1", WorkerKind::Main));

        assert!(pool.has_worker_for(&id, None));
        assert!(pool.has_worker_for(&id, Some(WorkerKind::Main)));
        assert!(!pool.has_worker_for(&id, Some(WorkerKind::Fix)));
        assert!(!pool.has_worker_for(&"AUTH-2".parse().unwrap(), None));
    }

    #[test]
    fn active_prefixes_dedup() {
        let pool = WorkerPool::new();
        pool.add(1, WorkerKind::Main, "AUTH-1".parse().unwrap(), dir_for("AUTH-1", WorkerKind::Main));
        pool.add(2, WorkerKind::Main, "AUTH-2".parse().unwrap(), dir_for("AUTH-2", WorkerKind::Main));
        pool.add(3, WorkerKind::Main, "UI-1".parse().unwrap(), dir_for("UI-1", WorkerKind::Main));

        assert_eq!(pool.active_prefixes(), vec!["AUTH", "UI"]);
    }

    #[tokio::test]
    async fn restore_skips_dead_and_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path();

        // Live worker: our own PID.
        let live = WorkerDir::allocate(root, &"AUTH-1".parse().unwrap(), WorkerKind::Fix, 1);
        tokio::fs::create_dir_all(live.path()).await.unwrap();
        live.write_pid(std::process::id()).await.unwrap();

        // Dead worker: PID that cannot exist.
        let dead = WorkerDir::allocate(root, &"AUTH-2".parse().unwrap(), WorkerKind::Main, 2);
        tokio::fs::create_dir_all(dead.path()).await.unwrap();
        dead.write_pid(4_194_000).await.unwrap();

        // Not a worker directory at all.
        tokio::fs::create_dir_all(root.join("random-dir")).await.unwrap();

        let pool = WorkerPool::new();
        let adopted = pool.restore_from_disk(root).await.unwrap();

        assert_eq!(adopted, 1);
        assert_eq!(pool.count(None), 1);
        let entry = pool.get(std::process::id()).unwrap();
        assert_eq!(entry.kind, WorkerKind::Fix);
        assert_eq!(entry.task_id.as_str(), "AUTH-1");
    }
}
