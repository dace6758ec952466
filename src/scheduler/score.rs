use std::collections::HashMap;
use std::path::PathBuf;

use tracing::debug;

use crate::board::{Task, TaskId};
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::utils::write_atomic;

/// Inputs to one task's priority score, gathered by the scheduler each
/// tick.
#[derive(Debug, Clone, Copy)]
pub struct ScoreInputs {
    pub ticks_ready: u64,
    pub has_plan: bool,
    /// Pending tasks that depend on this one.
    pub dependent_count: usize,
    /// Another task with the same prefix is in progress.
    pub sibling_in_progress: bool,
}

/// The scheduling score. Higher runs earlier; ties break lexicographically
/// by identifier.
pub fn priority_score(task: &Task, inputs: ScoreInputs, config: &SchedulerConfig) -> i64 {
    let base = task.priority.base_weight() * 1000;
    let aging = inputs.ticks_ready as i64 * config.aging_factor;
    let plan = if inputs.has_plan { config.plan_bonus } else { 0 };
    let fanin = inputs.dependent_count as i64 * config.dep_bonus_per_task;
    let sibling = if inputs.sibling_in_progress {
        config.sibling_wip_penalty
    } else {
        0
    };

    base + aging + plan + fanin - sibling
}

/// Ticks-ready counters, persisted in a sidecar file so aging survives a
/// scheduler restart.
pub struct AgingTracker {
    path: PathBuf,
    ticks: HashMap<TaskId, u64>,
}

impl AgingTracker {
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let ticks = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Self { path, ticks }
    }

    pub fn ticks(&self, task_id: &TaskId) -> u64 {
        self.ticks.get(task_id).copied().unwrap_or(0)
    }

    /// Bump every task still sitting in the ready set.
    pub fn increment(&mut self, ready: &[TaskId]) {
        for id in ready {
            *self.ticks.entry(id.clone()).or_insert(0) += 1;
        }
    }

    /// A task leaving the ready set (spawned or excluded) stops aging.
    pub fn remove(&mut self, task_id: &TaskId) {
        self.ticks.remove(task_id);
    }

    pub async fn save(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.ticks)?;
        write_atomic(&self.path, &content).await?;
        debug!(entries = self.ticks.len(), "Aging tracker saved");
        Ok(())
    }
}
