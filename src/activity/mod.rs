//! Newline-delimited JSON activity log under `.ralph/logs/activity.jsonl`.
//!
//! One record per orchestration event; each carries `ts`, `event`,
//! `task_id`, and event-specific fields. Appends only, never read back by
//! the orchestrator.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::{Map, Value};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityEvent {
    StepStarted,
    StepCompleted,
    StepSkipped,
    StepFailedSoft,
    StepRetrying,
    PipelineHalted,
    PipelineHaltedByAgent,
    PipelineCompleted,
    WorkerSpawned,
    WorkerReaped,
    ViolationDetected,
    CycleDetected,
}

impl ActivityEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StepStarted => "step.started",
            Self::StepCompleted => "step.completed",
            Self::StepSkipped => "step.skipped",
            Self::StepFailedSoft => "step.failed_soft",
            Self::StepRetrying => "step.retrying",
            Self::PipelineHalted => "pipeline.halted",
            Self::PipelineHaltedByAgent => "pipeline.halted_by_agent",
            Self::PipelineCompleted => "pipeline.completed",
            Self::WorkerSpawned => "worker.spawned",
            Self::WorkerReaped => "worker.reaped",
            Self::ViolationDetected => "violation.detected",
            Self::CycleDetected => "cycle.detected",
        }
    }
}

#[derive(Clone)]
pub struct ActivityLog {
    path: PathBuf,
}

impl ActivityLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Append one record. Logging must never fail the orchestration path,
    /// so errors are downgraded to warnings.
    pub async fn emit(&self, event: ActivityEvent, task_id: &str, fields: &[(&str, Value)]) {
        let mut record = Map::new();
        record.insert("ts".into(), Value::String(Utc::now().to_rfc3339()));
        record.insert("event".into(), Value::String(event.as_str().into()));
        record.insert("task_id".into(), Value::String(task_id.into()));
        for (key, value) in fields {
            record.insert((*key).into(), value.clone());
        }

        if let Err(e) = self.append(Value::Object(record)).await {
            warn!(error = %e, event = event.as_str(), "Failed to append activity record");
        }
    }

    async fn append(&self, record: Value) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", record).as_bytes()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn appends_one_record_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let log = ActivityLog::new(dir.path().join("logs/activity.jsonl"));

        log.emit(ActivityEvent::StepStarted, "AUTH-1", &[("step", json!("plan"))])
            .await;
        log.emit(
            ActivityEvent::WorkerReaped,
            "AUTH-1",
            &[("outcome", json!("success"))],
        )
        .await;

        let content = std::fs::read_to_string(dir.path().join("logs/activity.jsonl")).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "step.started");
        assert_eq!(first["task_id"], "AUTH-1");
        assert_eq!(first["step"], "plan");
        assert!(first["ts"].is_string());

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "worker.reaped");
        assert_eq!(second["outcome"], "success");
    }
}
