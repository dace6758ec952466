use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::utils::write_atomic;

/// Typed outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GateResult {
    Pass,
    Fail,
    Fix,
    Skip,
    Stop,
}

impl std::fmt::Display for GateResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Fix => "FIX",
            Self::Skip => "SKIP",
            Self::Stop => "STOP",
        };
        write!(f, "{}", name)
    }
}

/// What an agent reports back: the gate plus optional structured outputs
/// and errors. The file an agent writes is exactly this shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub gate_result: GateResult,

    #[serde(default)]
    pub outputs: Value,

    #[serde(default)]
    pub errors: Vec<String>,
}

impl StepResult {
    pub fn pass() -> Self {
        Self {
            gate_result: GateResult::Pass,
            outputs: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn skip() -> Self {
        Self {
            gate_result: GateResult::Skip,
            outputs: Value::Null,
            errors: Vec::new(),
        }
    }

    pub fn fail(errors: Vec<String>) -> Self {
        Self {
            gate_result: GateResult::Fail,
            outputs: Value::Null,
            errors,
        }
    }

    /// Synthesized when the agent exited without producing its file.
    pub fn missing_output() -> Self {
        Self::fail(vec!["missing output".to_string()])
    }
}

/// Per-step results under `<worker>/results/`, keyed by step identifier
/// with an epoch suffix so reruns never clobber history.
pub struct ResultStore {
    results_dir: PathBuf,
}

impl ResultStore {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
        }
    }

    pub fn path_for(&self, step_id: &str, epoch: u64) -> PathBuf {
        self.results_dir.join(format!("{}-{}.json", step_id, epoch))
    }

    pub async fn write(&self, step_id: &str, epoch: u64, result: &StepResult) -> Result<()> {
        tokio::fs::create_dir_all(&self.results_dir).await?;
        let path = self.path_for(step_id, epoch);
        write_atomic(&path, &serde_json::to_string_pretty(result)?).await
    }

    /// Most recent persisted result for a step, by epoch suffix. Empty or
    /// unparsable files count as absent: a result file is meaningful iff
    /// the step ran to completion.
    pub async fn latest(&self, step_id: &str) -> Option<(u64, StepResult)> {
        let mut best: Option<(u64, StepResult)> = None;
        let mut entries = tokio::fs::read_dir(&self.results_dir).await.ok()?;

        while let Ok(Some(entry)) = entries.next_entry().await {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let Some(epoch) = parse_result_name(name, step_id) else {
                continue;
            };
            if best.as_ref().is_some_and(|(e, _)| *e >= epoch) {
                continue;
            }
            let Ok(content) = tokio::fs::read_to_string(entry.path()).await else {
                continue;
            };
            if content.trim().is_empty() {
                continue;
            }
            if let Ok(result) = serde_json::from_str::<StepResult>(&content) {
                best = Some((epoch, result));
            }
        }

        best
    }

    pub async fn has_result(&self, step_id: &str) -> bool {
        self.latest(step_id).await.is_some()
    }
}

/// Extract the epoch from `<step>-<epoch>.json` for the given step.
fn parse_result_name(name: &str, step_id: &str) -> Option<u64> {
    let stem = name.strip_suffix(".json")?;
    let suffix = stem.strip_prefix(step_id)?.strip_prefix('-')?;
    suffix.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn gate_serde_uses_uppercase() {
        assert_eq!(serde_json::to_string(&GateResult::Pass).unwrap(), "\"PASS\"");
        let parsed: GateResult = serde_json::from_str("\"FIX\"").unwrap();
        assert_eq!(parsed, GateResult::Fix);
    }

    #[test]
    fn result_name_parsing() {
        assert_eq!(parse_result_name("test-1700000001.json", "test"), Some(1700000001));
        assert_eq!(parse_result_name("test-1.json", "other"), None);
        // Step ids that prefix each other must not collide.
        assert_eq!(parse_result_name("test-unit-5.json", "test"), None);
        assert_eq!(parse_result_name("test-unit-5.json", "test-unit"), Some(5));
    }

    #[tokio::test]
    async fn latest_picks_highest_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));

        store.write("test", 10, &StepResult::fail(vec!["boom".into()])).await.unwrap();
        store.write("test", 20, &StepResult::pass()).await.unwrap();
        store.write("plan", 30, &StepResult::skip()).await.unwrap();

        let (epoch, result) = store.latest("test").await.unwrap();
        assert_eq!(epoch, 20);
        assert_eq!(result.gate_result, GateResult::Pass);

        assert!(store.latest("implement").await.is_none());
    }

    #[tokio::test]
    async fn empty_file_counts_as_absent() {
        let dir = tempfile::tempdir().unwrap();
        let results = dir.path().join("results");
        std::fs::create_dir_all(&results).unwrap();
        std::fs::write(results.join("plan-5.json"), "").unwrap();

        let store = ResultStore::new(&results);
        assert!(store.latest("plan").await.is_none());
        assert!(!store.has_result("plan").await);
    }

    #[tokio::test]
    async fn outputs_pass_through() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path().join("results"));

        let mut result = StepResult::pass();
        result.outputs = json!({ "files_touched": ["src/a.rs"], "custom": true });
        store.write("implement", 1, &result).await.unwrap();

        let (_, read) = store.latest("implement").await.unwrap();
        assert_eq!(read.outputs["custom"], true);
    }
}
