use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::fs;

use crate::error::{Result, WiggumError};

use super::result::GateResult;

/// Re-run policy for a step whose agent emits the trigger gate (FIX).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    #[serde(default = "default_retry_on")]
    pub on: GateResult,
    pub max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fix_agent: Option<String>,
}

fn default_retry_on() -> GateResult {
    GateResult::Fix
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub agent: String,

    #[serde(default)]
    pub readonly: bool,

    #[serde(default = "default_true")]
    pub blocking: bool,

    /// Name of an environment variable that must equal the literal "true"
    /// for the step to run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled_by: Option<String>,

    /// A prior step whose persisted gate must be PASS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<String>,

    /// Arbitrary agent configuration, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
}

fn default_true() -> bool {
    true
}

impl Step {
    pub fn new(id: impl Into<String>, agent: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            agent: agent.into(),
            readonly: false,
            blocking: true,
            enabled_by: None,
            depends_on: None,
            config: None,
            retry: None,
        }
    }

    pub fn readonly(mut self) -> Self {
        self.readonly = true;
        self
    }

    pub fn non_blocking(mut self) -> Self {
        self.blocking = false;
        self
    }

    pub fn depends_on(mut self, step_id: impl Into<String>) -> Self {
        self.depends_on = Some(step_id.into());
        self
    }

    pub fn enabled_by(mut self, env_var: impl Into<String>) -> Self {
        self.enabled_by = Some(env_var.into());
        self
    }

    pub fn with_config(mut self, config: Value) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pipeline {
    pub name: String,
    pub steps: Vec<Step>,

    /// Pipeline-level agent configuration; step `config` overrides it key
    /// by key for that step's agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
}

impl Pipeline {
    /// The built-in pipeline used when the project supplies none.
    pub fn builtin_default() -> Self {
        Self {
            name: "default".to_string(),
            steps: vec![
                Step::new("plan", "planner").readonly(),
                Step::new("implement", "coder").depends_on("plan"),
                Step::new("test", "tester").with_retry(RetryPolicy {
                    on: GateResult::Fix,
                    max: 2,
                    fix_agent: Some("coder".to_string()),
                }),
                Step::new("review", "reviewer").readonly().non_blocking(),
            ],
            config: None,
        }
    }

    /// Load the project pipeline, falling back to the built-in default.
    pub async fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::builtin_default());
        }
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let pipeline: Self = serde_json::from_str(content)
            .map_err(|e| WiggumError::Pipeline(format!("invalid pipeline JSON: {}", e)))?;
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Structural validation: unique identifiers, `depends_on` referencing
    /// a strictly earlier step, retry policies naming a fix agent.
    pub fn validate(&self) -> Result<()> {
        if self.steps.is_empty() {
            return Err(WiggumError::Pipeline("pipeline has no steps".into()));
        }

        let mut seen: Vec<&str> = Vec::new();
        for step in &self.steps {
            if step.id.is_empty() {
                return Err(WiggumError::Pipeline("step with empty id".into()));
            }
            if seen.contains(&step.id.as_str()) {
                return Err(WiggumError::Pipeline(format!(
                    "duplicate step id: {}",
                    step.id
                )));
            }
            if let Some(dep) = &step.depends_on {
                if !seen.contains(&dep.as_str()) {
                    return Err(WiggumError::Pipeline(format!(
                        "step {} depends on {}, which is not an earlier step",
                        step.id, dep
                    )));
                }
            }
            if let Some(retry) = &step.retry {
                if retry.fix_agent.is_none() {
                    return Err(WiggumError::Pipeline(format!(
                        "step {} retry policy has no fix_agent",
                        step.id
                    )));
                }
            }
            seen.push(&step.id);
        }

        Ok(())
    }

    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_index(&self, id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s.id == id)
    }

    pub fn agent_types(&self) -> impl Iterator<Item = &str> {
        self.steps.iter().flat_map(|s| {
            std::iter::once(s.agent.as_str()).chain(
                s.retry
                    .as_ref()
                    .and_then(|r| r.fix_agent.as_deref())
                    .into_iter(),
            )
        })
    }

    /// The configuration the step's agent sees: pipeline-level config with
    /// the step's own object merged over it, unknown keys untouched.
    pub fn effective_config(&self, step: &Step) -> Value {
        match (&self.config, &step.config) {
            (None, None) => Value::Object(Default::default()),
            (Some(base), None) => base.clone(),
            (None, Some(own)) => own.clone(),
            (Some(base), Some(own)) => {
                let mut merged = base.clone();
                if let (Value::Object(merged_map), Value::Object(own_map)) = (&mut merged, own) {
                    for (key, value) in own_map {
                        merged_map.insert(key.clone(), value.clone());
                    }
                    merged
                } else {
                    own.clone()
                }
            }
        }
    }
}
