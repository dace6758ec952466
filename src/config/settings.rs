use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

use crate::error::{Result, WiggumError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WiggumConfig {
    pub scheduler: SchedulerConfig,
    pub pipeline: PipelineConfig,
    pub agents: AgentsConfig,
    pub git: GitConfig,
    pub monitor: MonitorConfig,
    pub batch: BatchConfig,
}

impl WiggumConfig {
    pub async fn load(ralph_dir: &Path) -> Result<Self> {
        let config_path = ralph_dir.join("config.toml");
        let mut config: Self = if config_path.exists() {
            let content = fs::read_to_string(&config_path).await?;
            toml::from_str(&content)?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, ralph_dir: &Path) -> Result<()> {
        self.validate()?;
        let config_path = ralph_dir.join("config.toml");
        let content =
            toml::to_string_pretty(self).map_err(|e| WiggumError::Config(e.to_string()))?;
        fs::write(&config_path, content).await?;
        Ok(())
    }

    /// Environment variables override the file-configured scheduling knobs.
    pub fn apply_env_overrides(&mut self) {
        fn read<T: std::str::FromStr>(name: &str) -> Option<T> {
            match std::env::var(name) {
                Ok(v) => match v.parse() {
                    Ok(parsed) => Some(parsed),
                    Err(_) => {
                        warn!(var = name, value = %v, "Ignoring unparsable environment override");
                        None
                    }
                },
                Err(_) => None,
            }
        }

        if let Some(v) = read("WIGGUM_MAX_WORKERS") {
            self.scheduler.max_workers = v;
        }
        if let Some(v) = read("WIGGUM_AGING_FACTOR") {
            self.scheduler.aging_factor = v;
        }
        if let Some(v) = read("WIGGUM_SIBLING_WIP_PENALTY") {
            self.scheduler.sibling_wip_penalty = v;
        }
        if let Some(v) = read("WIGGUM_PLAN_BONUS") {
            self.scheduler.plan_bonus = v;
        }
        if let Some(v) = read("WIGGUM_DEP_BONUS_PER_TASK") {
            self.scheduler.dep_bonus_per_task = v;
        }
    }

    /// Validate configuration values for consistency and safety.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();
        let mut push = |msg: &str| errors.push(msg.to_string());

        if self.scheduler.max_workers == 0 {
            push("scheduler.max_workers must be greater than 0");
        }
        if self.scheduler.tick_interval_ms == 0 {
            push("scheduler.tick_interval_ms must be greater than 0");
        }
        if self.scheduler.shutdown_grace_secs == 0 {
            push("scheduler.shutdown_grace_secs must be greater than 0");
        }
        if self.scheduler.max_fix_retries == 0 {
            push("scheduler.max_fix_retries must be greater than 0");
        }

        if self.pipeline.step_timeout_secs == 0 {
            push("pipeline.step_timeout_secs must be greater than 0");
        }
        if self.pipeline.max_agent_turns == 0 {
            push("pipeline.max_agent_turns must be greater than 0");
        }

        if self.monitor.interval_secs == 0 {
            push("monitor.interval_secs must be greater than 0");
        }

        if self.batch.poll_interval_ms == 0 {
            push("batch.poll_interval_ms must be greater than 0");
        }

        for (name, entry) in &self.agents.agents {
            if entry.command.is_empty() {
                errors.push(format!("agents.{}.command must not be empty", name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(WiggumError::Config(errors.join("; ")))
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on concurrent workers; fix and resolve workers count
    /// against it.
    pub max_workers: usize,
    pub tick_interval_ms: u64,
    pub aging_factor: i64,
    pub plan_bonus: i64,
    pub dep_bonus_per_task: i64,
    pub sibling_wip_penalty: i64,
    pub max_fix_retries: u32,
    pub shutdown_grace_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            tick_interval_ms: 1500,
            aging_factor: 7,
            plan_bonus: 15_000,
            dep_bonus_per_task: 7_000,
            sibling_wip_penalty: 20_000,
            max_fix_retries: 2,
            shutdown_grace_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Pipeline definition file, relative to the `.ralph` directory.
    /// Falls back to the built-in default pipeline when absent.
    pub definition: String,
    pub step_timeout_secs: u64,
    pub max_agent_turns: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            definition: "pipeline.json".to_string(),
            step_timeout_secs: 3600,
            max_agent_turns: 80,
        }
    }
}

/// One invocable agent: the subprocess to run for steps bound to this type.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentEntry {
    pub command: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentsConfig {
    /// agent-type string -> subprocess spec. A step referencing a type not
    /// present here is a configuration error, never a silent pass.
    pub agents: HashMap<String, AgentEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub base_branch: String,
    pub branch_prefix: String,
    pub remote: String,
    /// When true, the scheduler trial-merges successful branches at reap and
    /// spawns a resolve worker on conflict.
    pub auto_merge: bool,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            base_branch: "main".to_string(),
            branch_prefix: "wiggum".to_string(),
            remote: "origin".to_string(),
            auto_merge: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub interval_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { interval_secs: 30 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub poll_interval_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProjectPaths {
    pub root: PathBuf,
    pub ralph_dir: PathBuf,
    pub kanban_path: PathBuf,
    pub workers_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub plans_dir: PathBuf,
    pub batches_dir: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: PathBuf) -> Self {
        let ralph_dir = root.join(".ralph");

        Self {
            kanban_path: ralph_dir.join("kanban.md"),
            workers_dir: ralph_dir.join("workers"),
            logs_dir: ralph_dir.join("logs"),
            plans_dir: ralph_dir.join("plans"),
            batches_dir: ralph_dir.join("batches"),
            root,
            ralph_dir,
        }
    }

    pub async fn ensure_dirs(&self) -> Result<()> {
        let dirs = [
            &self.ralph_dir,
            &self.workers_dir,
            &self.logs_dir,
            &self.plans_dir,
            &self.batches_dir,
        ];

        for dir in dirs {
            fs::create_dir_all(dir).await?;
        }

        Ok(())
    }

    pub fn activity_log(&self) -> PathBuf {
        self.logs_dir.join("activity.jsonl")
    }

    pub fn aging_file(&self) -> PathBuf {
        self.ralph_dir.join("aging.json")
    }

    pub fn board_lock(&self) -> PathBuf {
        self.ralph_dir.join("kanban.lock")
    }

    pub fn pipeline_file(&self, config: &WiggumConfig) -> PathBuf {
        self.ralph_dir.join(&config.pipeline.definition)
    }

    pub fn plan_doc(&self, task_id: &str) -> PathBuf {
        self.plans_dir.join(format!("{}.md", task_id))
    }

    pub fn batch_record(&self, batch_id: &str) -> PathBuf {
        self.batches_dir.join(format!("{}.json", batch_id))
    }
}
