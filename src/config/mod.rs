//! Configuration types and loading.
//!
//! Provides all configuration structures for wiggum:
//! - `WiggumConfig`: Top-level configuration with validation and
//!   environment overrides for the scheduling knobs
//! - `ProjectPaths`: the `.ralph/` directory layout

mod settings;

pub use settings::{
    AgentEntry, AgentsConfig, BatchConfig, GitConfig, MonitorConfig, PipelineConfig, ProjectPaths,
    SchedulerConfig, WiggumConfig,
};
