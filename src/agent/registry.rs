use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AgentsConfig;
use crate::error::{Result, WiggumError};

use super::invoker::{AgentInvoker, SubprocessAgent};

/// Maps agent-type strings to invocation handlers. A step referencing a
/// type with no handler is a configuration error, never a silent pass.
#[derive(Default, Clone)]
pub struct AgentRegistry {
    handlers: HashMap<String, Arc<dyn AgentInvoker>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the production registry from configured subprocess specs.
    pub fn from_config(config: &AgentsConfig) -> Self {
        let mut registry = Self::new();
        for (agent_type, entry) in &config.agents {
            registry.register(
                agent_type,
                Arc::new(SubprocessAgent::new(&entry.command, entry.args.clone())),
            );
        }
        registry
    }

    pub fn register(&mut self, agent_type: impl Into<String>, invoker: Arc<dyn AgentInvoker>) {
        self.handlers.insert(agent_type.into(), invoker);
    }

    pub fn get(&self, agent_type: &str) -> Result<Arc<dyn AgentInvoker>> {
        self.handlers
            .get(agent_type)
            .cloned()
            .ok_or_else(|| WiggumError::UnknownAgent(agent_type.to_string()))
    }

    pub fn contains(&self, agent_type: &str) -> bool {
        self.handlers.contains_key(agent_type)
    }

    /// Verify every agent type a pipeline references has a handler.
    pub fn check_types<'a>(&self, types: impl Iterator<Item = &'a str>) -> Result<()> {
        for agent_type in types {
            if !self.contains(agent_type) {
                return Err(WiggumError::UnknownAgent(agent_type.to_string()));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::StepContext;
    use crate::config::AgentEntry;
    use async_trait::async_trait;

    struct NoopAgent;

    #[async_trait]
    impl AgentInvoker for NoopAgent {
        async fn invoke(&self, _ctx: &StepContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn unknown_type_is_config_error() {
        let registry = AgentRegistry::new();
        let err = match registry.get("planner") {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(err, WiggumError::UnknownAgent(_)));
    }

    #[test]
    fn registered_type_resolves() {
        let mut registry = AgentRegistry::new();
        registry.register("planner", Arc::new(NoopAgent));
        assert!(registry.get("planner").is_ok());
        assert!(registry.check_types(["planner"].into_iter()).is_ok());
        assert!(registry.check_types(["planner", "coder"].into_iter()).is_err());
    }

    #[test]
    fn from_config_registers_subprocess_specs() {
        let mut config = AgentsConfig::default();
        config.agents.insert(
            "coder".to_string(),
            AgentEntry {
                command: "run-coder".to_string(),
                args: vec!["--json".to_string()],
            },
        );

        let registry = AgentRegistry::from_config(&config);
        assert!(registry.contains("coder"));
        assert!(!registry.contains("planner"));
    }
}
