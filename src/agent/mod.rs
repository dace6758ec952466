//! The sub-agent seam: typed invocation of black-box agent processes.
//!
//! The orchestrator never interprets agent output streams. An agent is
//! invoked against a worker directory and communicates back through one
//! result file; unknown agent types are a configuration error.

mod invoker;
mod registry;

pub use invoker::{AgentInvoker, StepContext, SubprocessAgent};
pub use registry::AgentRegistry;
