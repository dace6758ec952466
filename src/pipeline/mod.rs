//! Pipeline definitions and the step runner that drives a worker through
//! its agent sequence.

mod definition;
mod result;
mod runner;

pub use definition::{Pipeline, RetryPolicy, Step};
pub use result::{GateResult, ResultStore, StepResult};
pub use runner::{PipelineOutcome, PipelineReport, PipelineRunner, StepRun, StepState};
