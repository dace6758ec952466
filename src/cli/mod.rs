//! Command-line interface definitions.
//!
//! Public surface: `init`, `run`, `status`, `clean`. The `worker` and
//! `monitor` subcommands are hidden: the scheduler re-invokes this binary
//! with them to run worker and violation-monitor child processes.

mod commands;
mod display;

pub use commands::{Cli, Commands};
pub use display::Display;
