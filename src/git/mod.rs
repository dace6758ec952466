//! Subprocess access to git and gh. The orchestrator's whole VCS surface
//! is the handful of calls documented here: worktree add/remove, commit,
//! diff, status, push, and PR creation/merge.

mod runner;

pub use runner::{GhRunner, GitRunner};
