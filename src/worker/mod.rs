//! Everything that happens around one task attempt: the isolated worker
//! directory, its lifecycle from worktree creation to reap, the violation
//! monitor that polices the workspace boundary, and serial batch
//! coordination.

mod batch;
mod layout;
mod lifecycle;
mod monitor;

pub use batch::{BatchContext, BatchCoordinator, BatchRecord, BatchStatus};
pub use layout::{GitState, WorkerDir, WorkerKind, WorkerOutcome, WorkerResult};
pub use lifecycle::WorkerLifecycle;
pub use monitor::{run_monitor, spawn_monitor};
