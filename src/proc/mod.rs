//! Platform capabilities the scheduler is written against: process
//! liveness and termination, and advisory file locking. Each capability
//! has OS-specific backends behind one interface.

mod lock;
mod process;

pub use lock::{FileLock, LockBackend};
pub use process::{is_process_running, terminate_with_grace};
