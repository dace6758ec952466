//! Small shared helpers.

mod fs;

pub use fs::{epoch_now, write_atomic};
