use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;
use tracing::debug;

use crate::error::{Result, WiggumError};

/// Which locking primitive backs a [`FileLock`].
///
/// `Advisory` uses the platform's advisory byte-range lock (flock/LockFile).
/// `Lockfile` falls back to atomic create-new lockfiles for filesystems
/// where advisory locks are unreliable (some network mounts).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockBackend {
    #[default]
    Advisory,
    Lockfile,
}

/// Exclusive lock over a path, released on drop. Held only across short
/// read-modify-write sequences (the board rewrite, batch record updates).
pub struct FileLock {
    file: Option<File>,
    lockfile_path: Option<PathBuf>,
    backend: LockBackend,
}

impl FileLock {
    /// Acquire with the default backend, blocking up to `timeout`.
    pub fn acquire(path: &Path, timeout: Duration) -> Result<Self> {
        Self::acquire_with(path, timeout, LockBackend::default())
    }

    pub fn acquire_with(path: &Path, timeout: Duration, backend: LockBackend) -> Result<Self> {
        match backend {
            LockBackend::Advisory => Self::acquire_advisory(path, timeout),
            LockBackend::Lockfile => Self::acquire_lockfile(path, timeout),
        }
    }

    fn acquire_advisory(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;

        let deadline = Instant::now() + timeout;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => {
                    debug!(path = %path.display(), "Advisory lock acquired");
                    return Ok(Self {
                        file: Some(file),
                        lockfile_path: None,
                        backend: LockBackend::Advisory,
                    });
                }
                Err(_) if Instant::now() < deadline => {
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => {
                    return Err(WiggumError::LockAcquisition(format!(
                        "{}: {}",
                        path.display(),
                        e
                    )));
                }
            }
        }
    }

    fn acquire_lockfile(path: &Path, timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let deadline = Instant::now() + timeout;
        loop {
            match OpenOptions::new().create_new(true).write(true).open(path) {
                Ok(mut file) => {
                    use std::io::Write;
                    let _ = write!(file, "{}", std::process::id());
                    debug!(path = %path.display(), "Lockfile created");
                    return Ok(Self {
                        file: None,
                        lockfile_path: Some(path.to_path_buf()),
                        backend: LockBackend::Lockfile,
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Instant::now() >= deadline {
                        return Err(WiggumError::LockAcquisition(format!(
                            "{}: held by another process",
                            path.display()
                        )));
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn backend(&self) -> LockBackend {
        self.backend
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = fs2::FileExt::unlock(&file);
        }
        if let Some(path) = self.lockfile_path.take() {
            let _ = std::fs::remove_file(path);
        }
    }
}
