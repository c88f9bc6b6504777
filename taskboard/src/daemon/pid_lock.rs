// Single-instance guard: an exclusively locked PID file
//
// A recorded PID that is still alive refuses the lock. A dead one is stale
// and gets replaced.

use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PidLockError {
    #[error("daemon already running (pid {0})")]
    AlreadyRunning(u32),

    #[error("failed to write lock file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Held for the daemon's lifetime; the file is removed on release or drop.
#[derive(Debug)]
pub struct PidLock {
    path: PathBuf,
    file: Option<File>,
}

impl PidLock {
    pub fn acquire(path: &Path) -> Result<Self, PidLockError> {
        let io_err = |source: std::io::Error| PidLockError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(pid) = read_pid(path) {
            if pid != std::process::id() && is_process_running(pid) {
                return Err(PidLockError::AlreadyRunning(pid));
            }
            debug!(pid, "Replacing stale lock file");
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(io_err)?;

        if file.try_lock_exclusive().is_err() {
            // Another handle holds it; report whoever wrote the file
            let mut contents = String::new();
            let _ = file.read_to_string(&mut contents);
            let pid = contents.trim().parse().unwrap_or_else(|_| std::process::id());
            return Err(PidLockError::AlreadyRunning(pid));
        }

        file.set_len(0).map_err(io_err)?;
        file.seek(SeekFrom::Start(0)).map_err(io_err)?;
        write!(file, "{}", std::process::id()).map_err(io_err)?;
        file.flush().map_err(io_err)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unlock and remove the file.
    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let _ = FileExt::unlock(&file);
        drop(file);
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %e, "Failed to remove lock file");
            }
        }
    }
}

impl Drop for PidLock {
    fn drop(&mut self) {
        self.unlock();
    }
}

fn read_pid(path: &Path) -> Option<u32> {
    std::fs::read_to_string(path).ok().and_then(|s| s.trim().parse().ok())
}

/// Probe with signal 0. EPERM still means the process exists.
#[cfg(unix)]
pub fn is_process_running(pid: u32) -> bool {
    if unsafe { libc::kill(pid as i32, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
pub fn is_process_running(_pid: u32) -> bool {
    false
}
