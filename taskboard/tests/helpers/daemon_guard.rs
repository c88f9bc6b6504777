use super::polling::{wait_for_file_content, wait_until, WaitError};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;
use taskboard_lib::daemon::DaemonClient;

const READY_TIMEOUT: Duration = Duration::from_secs(5);

/// RAII wrapper that ensures the daemon process is cleaned up.
pub struct DaemonGuard {
    child: Child,
    dir: PathBuf,
}

impl DaemonGuard {
    /// Start the compiled daemon with every path under `dir`.
    pub fn start(dir: &Path) -> Result<Self, DaemonError> {
        let daemon_bin = find_daemon_binary().ok_or(DaemonError::BinaryNotFound)?;

        let child = Command::new(&daemon_bin)
            .env("TASKBOARD_DAEMON_DIR", dir)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(DaemonError::SpawnFailed)?;

        let guard = Self {
            child,
            dir: dir.to_path_buf(),
        };
        println!("Started taskboard-daemon (pid {}) in {}", guard.pid(), dir.display());

        guard.wait_for_ready().map_err(DaemonError::ReadyTimeout)?;
        Ok(guard)
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn client(&self) -> DaemonClient {
        DaemonClient::new(&self.socket_path())
    }

    pub fn socket_path(&self) -> PathBuf {
        self.dir.join("daemon.sock")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.join("daemon.pid")
    }

    fn wait_for_ready(&self) -> Result<(), WaitError> {
        let pid = self.pid();
        wait_for_file_content(
            self.pid_file(),
            |content| content.trim().parse::<u32>() == Ok(pid),
            READY_TIMEOUT,
        )?;
        let client = self.client();
        wait_until("daemon ping", READY_TIMEOUT, || client.ping().map_err(|e| Some(e.to_string())))
    }

    /// SIGTERM and wait for exit.
    #[cfg(unix)]
    pub fn terminate(mut self) -> std::io::Result<std::process::ExitStatus> {
        unsafe {
            libc::kill(self.child.id() as i32, libc::SIGTERM);
        }
        self.child.wait()
    }
}

impl Drop for DaemonGuard {
    fn drop(&mut self) {
        if let Ok(Some(_)) = self.child.try_wait() {
            return;
        }
        if let Err(err) = self.child.kill() {
            eprintln!("Failed to terminate taskboard-daemon pid {}: {}", self.child.id(), err);
            return;
        }
        let _ = self.child.wait();
    }
}

fn find_daemon_binary() -> Option<PathBuf> {
    if let Some(path) = option_env!("CARGO_BIN_EXE_taskboard-daemon") {
        return Some(PathBuf::from(path));
    }

    let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    ["../target/debug", "../target/release", "target/debug"]
        .iter()
        .map(|dir| manifest_dir.join(dir).join("taskboard-daemon"))
        .find(|path| path.exists())
}

/// Errors that can occur when starting the daemon for tests.
#[derive(Debug)]
pub enum DaemonError {
    BinaryNotFound,
    SpawnFailed(std::io::Error),
    ReadyTimeout(WaitError),
}

impl DaemonError {
    pub fn is_missing_binary(&self) -> bool {
        matches!(self, Self::BinaryNotFound)
    }
}

impl fmt::Display for DaemonError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BinaryNotFound => write!(
                f,
                "taskboard-daemon binary not found. Run `cargo build` before executing integration tests."
            ),
            Self::SpawnFailed(err) => write!(f, "failed to spawn daemon: {}", err),
            Self::ReadyTimeout(err) => write!(f, "daemon never became ready: {}", err),
        }
    }
}

impl std::error::Error for DaemonError {}
