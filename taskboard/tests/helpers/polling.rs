use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

const INITIAL_DELAY_MS: u64 = 50;
const MAX_DELAY_MS: u64 = 1_000;

/// Error returned when a polled condition never held.
#[derive(Debug)]
pub struct WaitError {
    what: String,
    attempts: u32,
    waited: Duration,
    last_content: Option<String>,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Timed out after {} attempts over {:?} waiting for {}. Last content: {}",
            self.attempts,
            self.waited,
            self.what,
            self.last_content
                .as_deref()
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .unwrap_or("<empty>")
        )
    }
}

impl std::error::Error for WaitError {}

/// Poll `check` with exponential backoff until it yields a value.
pub fn wait_until<T, F>(what: &str, timeout: Duration, mut check: F) -> Result<T, WaitError>
where
    F: FnMut() -> Result<T, Option<String>>,
{
    let start = Instant::now();
    let mut delay = Duration::from_millis(INITIAL_DELAY_MS);
    let mut attempts = 0;
    let mut last_content = None;

    loop {
        attempts += 1;
        match check() {
            Ok(value) => return Ok(value),
            Err(content) => last_content = content.or(last_content),
        }

        let remaining = timeout.saturating_sub(start.elapsed());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(delay.min(remaining));
        delay = (delay * 2).min(Duration::from_millis(MAX_DELAY_MS));
    }

    Err(WaitError {
        what: what.to_string(),
        attempts,
        waited: start.elapsed(),
        last_content,
    })
}

/// Poll a file until the predicate accepts its content.
pub fn wait_for_file_content<P, F>(path: P, predicate: F, timeout: Duration) -> Result<String, WaitError>
where
    P: AsRef<Path>,
    F: Fn(&str) -> bool,
{
    let path: PathBuf = path.as_ref().to_path_buf();
    wait_until(&path.display().to_string(), timeout, || match fs::read_to_string(&path) {
        Ok(content) if predicate(&content) => Ok(content),
        Ok(content) => Err(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Err(None),
        Err(err) => Err(Some(err.to_string())),
    })
}

/// Poll until `path` no longer exists.
pub fn wait_for_removal(path: &Path, timeout: Duration) -> Result<(), WaitError> {
    wait_until(&format!("removal of {}", path.display()), timeout, || {
        if path.exists() {
            Err(None)
        } else {
            Ok(())
        }
    })
}
