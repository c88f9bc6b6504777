//! Polling assertions for tests that wait on background tasks
//!
//! Managers, the event bus and subscriber streams all act asynchronously, so
//! tests poll for the expected state instead of sleeping a fixed amount.

use std::fmt::Display;
use std::future::Future;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::domain::services::{SessionTracker, VcsProvider};
use crate::domain::session::Session;
use crate::domain::DomainResult;

/// Default wait for daemon-side effects.
pub const WAIT: Duration = Duration::from_secs(3);
/// Default pause between polls.
pub const TICK: Duration = Duration::from_millis(20);

/// Poll `probe` until it yields `Ok`, panicking with the last error once
/// `timeout` has elapsed.
///
/// ```rust,ignore
/// let board = assert_eventually("board to be created", WAIT, TICK, || async {
///     boards.find_by_id("proj/default")
/// })
/// .await;
/// ```
pub async fn assert_eventually<F, Fut, T, E>(
    what: &str,
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> T
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let started = Instant::now();
    let mut attempts = 0u32;
    loop {
        attempts += 1;
        let last_error = match probe().await {
            Ok(value) => return value,
            Err(err) => err.to_string(),
        };
        if started.elapsed() >= timeout {
            panic!(
                "Timeout waiting for {what} after {attempts} attempts ({:?}); last error: {last_error}",
                started.elapsed()
            );
        }
        tokio::time::sleep(interval).await;
    }
}

/// Boolean form of [`assert_eventually`].
pub async fn assert_eventually_bool<F, Fut>(what: &str, timeout: Duration, interval: Duration, mut probe: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    assert_eventually(what, timeout, interval, || {
        let fut = probe();
        async move {
            if fut.await {
                Ok(())
            } else {
                Err("condition still false")
            }
        }
    })
    .await
}

/// In-memory repository rooted at `/repo`.
#[derive(Default)]
pub struct FakeRepo {
    pub current: Mutex<String>,
    pub branches: Mutex<Vec<String>>,
}

impl FakeRepo {
    pub fn with(current: &str, branches: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            current: Mutex::new(current.to_string()),
            branches: Mutex::new(branches.iter().map(|b| b.to_string()).collect()),
        })
    }
}

impl VcsProvider for FakeRepo {
    fn is_repository(&self, path: &Path) -> bool {
        path.starts_with("/repo")
    }
    fn get_repository_root(&self, _: &Path) -> DomainResult<String> {
        Ok("/repo".into())
    }
    fn get_current_branch(&self, _: &Path) -> DomainResult<String> {
        Ok(self.current.lock().unwrap().clone())
    }
    fn list_branches(&self, _: &Path) -> DomainResult<Vec<String>> {
        Ok(self.branches.lock().unwrap().clone())
    }
    fn get_refs_path(&self, _: &Path) -> DomainResult<String> {
        Ok("/repo/.git/refs/heads".into())
    }
    fn branch_exists(&self, _: &Path, branch: &str) -> bool {
        self.branches.lock().unwrap().iter().any(|b| b == branch)
    }
    fn checkout_branch(&self, _: &Path, _: &str) -> DomainResult<()> {
        Ok(())
    }
    fn create_and_checkout_branch(&self, _: &Path, _: &str) -> DomainResult<()> {
        Ok(())
    }
}

/// Scriptable terminal sessions.
#[derive(Default)]
pub struct FakeSessions {
    pub sessions: Mutex<Vec<Session>>,
    pub active: Mutex<Option<String>>,
}

impl FakeSessions {
    pub fn with(sessions: &[(&str, &str)], active: Option<&str>) -> Arc<Self> {
        let fake = Arc::new(Self::default());
        fake.set(sessions, active);
        fake
    }

    pub fn set(&self, sessions: &[(&str, &str)], active: Option<&str>) {
        *self.sessions.lock().unwrap() = sessions
            .iter()
            .map(|(name, dir)| Session::new(name, dir, "tmux").unwrap())
            .collect();
        *self.active.lock().unwrap() = active.map(str::to_string);
    }
}

impl SessionTracker for FakeSessions {
    fn is_available(&self) -> bool {
        true
    }
    fn list_sessions(&self) -> DomainResult<Vec<Session>> {
        Ok(self.sessions.lock().unwrap().clone())
    }
    fn get_active_session(&self) -> DomainResult<Option<Session>> {
        let active = self.active.lock().unwrap().clone();
        Ok(active.and_then(|name| {
            self.sessions
                .lock()
                .unwrap()
                .iter()
                .find(|s| s.name == name)
                .cloned()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_returns_value_once_probe_succeeds() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();
        let value = assert_eventually("third poll", WAIT, Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move {
                match counter.fetch_add(1, Ordering::SeqCst) {
                    n if n >= 2 => Ok(n),
                    n => Err(format!("only {n} polls")),
                }
            }
        })
        .await;
        assert_eq!(value, 2);
        assert_eq!(polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    #[should_panic(expected = "Timeout waiting for nothing")]
    async fn test_panics_after_timeout() {
        assert_eventually("nothing", Duration::from_millis(60), Duration::from_millis(10), || async {
            Err::<(), _>("never")
        })
        .await;
    }

    #[tokio::test]
    async fn test_bool_variant() {
        let flips = Arc::new(AtomicUsize::new(0));
        let counter = flips.clone();
        assert_eventually_bool("flag", WAIT, Duration::from_millis(5), move || {
            let counter = counter.clone();
            async move { counter.fetch_add(1, Ordering::SeqCst) >= 1 }
        })
        .await;
    }
}
