// Session manager: polls the session tracker and keeps boards in sync
//
// Each poll syncs every session, records the attached one and, when the
// active session's strategy asks for it, watches a path so changes re-sync
// without waiting for the next poll. A path is watched at most once.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{info, warn};

use super::sync::SessionSync;
use crate::domain::services::ChangeWatcher;
use crate::domain::session::Session;
use crate::worker::Worker;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub watch_for_changes: bool,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
            watch_for_changes: true,
        }
    }
}

#[derive(Default)]
struct TrackerState {
    active: Option<Session>,
    watched: HashSet<PathBuf>,
}

struct Inner {
    sync: SessionSync,
    watcher: Option<Arc<dyn ChangeWatcher>>,
    config: SessionManagerConfig,
    state: Mutex<TrackerState>,
}

pub struct SessionManager {
    inner: Arc<Inner>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl SessionManager {
    pub fn new(sync: SessionSync, watcher: Option<Arc<dyn ChangeWatcher>>, config: SessionManagerConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                sync,
                watcher,
                config,
                state: Mutex::new(TrackerState::default()),
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    pub fn sync(&self) -> &SessionSync {
        &self.inner.sync
    }

    pub fn active_session(&self) -> Option<Session> {
        self.inner.state().active.clone()
    }

    pub fn watched_paths(&self) -> Vec<PathBuf> {
        self.inner.state().watched.iter().cloned().collect()
    }

    /// Poll once immediately, then every poll interval. Does nothing when
    /// disabled or when no tracker is available.
    pub async fn start(&self) {
        if !self.inner.config.enabled {
            info!("Session tracking is disabled");
            return;
        }
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        let available = {
            let sync = self.inner.sync.clone();
            tokio::task::spawn_blocking(move || sync.tracker().is_available())
                .await
                .unwrap_or(false)
        };
        if !available {
            info!("Session tracker is not available (tmux may not be running)");
            return;
        }

        info!(
            "Starting session tracking (poll interval: {}s)",
            self.inner.config.poll_interval.as_secs()
        );
        Inner::poll_blocking(self.inner.clone()).await;

        let inner = self.inner.clone();
        *worker = Some(Worker::spawn_periodic(
            "sessions",
            self.inner.config.poll_interval,
            move || Inner::poll_blocking(inner.clone()),
        ));
    }

    /// Stop polling and release the change watcher.
    pub async fn stop(&self) {
        let Some(worker) = self.worker.lock().await.take() else {
            return;
        };
        worker.shutdown().await;
        if let Some(watcher) = &self.inner.watcher {
            if let Err(err) = watcher.close() {
                warn!(error = %err, "Failed to close change watcher");
            }
        }
        info!("Session tracking stopped");
    }
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, TrackerState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn poll_blocking(inner: Arc<Self>) {
        if let Err(err) = tokio::task::spawn_blocking(move || inner.poll()).await {
            warn!(error = %err, "Session poll panicked");
        }
    }

    fn poll(&self) {
        let active = match self.sync.track() {
            Ok(active) => active,
            Err(err) => {
                warn!(error = %err, "Error tracking sessions");
                return;
            }
        };

        let previous = std::mem::replace(&mut self.state().active, active.clone());
        match (&previous, &active) {
            (None, Some(now)) => {
                info!("Active session detected: {} (working dir: {})", now.name, now.working_dir);
            }
            (Some(before), None) => info!("Active session ended: {}", before.name),
            (Some(before), Some(now)) if before.name != now.name => {
                info!(
                    "Active session changed: {} -> {} (working dir: {})",
                    before.name, now.name, now.working_dir
                );
            }
            _ => {}
        }

        if self.config.watch_for_changes {
            if let Some(session) = active {
                self.watch_session(session);
            }
        }
    }

    fn watch_session(&self, session: Session) {
        let Some(watcher) = &self.watcher else {
            return;
        };
        let Some(strategy) = self.sync.strategy_for(&session) else {
            return;
        };
        if !strategy.should_watch() {
            return;
        }
        let Some(path) = strategy.watch_path(&session) else {
            return;
        };
        if self.state().watched.contains(&path) {
            return;
        }

        let sync = self.sync.clone();
        let shown = path.display().to_string();
        let callback = Box::new(move || {
            info!("File changes detected in: {}", shown);
            if let Err(err) = sync.sync_session(&session) {
                warn!(session = %session.name, error = %err, "Error syncing session after file change");
            }
        });
        if let Err(err) = watcher.watch(&path, callback) {
            warn!(path = %path.display(), error = %err, "Error setting up watcher");
            return;
        }
        info!("Now watching for changes in: {}", path.display());
        self.state().watched.insert(path);
    }
}
