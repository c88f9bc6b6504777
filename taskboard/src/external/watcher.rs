// ChangeWatcher backed by notify
//
// One RecommendedWatcher per watched path. Callbacks run on notify's event
// thread; bursts of events inside the debounce window collapse into one call.

use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::domain::services::{ChangeCallback, ChangeWatcher};
use crate::domain::{DomainError, DomainResult};

const DEBOUNCE: Duration = Duration::from_millis(150);

#[derive(Default)]
pub struct NotifyChangeWatcher {
    watchers: Mutex<HashMap<PathBuf, RecommendedWatcher>>,
}

impl NotifyChangeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    fn watchers(&self) -> MutexGuard<'_, HashMap<PathBuf, RecommendedWatcher>> {
        self.watchers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ChangeWatcher for NotifyChangeWatcher {
    fn watch(&self, path: &Path, on_change: ChangeCallback) -> DomainResult<()> {
        let mut watchers = self.watchers();
        if watchers.contains_key(path) {
            return Ok(());
        }

        let last_fired: Mutex<Option<Instant>> = Mutex::new(None);
        let mut watcher = RecommendedWatcher::new(
            move |res: Result<notify::Event, notify::Error>| {
                let Ok(event) = res else {
                    return;
                };
                if !matches!(
                    event.kind,
                    EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
                ) {
                    return;
                }
                {
                    let mut last = last_fired.lock().unwrap_or_else(|e| e.into_inner());
                    if last.is_some_and(|at| at.elapsed() < DEBOUNCE) {
                        return;
                    }
                    *last = Some(Instant::now());
                }
                on_change();
            },
            Config::default(),
        )
        .map_err(|e| DomainError::external(format!("failed to create watcher: {e}")))?;

        watcher
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| DomainError::external(format!("failed to watch {}: {e}", path.display())))?;
        debug!(path = %path.display(), "Watching path");
        watchers.insert(path.to_path_buf(), watcher);
        Ok(())
    }

    fn unwatch(&self, path: &Path) -> DomainResult<()> {
        // Dropping the watcher stops it
        self.watchers().remove(path);
        Ok(())
    }

    fn close(&self) -> DomainResult<()> {
        self.watchers().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_change_invokes_callback_until_unwatched() {
        let dir = TempDir::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let watcher = NotifyChangeWatcher::new();
        watcher
            .watch(
                dir.path(),
                Box::new(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();

        std::fs::write(dir.path().join("main"), "abc").unwrap();
        crate::test_utils::assert_eventually_bool(
            "change callback",
            crate::test_utils::WAIT,
            crate::test_utils::TICK,
            || {
                let hits = hits.clone();
                async move { hits.load(Ordering::SeqCst) > 0 }
            },
        )
        .await;

        watcher.unwatch(dir.path()).unwrap();
        assert!(watcher.watchers().is_empty());
        watcher.close().unwrap();
    }
}
