// Time tracking: manual timers plus auto timers inferred from the active session
//
// Timers are keyed by task id when a task is given, otherwise by project id.
// A manual timer owns its key: auto tracking never starts a timer on a key
// with a running manual timer, and starting a manual timer stops any auto
// timer on that key.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::domain::services::{SessionTracker, VcsProvider};
use crate::domain::task_id::TaskId;
use crate::domain::time_log::TimeLog;
use crate::domain::values::TimeLogSource;
use crate::domain::{DomainError, DomainResult};
use crate::store::{ProjectRepository, TimeLogRepository};
use crate::worker::Worker;

static BRANCH_TASK_RES: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"^(?:feature|bugfix|fix|hotfix|chore|refactor)/([A-Z]{3}-\d+-[a-z0-9-]+)")
            .expect("valid prefixed branch regex"),
        Regex::new(r"([A-Z]{3}-\d+-[a-z0-9-]+)").expect("valid branch task regex"),
    ]
});

/// Task id embedded in a branch name such as `feature/ABC-012-login-form`.
pub fn task_id_from_branch(branch: &str) -> Option<TaskId> {
    BRANCH_TASK_RES.iter().find_map(|re| {
        re.captures(branch)
            .and_then(|caps| caps[1].parse::<TaskId>().ok())
    })
}

pub fn timer_key(project_id: &str, task_id: Option<&TaskId>) -> String {
    task_id.map_or_else(|| project_id.to_string(), ToString::to_string)
}

#[derive(Debug, Clone)]
pub struct TimeTrackingConfig {
    pub enabled: bool,
    pub auto_track: bool,
    pub poll_interval: Duration,
}

impl Default for TimeTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            auto_track: true,
            poll_interval: Duration::from_secs(5),
        }
    }
}

/// Filters for `list_time_logs`, applied in order of specificity: task,
/// then project with range, then project. No filter lists running logs.
#[derive(Debug, Clone, Default)]
pub struct TimeLogQuery {
    pub project_id: Option<String>,
    pub task_id: Option<TaskId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    project_id: String,
    task_id: Option<TaskId>,
}

#[derive(Default)]
struct Timers {
    manual: HashMap<String, TimeLog>,
    auto: HashMap<String, TimeLog>,
    current: Option<Identity>,
}

struct Inner {
    logs: Arc<dyn TimeLogRepository>,
    projects: Arc<dyn ProjectRepository>,
    tracker: Option<Arc<dyn SessionTracker>>,
    vcs: Option<Arc<dyn VcsProvider>>,
    config: TimeTrackingConfig,
    timers: Mutex<Timers>,
}

pub struct TimeTrackingManager {
    inner: Arc<Inner>,
    worker: tokio::sync::Mutex<Option<Worker>>,
}

impl TimeTrackingManager {
    /// Running manual timers left by a previous daemon are adopted; its
    /// auto-tracked logs are closed at construction time.
    pub fn new(
        logs: Arc<dyn TimeLogRepository>,
        projects: Arc<dyn ProjectRepository>,
        tracker: Option<Arc<dyn SessionTracker>>,
        vcs: Option<Arc<dyn VcsProvider>>,
        config: TimeTrackingConfig,
    ) -> Self {
        let mut timers = Timers::default();
        match logs.list_running() {
            Ok(running) => {
                let now = Utc::now();
                for mut log in running {
                    if log.source == TimeLogSource::Timer {
                        timers
                            .manual
                            .insert(timer_key(&log.project_id, log.task_id.as_ref()), log);
                        continue;
                    }
                    // Auto logs are re-opened by the next poll if still relevant
                    let closed = log.stop(now.max(log.start_time)).and_then(|_| logs.save(&log));
                    match closed {
                        Ok(()) => info!(log = %log.id, project = %log.project_id, "Closed orphaned auto timer"),
                        Err(err) => warn!(log = %log.id, error = %err, "Failed to close orphaned auto timer"),
                    }
                }
            }
            Err(err) => warn!(error = %err, "Could not load running timers"),
        }
        Self {
            inner: Arc::new(Inner {
                logs,
                projects,
                tracker,
                vcs,
                config,
                timers: Mutex::new(timers),
            }),
            worker: tokio::sync::Mutex::new(None),
        }
    }

    // ------------------------------------------------------------------------
    // Manual operations
    // ------------------------------------------------------------------------

    /// Start a manual timer, or return the one already running on the key.
    pub fn start_timer(&self, project_id: &str, task_id: Option<TaskId>, description: &str) -> DomainResult<TimeLog> {
        if project_id.trim().is_empty() {
            return Err(DomainError::EmptyProjectId);
        }
        let key = timer_key(project_id, task_id.as_ref());
        let mut timers = self.inner.timers();
        if let Some(existing) = timers.manual.get(&key).filter(|l| l.is_running()) {
            return Ok(existing.clone());
        }

        let now = Utc::now();
        if let Some(mut auto) = timers.auto.remove(&key) {
            self.inner.finish(&mut auto, now);
        }
        let log = TimeLog::start(project_id, task_id, TimeLogSource::Timer, now, description);
        self.inner.logs.save(&log)?;
        timers.manual.insert(key.clone(), log.clone());
        info!("Started timer for {}", key);
        Ok(log)
    }

    pub fn stop_timer(&self, project_id: &str, task_id: Option<&TaskId>) -> DomainResult<TimeLog> {
        let key = timer_key(project_id, task_id);
        let mut timers = self.inner.timers();
        let mut log = timers
            .manual
            .get(&key)
            .filter(|l| l.is_running())
            .cloned()
            .ok_or_else(|| DomainError::TimeLogNotFound(key.clone()))?;
        log.stop(Utc::now())?;
        self.inner.logs.save(&log)?;
        timers.manual.remove(&key);
        info!("Stopped timer for {} (duration: {}s)", key, log.duration_secs);
        Ok(log)
    }

    /// Running manual and auto timers.
    pub fn active_timers(&self) -> Vec<TimeLog> {
        let timers = self.inner.timers();
        let mut active: Vec<TimeLog> = timers
            .manual
            .values()
            .chain(timers.auto.values())
            .filter(|l| l.is_running())
            .cloned()
            .collect();
        active.sort_by_key(|l| l.start_time);
        active
    }

    /// Record finished work after the fact.
    pub fn add_manual_entry(
        &self,
        project_id: &str,
        task_id: Option<TaskId>,
        start_time: DateTime<Utc>,
        duration: ChronoDuration,
        description: &str,
    ) -> DomainResult<TimeLog> {
        if project_id.trim().is_empty() {
            return Err(DomainError::EmptyProjectId);
        }
        let mut log = TimeLog::start(project_id, task_id, TimeLogSource::Manual, start_time, description);
        log.set_duration(duration)?;
        self.inner.logs.save(&log)?;
        Ok(log)
    }

    pub fn list_time_logs(&self, query: &TimeLogQuery) -> DomainResult<Vec<TimeLog>> {
        let logs = &self.inner.logs;
        if let Some(task_id) = &query.task_id {
            return logs.list_by_task(task_id);
        }
        match (query.project_id.as_deref().filter(|p| !p.is_empty()), query.from, query.to) {
            (Some(project), from, to) if from.is_some() || to.is_some() => logs.list_by_project_in_range(
                project,
                from.unwrap_or(DateTime::<Utc>::MIN_UTC),
                to.unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
            (Some(project), _, _) => logs.list_by_project(project),
            (None, _, _) => logs.list_running(),
        }
    }

    // ------------------------------------------------------------------------
    // Auto tracking
    // ------------------------------------------------------------------------

    /// One auto-tracking decision. Public so callers can force a poll.
    pub fn sync_auto(&self) {
        self.inner.sync_auto();
    }

    /// Poll the active session until stopped. Needs a session tracker.
    pub async fn start(&self) {
        if !self.inner.config.enabled {
            info!("Time tracking is disabled");
            return;
        }
        let Some(tracker) = self.inner.tracker.clone() else {
            info!("Session tracker not available, time tracking idle");
            return;
        };
        let mut worker = self.worker.lock().await;
        if worker.is_some() {
            return;
        }
        if !tokio::task::spawn_blocking(move || tracker.is_available())
            .await
            .unwrap_or(false)
        {
            info!("Session tracker not available, time tracking idle");
            return;
        }

        info!("Starting time tracking");
        Inner::sync_blocking(self.inner.clone()).await;
        let inner = self.inner.clone();
        *worker = Some(Worker::spawn_periodic(
            "time-tracking",
            self.inner.config.poll_interval,
            move || Inner::sync_blocking(inner.clone()),
        ));
    }

    /// Stop polling and close every running auto timer.
    pub async fn stop(&self) {
        if let Some(worker) = self.worker.lock().await.take() {
            worker.shutdown().await;
        }
        let inner = self.inner.clone();
        let flushed = tokio::task::spawn_blocking(move || inner.pause_auto()).await;
        if let Err(err) = flushed {
            warn!(error = %err, "Failed to flush auto timers");
        }
    }
}

impl Inner {
    fn timers(&self) -> MutexGuard<'_, Timers> {
        self.timers.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn sync_blocking(inner: Arc<Self>) {
        if let Err(err) = tokio::task::spawn_blocking(move || inner.sync_auto()).await {
            warn!(error = %err, "Time tracking poll panicked");
        }
    }

    fn finish(&self, log: &mut TimeLog, at: DateTime<Utc>) {
        if log.stop(at).is_ok() {
            if let Err(err) = self.logs.save(log) {
                warn!(log = %log.id, error = %err, "Failed to save stopped timer");
            }
        }
    }

    fn pause_auto(&self) {
        let mut timers = self.timers();
        self.pause_locked(&mut timers);
    }

    fn pause_locked(&self, timers: &mut Timers) {
        let now = Utc::now();
        for (key, mut log) in timers.auto.drain() {
            if log.is_running() {
                self.finish(&mut log, now);
                info!("Auto-paused timer for {}", key);
            }
        }
        timers.current = None;
    }

    /// Active session working dir -> project (exact path) -> task from branch.
    fn detect(&self) -> Option<Identity> {
        let session = self.tracker.as_ref()?.get_active_session().ok()??;
        if session.working_dir.is_empty() {
            return None;
        }
        let project = self.projects.find_by_working_dir(&session.working_dir).ok()??;
        let task_id = self.vcs.as_ref().and_then(|vcs| {
            vcs.get_current_branch(Path::new(&session.working_dir))
                .ok()
                .and_then(|branch| task_id_from_branch(&branch))
        });
        Some(Identity {
            project_id: project.id,
            task_id,
        })
    }

    fn sync_auto(&self) {
        if !self.config.auto_track {
            return;
        }
        let detected = self.detect();

        let mut timers = self.timers();
        if timers.current == detected {
            return;
        }
        self.pause_locked(&mut timers);
        let Some(identity) = detected else {
            return;
        };

        let key = timer_key(&identity.project_id, identity.task_id.as_ref());
        timers.current = Some(identity.clone());
        if timers.manual.get(&key).is_some_and(TimeLog::is_running) {
            debug!(key = %key, "Manual timer running, auto tracking skipped");
            return;
        }

        let mut log = TimeLog::start(
            &identity.project_id,
            identity.task_id,
            TimeLogSource::Tmux,
            Utc::now(),
            "",
        );
        log.metadata.insert("session_type".into(), "tmux".into());
        log.metadata.insert("auto_tracked".into(), "true".into());
        if let Err(err) = self.logs.save(&log) {
            warn!(key = %key, error = %err, "Failed to start auto timer");
            return;
        }
        info!("Auto-started timer for {}", key);
        timers.auto.insert(key, log);
    }
}
