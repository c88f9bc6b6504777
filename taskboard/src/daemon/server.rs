// Daemon lifecycle and composition root
//
// start: dirs, PID lock, stale socket, bind (0600), managers, accept loop.
// stop: time tracker, action manager, session manager, accept loop, then the
// lock and the socket.

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::UnixListener;
use tokio::sync::Mutex;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::{Config, Settings};
use super::connection::handle_connection;
use super::pid_lock::PidLock;
use super::registry::SubscriberRegistry;
use super::router::Router;
use crate::automation::{ActionManager, ActionPipeline, BoardTaskMutator, InProcessEventBus};
use crate::domain::action_type::{Notifier, ScriptRunner};
use crate::domain::event::EventBus;
use crate::domain::services::{ChangeWatcher, SessionTracker, VcsProvider};
use crate::external::{DesktopNotifier, GitCli, NotifyChangeWatcher, ShellScriptRunner, TmuxTracker};
use crate::sessions::{BoardSyncStrategy, GeneralStrategy, GitBranchStrategy, SessionBoardPlanner, SessionManager, SessionSync};
use crate::store::{
    ActionRepository, BoardRepository, JsonActionRepository, JsonBoardRepository, JsonProjectRepository,
    JsonTimeLogRepository, ProjectRepository, TimeLogRepository,
};
use crate::time_tracking::TimeTrackingManager;
use crate::usecase::{ActionService, BoardService, CheckoutTask, ProjectService};

/// Adapters to the outside world. Swapped for fakes in tests.
#[derive(Clone)]
pub struct Collaborators {
    /// None disables session tracking and auto time tracking.
    pub tracker: Option<Arc<dyn SessionTracker>>,
    pub vcs: Arc<dyn VcsProvider>,
    pub watcher: Option<Arc<dyn ChangeWatcher>>,
    pub notifier: Arc<dyn Notifier>,
    pub script_runner: Arc<dyn ScriptRunner>,
}

impl Collaborators {
    /// git, tmux, notify, desktop notifications and shell scripts.
    pub fn system(config: &Config, settings: &Settings) -> Self {
        let tracking = &settings.session_tracking;
        let tracker: Option<Arc<dyn SessionTracker>> = if tracking.uses_tmux() {
            Some(Arc::new(TmuxTracker::new()))
        } else {
            info!(tracker = %tracking.tracker, "Unsupported session tracker, session tracking disabled");
            None
        };
        let scripts_dir = settings
            .actions
            .scripts_dir
            .clone()
            .unwrap_or_else(|| config.scripts_dir());

        Self {
            tracker,
            vcs: Arc::new(GitCli::new()),
            watcher: Some(Arc::new(NotifyChangeWatcher::new())),
            notifier: Arc::new(DesktopNotifier::new("taskboard", settings.actions.notifications_enabled)),
            script_runner: Arc::new(ShellScriptRunner::new(scripts_dir, settings.actions.scripts_enabled)),
        }
    }
}

/// Everything wired for one daemon run.
struct Services {
    router: Arc<Router>,
    action_manager: ActionManager,
    session_manager: Option<SessionManager>,
    time_tracker: Arc<TimeTrackingManager>,
}

impl Services {
    fn build(config: &Config, settings: &Settings, c: &Collaborators) -> Result<Self> {
        let data_dir = config.data_dir();
        let board_repo: Arc<dyn BoardRepository> =
            Arc::new(JsonBoardRepository::open(&data_dir).context("Failed to open board store")?);
        let action_repo: Arc<dyn ActionRepository> =
            Arc::new(JsonActionRepository::open(&data_dir).context("Failed to open action store")?);
        let project_repo: Arc<dyn ProjectRepository> =
            Arc::new(JsonProjectRepository::open(&data_dir).context("Failed to open project store")?);
        let log_repo: Arc<dyn TimeLogRepository> =
            Arc::new(JsonTimeLogRepository::open(&data_dir).context("Failed to open time log store")?);

        let bus: Arc<dyn EventBus> = Arc::new(InProcessEventBus::new());
        let boards = BoardService::new(board_repo.clone(), Some(bus.clone()));

        let pipeline = ActionPipeline::new(action_repo.clone(), board_repo.clone())
            .with_notifier(c.notifier.clone())
            .with_script_runner(c.script_runner.clone())
            .with_task_mutator(Arc::new(BoardTaskMutator::new(&boards)));
        let action_manager = ActionManager::new(pipeline, bus, settings.actions.manager_config());

        let tracking = &settings.session_tracking;
        let session_sync = c.tracker.clone().map(|tracker| {
            let mut strategies: Vec<Arc<dyn BoardSyncStrategy>> = Vec::new();
            if tracking.syncs_branches() {
                strategies.push(Arc::new(GitBranchStrategy::new(c.vcs.clone())));
            }
            strategies.push(Arc::new(GeneralStrategy));
            SessionSync::new(
                SessionBoardPlanner::new(c.vcs.clone()),
                tracker,
                boards.clone(),
                ProjectService::new(project_repo.clone(), board_repo.clone()),
                strategies,
            )
        });
        let session_manager = session_sync
            .clone()
            .map(|sync| SessionManager::new(sync, c.watcher.clone(), tracking.manager_config()));

        let time_tracker = Arc::new(TimeTrackingManager::new(
            log_repo,
            project_repo.clone(),
            c.tracker.clone(),
            Some(c.vcs.clone()),
            settings.time_tracking.manager_config(),
        ));

        let checkout = CheckoutTask::new(boards.clone(), project_repo.clone(), c.vcs.clone(), c.tracker.clone());
        let mut router = Router::new(
            boards,
            ProjectService::new(project_repo, board_repo),
            ActionService::new(action_repo),
            time_tracker.clone(),
            Arc::new(SubscriberRegistry::new()),
        )
        .with_checkout(Arc::new(checkout));
        if let Some(sync) = session_sync {
            router = router.with_sessions(sync);
        }

        Ok(Self {
            router: Arc::new(router),
            action_manager,
            session_manager,
            time_tracker,
        })
    }
}

struct Running {
    lock: PidLock,
    shutdown: CancellationToken,
    accept: JoinHandle<()>,
    services: Services,
}

pub struct DaemonServer {
    config: Config,
    settings: Settings,
    collaborators: Collaborators,
    running: Mutex<Option<Running>>,
}

impl DaemonServer {
    pub fn new(config: Config, settings: Settings) -> Self {
        let collaborators = Collaborators::system(&config, &settings);
        Self::with_collaborators(config, settings, collaborators)
    }

    pub fn with_collaborators(config: Config, settings: Settings, collaborators: Collaborators) -> Self {
        Self {
            config,
            settings,
            collaborators,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        self.running.lock().await.is_some()
    }

    /// Idempotent. Fails when another daemon holds the PID lock.
    pub async fn start(&self) -> Result<()> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Ok(());
        }

        self.config
            .ensure_dirs()
            .context("Failed to create daemon directories")?;
        let lock = PidLock::acquire(&self.config.pid_file)?;
        let services = Services::build(&self.config, &self.settings, &self.collaborators)?;

        let socket_path = &self.config.socket_path;
        if self.config.socket_exists() {
            debug!(path = %socket_path.display(), "Removing stale socket");
            self.config
                .remove_socket()
                .context("Failed to remove stale socket")?;
        }
        let listener = UnixListener::bind(socket_path)
            .with_context(|| format!("Failed to bind socket: {}", socket_path.display()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set socket permissions: {}", socket_path.display()))?;
        }

        services.action_manager.start().await;
        if let Some(sessions) = &services.session_manager {
            sessions.start().await;
        }
        services.time_tracker.start().await;

        let shutdown = CancellationToken::new();
        let accept = tokio::spawn(accept_loop(listener, services.router.clone(), shutdown.clone()));
        info!("Daemon listening on {}", socket_path.display());

        *running = Some(Running {
            lock,
            shutdown,
            accept,
            services,
        });
        Ok(())
    }

    /// Idempotent. Returns once every background task has exited.
    pub async fn stop(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        info!("Shutting down daemon...");

        let services = &running.services;
        services.time_tracker.stop().await;
        services.action_manager.stop().await;
        if let Some(sessions) = &services.session_manager {
            sessions.stop().await;
        }

        running.shutdown.cancel();
        if let Err(e) = running.accept.await {
            warn!(error = %e, "Accept loop ended abnormally");
        }

        running.lock.release();
        if let Err(e) = self.config.remove_socket() {
            warn!(error = %e, "Failed to remove socket");
        }
        info!("Daemon stopped");
    }
}

/// Accept until cancelled, then wait for every connection task to finish.
async fn accept_loop(listener: UnixListener, router: Arc<Router>, shutdown: CancellationToken) {
    let mut connections = JoinSet::new();
    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, _addr)) => {
                    let router = router.clone();
                    let token = shutdown.clone();
                    connections.spawn(async move {
                        if let Err(e) = handle_connection(stream, router, token).await {
                            debug!(error = %e, "Client error");
                        }
                    });
                }
                Err(e) => warn!(error = %e, "Accept error"),
            },
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }
    // Connections watch the same token
    while connections.join_next().await.is_some() {}
}
