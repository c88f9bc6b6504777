// Session -> project/board planning and reconciliation

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use super::strategy::{select_strategy, BoardSyncStrategy};
use crate::domain::board::board_id_for;
use crate::domain::services::{SessionTracker, VcsProvider};
use crate::domain::session::Session;
use crate::domain::values::slugify;
use crate::domain::{DomainError, DomainResult};
use crate::usecase::boards::BoardService;
use crate::usecase::projects::ProjectService;

pub const DEFAULT_BOARD: &str = "default";

/// Where a session's work lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPlan {
    pub project_id: String,
    pub project_name: String,
    pub working_dir: String,
    pub board_names: Vec<String>,
    /// The one board the strategy reconciles.
    pub sync_board: String,
    pub is_repo: bool,
}

impl BoardPlan {
    pub fn sync_board_id(&self) -> String {
        board_id_for(&self.project_id, &self.sync_board)
    }
}

pub struct SessionBoardPlanner {
    vcs: Arc<dyn VcsProvider>,
}

impl SessionBoardPlanner {
    pub fn new(vcs: Arc<dyn VcsProvider>) -> Self {
        Self { vcs }
    }

    /// Repositories are named after their root directory; anything else after
    /// the session.
    pub fn plan(&self, session: &Session) -> DomainResult<BoardPlan> {
        let dir = Path::new(&session.working_dir);
        let is_repo = self.vcs.is_repository(dir);
        let (project_name, working_dir) = if is_repo {
            let root = self.vcs.get_repository_root(dir)?;
            let name = Path::new(&root)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| session.name.clone());
            (name, root)
        } else {
            (session.name.clone(), session.working_dir.clone())
        };

        let mut board_names = vec![DEFAULT_BOARD.to_string()];
        if is_repo && is_monorepo(Path::new(&working_dir)) {
            board_names.extend(["backend".to_string(), "android".to_string()]);
        }

        Ok(BoardPlan {
            project_id: slugify(&project_name),
            project_name,
            working_dir,
            board_names,
            sync_board: DEFAULT_BOARD.to_string(),
            is_repo,
        })
    }
}

fn is_monorepo(root: &Path) -> bool {
    root.join("backend").exists() && (root.join("mobile").exists() || root.join("android").exists())
}

fn session_description(session: &Session, working_dir: &str) -> String {
    format!("Session: {}\nWorking Directory: {}", session.name, working_dir)
}

/// Keeps project and boards in step with the terminal sessions.
#[derive(Clone)]
pub struct SessionSync {
    planner: Arc<SessionBoardPlanner>,
    tracker: Arc<dyn SessionTracker>,
    boards: BoardService,
    projects: ProjectService,
    strategies: Arc<Vec<Arc<dyn BoardSyncStrategy>>>,
}

impl SessionSync {
    pub fn new(
        planner: SessionBoardPlanner,
        tracker: Arc<dyn SessionTracker>,
        boards: BoardService,
        projects: ProjectService,
        strategies: Vec<Arc<dyn BoardSyncStrategy>>,
    ) -> Self {
        Self {
            planner: Arc::new(planner),
            tracker,
            boards,
            projects,
            strategies: Arc::new(strategies),
        }
    }

    pub fn tracker(&self) -> &Arc<dyn SessionTracker> {
        &self.tracker
    }

    pub fn strategy_for(&self, session: &Session) -> Option<Arc<dyn BoardSyncStrategy>> {
        select_strategy(&self.strategies, session).cloned()
    }

    /// Ensure the session's project and boards exist, then let the chosen
    /// strategy reconcile the sync board.
    pub fn sync_session(&self, session: &Session) -> DomainResult<()> {
        let plan = self.planner.plan(session)?;
        let description = session_description(session, &plan.working_dir);
        self.projects
            .get_or_create(&plan.project_name, &plan.working_dir, &description)?;

        let strategy = self
            .strategy_for(session)
            .ok_or_else(|| DomainError::external(format!("no strategy found for session: {}", session.name)))?;

        for name in &plan.board_names {
            let board = self.boards.ensure_board(&plan.project_id, name, &description)?;
            if *name == plan.sync_board {
                self.boards
                    .reconcile(&board.id, |b| strategy.sync(session, b))?;
                debug!(session = %session.name, board = %board.id, strategy = strategy.name(), "Session board synced");
            }
        }
        Ok(())
    }

    /// Sync every session and return the attached one. A failing session
    /// is logged and skipped.
    pub fn track(&self) -> DomainResult<Option<Session>> {
        if !self.tracker.is_available() {
            return Ok(None);
        }
        let sessions = self.tracker.list_sessions()?;
        let active = self.tracker.get_active_session()?;
        for session in &sessions {
            if let Err(err) = self.sync_session(session) {
                warn!(session = %session.name, error = %err, "Session sync failed");
            }
        }
        Ok(active)
    }

    /// Board id for the named session, or the attached one. The board is
    /// synced into existence when missing. `None` when there is no such
    /// session.
    pub fn active_board_id(&self, session_name: Option<&str>) -> DomainResult<Option<String>> {
        if !self.tracker.is_available() {
            return Ok(None);
        }
        let session = match session_name.filter(|n| !n.is_empty()) {
            Some(name) => self.tracker.list_sessions()?.into_iter().find(|s| s.name == name),
            None => self.tracker.get_active_session()?,
        };
        let Some(session) = session else {
            return Ok(None);
        };

        let board_id = self.planner.plan(&session)?.sync_board_id();
        if !self.boards.repository().exists(&board_id) {
            self.sync_session(&session)?;
        }
        Ok(Some(board_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{GeneralStrategy, GitBranchStrategy};
    use crate::store::{JsonBoardRepository, JsonProjectRepository, ProjectRepository};
    use crate::test_utils::{FakeRepo, FakeSessions};
    use crate::usecase::boards::{IN_PROGRESS, TODO};
    use tempfile::TempDir;

    struct Fixture {
        sync: SessionSync,
        boards: BoardService,
        projects: Arc<JsonProjectRepository>,
        sessions: Arc<FakeSessions>,
    }

    fn fixture(repo: Arc<FakeRepo>, sessions: Arc<FakeSessions>) -> Fixture {
        let boards = BoardService::new(Arc::new(JsonBoardRepository::in_memory()), None);
        let projects = Arc::new(JsonProjectRepository::in_memory());
        let strategies: Vec<Arc<dyn BoardSyncStrategy>> =
            vec![Arc::new(GitBranchStrategy::new(repo.clone())), Arc::new(GeneralStrategy)];
        let sync = SessionSync::new(
            SessionBoardPlanner::new(repo),
            sessions.clone(),
            boards.clone(),
            ProjectService::new(projects.clone(), boards.repository()),
            strategies,
        );
        Fixture {
            sync,
            boards,
            projects,
            sessions,
        }
    }

    #[test]
    fn test_plan_repo_and_plain_dir() {
        let planner = SessionBoardPlanner::new(FakeRepo::with("main", &["main"]));
        let plan = planner.plan(&Session::new("api", "/repo/src", "tmux").unwrap()).unwrap();
        assert_eq!(plan.project_name, "repo");
        assert_eq!(plan.working_dir, "/repo");
        assert_eq!(plan.sync_board_id(), "repo/default");
        assert_eq!(plan.board_names, vec!["default"]);

        let plan = planner
            .plan(&Session::new("Notes Stuff", "/home/me/notes", "tmux").unwrap())
            .unwrap();
        assert_eq!(plan.project_id, "notes-stuff");
        assert_eq!(plan.working_dir, "/home/me/notes");
        assert!(!plan.is_repo);
    }

    #[test]
    fn test_monorepo_gets_extra_boards() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("backend")).unwrap();
        std::fs::create_dir(dir.path().join("android")).unwrap();
        assert!(is_monorepo(dir.path()));
        std::fs::remove_dir(dir.path().join("android")).unwrap();
        assert!(!is_monorepo(dir.path()));
    }

    #[test]
    fn test_track_syncs_sessions_and_reports_active() {
        let repo = FakeRepo::with("feature", &["main", "feature"]);
        let f = fixture(repo, FakeSessions::with(&[("code", "/repo"), ("notes", "/tmp/notes")], Some("code")));

        let active = f.sync.track().unwrap().unwrap();
        assert_eq!(active.name, "code");

        let board = f.boards.get_board("repo/default").unwrap();
        assert_eq!(board.column(IN_PROGRESS).unwrap().tasks[0].title, "feature");
        assert_eq!(board.column(TODO).unwrap().tasks[0].title, "main");
        let notes = f.boards.get_board("notes/default").unwrap();
        assert_eq!(notes.task_count(), 0);
        assert_eq!(notes.columns.len(), 3);

        let project = f.projects.find_by_working_dir("/repo").unwrap().unwrap();
        assert_eq!(project.description, "Session: code\nWorking Directory: /repo");
    }

    #[test]
    fn test_active_board_creates_missing_board() {
        let repo = FakeRepo::with("main", &["main"]);
        let f = fixture(repo, FakeSessions::with(&[("code", "/repo")], Some("code")));
        assert_eq!(f.sync.active_board_id(None).unwrap().as_deref(), Some("repo/default"));
        assert!(f.boards.get_board("repo/default").is_ok());

        assert_eq!(f.sync.active_board_id(Some("missing")).unwrap(), None);
        f.sessions.set(&[("code", "/repo")], None);
        assert_eq!(f.sync.active_board_id(None).unwrap(), None);
    }
}
