// Check out the branch for a task and mark it as the one in progress

use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

use super::boards::{BoardService, GIT_BRANCH_KEY};
use crate::domain::board::Board;
use crate::domain::services::{SessionTracker, VcsProvider};
use crate::domain::{DomainError, DomainResult};
use crate::store::ProjectRepository;

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub task_id: String,
    pub branch: String,
    pub created_branch: bool,
    pub repository: String,
}

pub struct CheckoutTask {
    boards: BoardService,
    projects: Arc<dyn ProjectRepository>,
    vcs: Arc<dyn VcsProvider>,
    sessions: Option<Arc<dyn SessionTracker>>,
}

impl CheckoutTask {
    pub fn new(
        boards: BoardService,
        projects: Arc<dyn ProjectRepository>,
        vcs: Arc<dyn VcsProvider>,
        sessions: Option<Arc<dyn SessionTracker>>,
    ) -> Self {
        Self {
            boards,
            projects,
            vcs,
            sessions,
        }
    }

    pub fn execute(&self, board_id: &str, raw_task_id: &str) -> DomainResult<CheckoutOutcome> {
        let board = self.boards.get_board(board_id)?;
        let id = board
            .resolve_task_id(raw_task_id.trim())
            .ok_or_else(|| DomainError::TaskNotFound(raw_task_id.to_string()))?;
        let (task, _) = board
            .find_task(&id)
            .ok_or_else(|| DomainError::TaskNotFound(raw_task_id.to_string()))?;

        let repository = self.repository_for(&board)?;
        let repo_path = Path::new(&repository);
        let branch = task
            .metadata
            .get(GIT_BRANCH_KEY)
            .cloned()
            .unwrap_or_else(|| id.to_string());

        let created_branch = !self.vcs.branch_exists(repo_path, &branch);
        if created_branch {
            self.vcs.create_and_checkout_branch(repo_path, &branch)?;
        } else {
            self.vcs.checkout_branch(repo_path, &branch)?;
        }

        self.boards.focus_task(board_id, &id, &branch)?;
        Ok(CheckoutOutcome {
            task_id: id.to_string(),
            branch,
            created_branch,
            repository,
        })
    }

    /// The project's working dir, else the session named like the board,
    /// else the active session; it must be inside a repository.
    fn repository_for(&self, board: &Board) -> DomainResult<String> {
        let mut working_dir = self
            .projects
            .find_by_id(&board.project_id)
            .or_else(|_| self.projects.find_by_slug(&board.project_id))
            .map(|p| p.working_dir)
            .unwrap_or_default();

        if working_dir.is_empty() {
            let tracker = self
                .sessions
                .as_ref()
                .filter(|t| t.is_available())
                .ok_or_else(|| DomainError::external("session tracker is not available"))?;
            let named = tracker
                .list_sessions()?
                .into_iter()
                .find(|s| s.name == board.name);
            let session = match named {
                Some(session) => session,
                None => tracker.get_active_session()?.ok_or_else(|| {
                    DomainError::external(format!("no active session found for board {}", board.name))
                })?,
            };
            working_dir = session.working_dir;
        }

        let dir = Path::new(&working_dir);
        if !self.vcs.is_repository(dir) {
            return Err(DomainError::external(format!(
                "working directory {working_dir} is not a git repository"
            )));
        }
        self.vcs.get_repository_root(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::project::Project;
    use crate::domain::session::Session;
    use crate::store::{JsonBoardRepository, JsonProjectRepository};
    use crate::usecase::boards::{default_columns, CreateTaskRequest, IN_PROGRESS, TODO};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeVcs {
        existing: Vec<String>,
        checkouts: Mutex<Vec<(String, bool)>>,
    }

    impl VcsProvider for FakeVcs {
        fn is_repository(&self, _: &Path) -> bool {
            true
        }
        fn get_repository_root(&self, path: &Path) -> DomainResult<String> {
            Ok(path.display().to_string())
        }
        fn get_current_branch(&self, _: &Path) -> DomainResult<String> {
            Ok("main".into())
        }
        fn list_branches(&self, _: &Path) -> DomainResult<Vec<String>> {
            Ok(vec![])
        }
        fn get_refs_path(&self, _: &Path) -> DomainResult<String> {
            Ok(String::new())
        }
        fn branch_exists(&self, _: &Path, branch: &str) -> bool {
            self.existing.iter().any(|b| b == branch)
        }
        fn checkout_branch(&self, _: &Path, branch: &str) -> DomainResult<()> {
            self.checkouts.lock().unwrap().push((branch.into(), false));
            Ok(())
        }
        fn create_and_checkout_branch(&self, _: &Path, branch: &str) -> DomainResult<()> {
            self.checkouts.lock().unwrap().push((branch.into(), true));
            Ok(())
        }
    }

    struct OneSession;

    impl SessionTracker for OneSession {
        fn is_available(&self) -> bool {
            true
        }
        fn list_sessions(&self) -> DomainResult<Vec<Session>> {
            Ok(vec![Session::new("Work", "/src/work", "tmux")?])
        }
        fn get_active_session(&self) -> DomainResult<Option<Session>> {
            Ok(None)
        }
    }

    fn task(title: &str) -> CreateTaskRequest {
        CreateTaskRequest {
            title: title.into(),
            description: String::new(),
            priority: String::new(),
            column_name: TODO.into(),
            due_date: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_checkout_creates_branch_and_focuses_task() {
        let boards = BoardService::new(Arc::new(JsonBoardRepository::in_memory()), None);
        let board = boards
            .create_board_with_columns("proj", "Work", "", default_columns())
            .unwrap();
        boards.add_task(&board.id, task("First thing")).unwrap();
        boards.add_task(&board.id, task("Second thing")).unwrap();
        boards.move_task(&board.id, "WOR-001", IN_PROGRESS).unwrap();

        let projects = Arc::new(JsonProjectRepository::in_memory());
        projects.save(&Project::new("proj", "", "/src/proj").unwrap()).unwrap();
        let vcs = Arc::new(FakeVcs::default());
        let checkout = CheckoutTask::new(boards.clone(), projects, vcs.clone(), None);

        let outcome = checkout.execute(&board.id, "WOR-002").unwrap();
        assert_eq!(outcome.branch, "WOR-002-second-thing");
        assert!(outcome.created_branch);
        assert_eq!(outcome.repository, "/src/proj");

        let board = boards.get_board(&board.id).unwrap();
        let in_progress = board.column(IN_PROGRESS).unwrap();
        assert_eq!(in_progress.tasks.len(), 1);
        assert_eq!(in_progress.tasks[0].metadata[GIT_BRANCH_KEY], "WOR-002-second-thing");
        assert_eq!(board.column(TODO).unwrap().tasks[0].id.short_id(), "WOR-001");
    }

    #[test]
    fn test_falls_back_to_session_named_like_board() {
        let boards = BoardService::new(Arc::new(JsonBoardRepository::in_memory()), None);
        let board = boards
            .create_board_with_columns("unknown", "Work", "", default_columns())
            .unwrap();
        boards.add_task(&board.id, task("Thing")).unwrap();

        let vcs = Arc::new(FakeVcs {
            existing: vec!["WOR-001-thing".into()],
            ..Default::default()
        });
        let checkout = CheckoutTask::new(
            boards,
            Arc::new(JsonProjectRepository::in_memory()),
            vcs.clone(),
            Some(Arc::new(OneSession)),
        );
        let outcome = checkout.execute(&board.id, "WOR-001").unwrap();
        assert!(!outcome.created_branch);
        assert_eq!(outcome.repository, "/src/work");
        assert_eq!(vcs.checkouts.lock().unwrap()[0], ("WOR-001-thing".to_string(), false));
    }
}
