// Git strategy: one task per local branch
//
// The branch at HEAD sits in "In Progress", other branches in "To Do", and
// tasks whose branch vanished are completed in "Done". Tasks already in
// "Done" are never moved back. Placement that hits a WIP limit is skipped
// and retried on the next sync.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

use super::strategy::BoardSyncStrategy;
use crate::domain::board::{Board, Task};
use crate::domain::services::VcsProvider;
use crate::domain::session::Session;
use crate::domain::task_id::TaskId;
use crate::domain::values::{Priority, Status};
use crate::domain::{DomainError, DomainResult};
use crate::usecase::boards::{CURRENT_BRANCH_KEY, DONE, GIT_BRANCH_KEY, IN_PROGRESS, TODO};

static BRANCH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Z]{3})-(\d+)(?:-[a-z]+-\d+)?-(.+)$").expect("valid branch regex")
});

/// Task id parts recovered from a branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBranch {
    pub prefix: String,
    pub number: u32,
    pub title: String,
}

/// Parse `PRE-NUM[-ref-NUM]-title`, e.g. `FOR-001-rec-28-some-title`.
pub fn parse_branch_name(branch: &str) -> Option<ParsedBranch> {
    let caps = BRANCH_RE.captures(branch)?;
    Some(ParsedBranch {
        prefix: caps[1].to_string(),
        number: caps[2].parse().ok()?,
        title: caps[3].to_string(),
    })
}

pub struct GitBranchStrategy {
    vcs: Arc<dyn VcsProvider>,
}

impl GitBranchStrategy {
    pub fn new(vcs: Arc<dyn VcsProvider>) -> Self {
        Self { vcs }
    }

    fn create_branch_task(&self, board: &mut Board, branch: &str, is_current: bool) -> DomainResult<()> {
        let target = if is_current { IN_PROGRESS } else { TODO };
        let column = board
            .column(target)
            .ok_or_else(|| DomainError::ColumnNotFound(target.to_string()))?;
        if !column.can_add_task() {
            debug!(branch, column = target, "Column full, branch task deferred");
            return Ok(());
        }

        let parsed = parse_branch_name(branch)
            .and_then(|p| TaskId::new(&p.prefix, p.number, &p.title).ok().map(|id| (id, p.title)))
            .filter(|(id, _)| board.find_task(id).is_none());
        let (id, title) = match parsed {
            Some((id, title)) => {
                if id.prefix() == board.prefix && id.number() >= board.next_task_num {
                    board.next_task_num = id.number() + 1;
                }
                (id, title)
            }
            None => (board.generate_next_task_id(branch)?, branch.to_string()),
        };

        let mut task = Task::new(id, &title, &format!("Git branch: {branch}"), Priority::None, Status::Todo)?;
        task.set_metadata(GIT_BRANCH_KEY, branch);
        task.set_metadata(CURRENT_BRANCH_KEY, &is_current.to_string());
        board.add_task(target, task)
    }

    fn update_branch_task(&self, board: &mut Board, id: &TaskId, is_current: bool) {
        let Some(current_column) = board.find_task(id).map(|(_, c)| c.name.clone()) else {
            return;
        };
        if let Some(task) = board.find_task_mut(id) {
            if task.metadata.get(CURRENT_BRANCH_KEY).map(String::as_str) != Some(bool_str(is_current)) {
                task.set_metadata(CURRENT_BRANCH_KEY, bool_str(is_current));
            }
        }

        let target = if is_current { IN_PROGRESS } else { TODO };
        if current_column != target && current_column != DONE {
            if let Err(err) = board.move_task(id, target) {
                debug!(task = %id, column = target, error = %err, "Branch task move deferred");
            }
        }
    }

    fn complete_vanished(&self, board: &mut Board, id: &TaskId) {
        let in_done = board.find_task(id).map(|(_, c)| c.name == DONE).unwrap_or(true);
        if in_done {
            return;
        }
        if let Err(err) = board.move_task(id, DONE) {
            debug!(task = %id, error = %err, "Could not complete task for deleted branch");
            return;
        }
        if let Some(task) = board.find_task_mut(id) {
            task.mark_as_completed();
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl BoardSyncStrategy for GitBranchStrategy {
    fn name(&self) -> &'static str {
        "git"
    }

    fn can_handle(&self, session: &Session) -> bool {
        self.vcs.is_repository(Path::new(&session.working_dir))
    }

    fn sync(&self, session: &Session, board: &mut Board) -> DomainResult<()> {
        let root = PathBuf::from(self.vcs.get_repository_root(Path::new(&session.working_dir))?);
        let current = self.vcs.get_current_branch(&root)?;
        let branches = self.vcs.list_branches(&root)?;

        let existing: HashMap<String, TaskId> = board
            .all_tasks()
            .filter_map(|t| t.metadata.get(GIT_BRANCH_KEY).map(|b| (b.clone(), t.id.clone())))
            .collect();
        let live: HashSet<&str> = branches.iter().map(String::as_str).collect();

        for branch in &branches {
            let is_current = *branch == current;
            match existing.get(branch) {
                Some(id) => self.update_branch_task(board, id, is_current),
                None => self.create_branch_task(board, branch, is_current)?,
            }
        }

        for (branch, id) in &existing {
            if !live.contains(branch.as_str()) {
                self.complete_vanished(board, id);
            }
        }
        Ok(())
    }

    fn should_watch(&self) -> bool {
        true
    }

    fn watch_path(&self, session: &Session) -> Option<PathBuf> {
        let root = self.vcs.get_repository_root(Path::new(&session.working_dir)).ok()?;
        let refs = self.vcs.get_refs_path(Path::new(&root)).ok()?;
        (!refs.is_empty()).then(|| PathBuf::from(refs))
    }
}
