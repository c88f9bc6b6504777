// Board, column and task mutations
//
// Every mutation loads the board, applies the change, saves it and then
// publishes the resulting domain events. Mutations are serialized by one
// lock shared between all handles to the same service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

use crate::domain::board::{board_id_for, Board, Column, Task};
use crate::domain::event::{DomainEvent, EventBus};
use crate::domain::task_id::TaskId;
use crate::domain::values::{EventType, Priority, Status};
use crate::domain::{DomainError, DomainResult};
use crate::store::BoardRepository;

#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: String,
    pub column_name: String,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateColumnRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
    #[serde(default)]
    pub wip_limit: i32,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoardSummary {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub prefix: String,
    pub description: String,
    pub column_count: usize,
    pub task_count: usize,
    pub modified_at: DateTime<Utc>,
}

impl From<&Board> for BoardSummary {
    fn from(board: &Board) -> Self {
        Self {
            id: board.id.clone(),
            project_id: board.project_id.clone(),
            name: board.name.clone(),
            prefix: board.prefix.clone(),
            description: board.description.clone(),
            column_count: board.columns.len(),
            task_count: board.task_count(),
            modified_at: board.modified_at,
        }
    }
}

pub const TODO: &str = "To Do";
pub const IN_PROGRESS: &str = "In Progress";
pub const DONE: &str = "Done";

/// Task metadata linking a task to its branch.
pub const GIT_BRANCH_KEY: &str = "git_branch";
pub const CURRENT_BRANCH_KEY: &str = "is_current_branch";

/// Columns every session board starts with.
pub fn default_columns() -> Vec<Column> {
    [(TODO, 0, 0), (IN_PROGRESS, 1, 3), (DONE, 2, 0)]
        .into_iter()
        .filter_map(|(name, order, wip)| Column::new(name, "", order, wip, "").ok())
        .collect()
}

#[derive(Clone)]
pub struct BoardService {
    boards: Arc<dyn BoardRepository>,
    events: Option<Arc<dyn EventBus>>,
    write_lock: Arc<Mutex<()>>,
}

impl BoardService {
    pub fn new(boards: Arc<dyn BoardRepository>, events: Option<Arc<dyn EventBus>>) -> Self {
        Self {
            boards,
            events,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Same boards and lock, but mutations publish nothing. Used by
    /// automation effects so an action cannot re-trigger itself.
    pub fn without_events(&self) -> Self {
        Self {
            boards: self.boards.clone(),
            events: None,
            write_lock: self.write_lock.clone(),
        }
    }

    pub fn repository(&self) -> Arc<dyn BoardRepository> {
        self.boards.clone()
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    pub fn get_board(&self, board_id: &str) -> DomainResult<Board> {
        self.boards.find_by_id(board_id)
    }

    pub fn list_boards(&self, project_id: Option<&str>) -> DomainResult<Vec<BoardSummary>> {
        let boards = match project_id.filter(|p| !p.is_empty()) {
            Some(project) => self.boards.list_by_project(project)?,
            None => self.boards.list()?,
        };
        Ok(boards.iter().map(BoardSummary::from).collect())
    }

    // ------------------------------------------------------------------------
    // Boards and columns
    // ------------------------------------------------------------------------

    pub fn create_board(&self, project_id: &str, name: &str, description: &str) -> DomainResult<Board> {
        self.create_board_with_columns(project_id, name, description, Vec::new())
    }

    pub fn create_board_with_columns(
        &self,
        project_id: &str,
        name: &str,
        description: &str,
        columns: Vec<Column>,
    ) -> DomainResult<Board> {
        let _guard = self.lock();
        let mut board = Board::new(project_id, name, description)?;
        if self.boards.exists(&board.id) {
            return Err(DomainError::BoardAlreadyExists(board.id));
        }
        for column in columns {
            board.add_column(column)?;
        }
        self.boards.save(&board)?;
        Ok(board)
    }

    pub fn add_column(&self, board_id: &str, req: CreateColumnRequest) -> DomainResult<Board> {
        self.mutate(board_id, |board| {
            let column = Column::new(&req.name, &req.description, req.order, req.wip_limit, &req.color)?;
            let name = column.name.clone();
            board.add_column(column)?;
            let event = DomainEvent::new(EventType::ColumnCreated, &board.id, name, None);
            Ok((board.clone(), vec![event]))
        })
    }

    pub fn delete_column(&self, board_id: &str, column_name: &str) -> DomainResult<Board> {
        self.mutate(board_id, |board| {
            let removed = board.remove_column(column_name)?;
            let event = DomainEvent::new(EventType::ColumnDeleted, &board.id, removed.name, None);
            Ok((board.clone(), vec![event]))
        })
    }

    // ------------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------------

    pub fn add_task(&self, board_id: &str, req: CreateTaskRequest) -> DomainResult<Task> {
        let priority: Priority = req.priority.parse()?;
        self.mutate(board_id, |board| {
            let column = board
                .column(&req.column_name)
                .ok_or_else(|| DomainError::ColumnNotFound(req.column_name.clone()))?;
            if !column.can_add_task() {
                return Err(DomainError::WipLimitExceeded(column.name.clone()));
            }
            let column_name = column.name.clone();

            let id = board.generate_next_task_id(&req.title)?;
            let mut task = Task::new(id, &req.title, &req.description, priority, Status::Todo)?;
            task.project_id = board.project_id.clone();
            task.due_date = req.due_date;
            for tag in &req.tags {
                task.add_tag(tag);
            }
            board.add_task(&column_name, task.clone())?;

            let mut events = vec![DomainEvent::new(
                EventType::TaskCreated,
                &board.id,
                &column_name,
                Some(task.id.clone()),
            )];
            if task.due_date.is_some() {
                events.push(DomainEvent::new(
                    EventType::TaskDueDateSet,
                    &board.id,
                    &column_name,
                    Some(task.id.clone()),
                ));
            }
            events.extend(wip_reached(board, &column_name));
            Ok((task, events))
        })
    }

    pub fn move_task(&self, board_id: &str, raw_task_id: &str, target: &str) -> DomainResult<Board> {
        self.mutate(board_id, |board| {
            let id = resolve(board, raw_task_id)?;
            let from = board
                .find_task(&id)
                .map(|(_, c)| c.name.clone())
                .unwrap_or_default();
            board.move_task(&id, target)?;
            let to = board
                .find_task(&id)
                .map(|(_, c)| c.name.clone())
                .unwrap_or_default();

            let mut events = vec![DomainEvent::new(EventType::TaskMoved, &board.id, &to, Some(id))
                .with_metadata("from_column", from)
                .with_metadata("to_column", to.clone())];
            events.extend(wip_reached(board, &to));
            Ok((board.clone(), events))
        })
    }

    pub fn update_task(&self, board_id: &str, raw_task_id: &str, req: UpdateTaskRequest) -> DomainResult<Task> {
        let priority = req.priority.as_deref().map(str::parse::<Priority>).transpose()?;
        let status = req.status.as_deref().map(str::parse::<Status>).transpose()?;
        self.mutate(board_id, |board| {
            let id = resolve(board, raw_task_id)?;
            let (before, column) = board
                .find_task(&id)
                .map(|(t, c)| (t.clone(), c.name.clone()))
                .ok_or_else(|| DomainError::TaskNotFound(raw_task_id.to_string()))?;

            let mut task = before.clone();
            if let Some(title) = &req.title {
                task.update_title(title)?;
            }
            if let Some(description) = &req.description {
                task.update_description(description);
            }
            if let Some(priority) = priority {
                task.update_priority(priority);
            }
            if let Some(status) = status {
                task.update_status(status);
            }
            if req.due_date.is_some() {
                task.set_due_date(req.due_date);
            }
            if let Some(tags) = &req.tags {
                task.tags.clear();
                for tag in tags {
                    task.add_tag(tag);
                }
            }

            store_task(board, task.clone())?;
            let events = change_events(&board.id, &column, &before, &task);
            Ok((task, events))
        })
    }

    /// Replace a task's editable fields with those of `task`.
    pub fn replace_task(&self, board_id: &str, task: &Task) -> DomainResult<Task> {
        self.mutate(board_id, |board| {
            let (before, column) = board
                .find_task(&task.id)
                .map(|(t, c)| (t.clone(), c.name.clone()))
                .ok_or_else(|| DomainError::TaskNotFound(task.id.to_string()))?;
            let mut updated = task.clone();
            updated.created_at = before.created_at;
            store_task(board, updated.clone())?;
            let events = change_events(&board.id, &column, &before, &updated);
            Ok((updated, events))
        })
    }

    /// Insert a pre-built task. Ids already handed out by this board are
    /// reallocated so two drafts built from one snapshot cannot collide.
    pub fn insert_task(&self, board_id: &str, column_name: &str, mut task: Task) -> DomainResult<Task> {
        self.mutate(board_id, |board| {
            let stale = task.id.prefix() == board.prefix && task.id.number() < board.next_task_num;
            if stale || board.find_task(&task.id).is_some() {
                task.id = board.generate_next_task_id(&task.title)?;
            } else if task.id.prefix() == board.prefix {
                board.next_task_num = task.id.number() + 1;
            }
            board.add_task(column_name, task.clone())?;
            let column = board
                .find_task(&task.id)
                .map(|(_, c)| c.name.clone())
                .unwrap_or_default();
            let mut events = vec![DomainEvent::new(
                EventType::TaskCreated,
                &board.id,
                &column,
                Some(task.id.clone()),
            )];
            events.extend(wip_reached(board, &column));
            Ok((task, events))
        })
    }

    pub fn delete_task(&self, board_id: &str, raw_task_id: &str) -> DomainResult<Task> {
        self.mutate(board_id, |board| {
            let id = resolve(board, raw_task_id)?;
            let column = board
                .find_task(&id)
                .map(|(_, c)| c.name.clone())
                .unwrap_or_default();
            let task = board.remove_task(&id)?;
            let event = DomainEvent::new(EventType::TaskDeleted, &board.id, column, Some(id));
            Ok((task, vec![event]))
        })
    }

    /// Make `id` the only task in progress, tagging it with its branch.
    /// Tasks displaced from "In Progress" go back to "To Do" when it has room.
    pub fn focus_task(&self, board_id: &str, id: &TaskId, branch: &str) -> DomainResult<Board> {
        self.mutate(board_id, |board| {
            let in_progress = board
                .column(IN_PROGRESS)
                .map(|c| c.name.clone())
                .ok_or_else(|| DomainError::ColumnNotFound(IN_PROGRESS.to_string()))?;
            let todo = board
                .column(TODO)
                .or_else(|| board.column("Todo"))
                .map(|c| c.name.clone())
                .ok_or_else(|| DomainError::ColumnNotFound(TODO.to_string()))?;

            let displaced: Vec<TaskId> = board
                .column(&in_progress)
                .map(|c| c.tasks.iter().map(|t| t.id.clone()).filter(|t| t != id).collect())
                .unwrap_or_default();
            let mut events = Vec::new();
            for other in displaced {
                if board.move_task(&other, &todo).is_ok() {
                    events.push(DomainEvent::new(EventType::TaskMoved, &board.id, &todo, Some(other)));
                }
            }

            let current = board
                .find_task(id)
                .map(|(_, c)| c.name.clone())
                .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
            if current != in_progress {
                board.move_task(id, &in_progress)?;
                events.push(DomainEvent::new(
                    EventType::TaskMoved,
                    &board.id,
                    &in_progress,
                    Some(id.clone()),
                ));
            }
            if let Some(task) = board.find_task_mut(id) {
                task.set_metadata(GIT_BRANCH_KEY, branch);
                task.set_metadata(CURRENT_BRANCH_KEY, "true");
            }
            Ok((board.clone(), events))
        })
    }

    /// Find a board by project and name, creating it with the default
    /// columns when missing.
    pub fn ensure_board(&self, project_id: &str, name: &str, description: &str) -> DomainResult<Board> {
        match self.boards.find_by_id(&board_id_for(project_id, name)) {
            Ok(board) => Ok(board),
            Err(DomainError::BoardNotFound(_)) => {
                match self.create_board_with_columns(project_id, name, description, default_columns()) {
                    Err(DomainError::BoardAlreadyExists(id)) => self.boards.find_by_id(&id),
                    other => other,
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Apply an external reconciliation to a board and save it. Publishes
    /// nothing; the caller owns the source of truth.
    pub fn reconcile<F>(&self, board_id: &str, apply: F) -> DomainResult<Board>
    where
        F: FnOnce(&mut Board) -> DomainResult<()>,
    {
        self.mutate(board_id, |board| {
            apply(board)?;
            Ok((board.clone(), Vec::new()))
        })
    }

    // ------------------------------------------------------------------------

    fn lock(&self) -> std::sync::MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn mutate<R, F>(&self, board_id: &str, apply: F) -> DomainResult<R>
    where
        F: FnOnce(&mut Board) -> DomainResult<(R, Vec<DomainEvent>)>,
    {
        let (result, events) = {
            let _guard = self.lock();
            let mut board = self.boards.find_by_id(board_id)?;
            let outcome = apply(&mut board)?;
            self.boards.save(&board)?;
            outcome
        };
        if let Some(bus) = &self.events {
            for event in events {
                bus.publish(event);
            }
        }
        Ok(result)
    }
}

fn resolve(board: &Board, raw: &str) -> DomainResult<TaskId> {
    board
        .resolve_task_id(raw.trim())
        .ok_or_else(|| DomainError::TaskNotFound(raw.to_string()))
}

fn store_task(board: &mut Board, task: Task) -> DomainResult<()> {
    let slot = board
        .find_task_mut(&task.id)
        .ok_or_else(|| DomainError::TaskNotFound(task.id.to_string()))?;
    *slot = task;
    Ok(())
}

fn wip_reached(board: &Board, column: &str) -> Option<DomainEvent> {
    board
        .column(column)
        .filter(|c| c.is_wip_limit_reached())
        .map(|c| DomainEvent::new(EventType::ColumnWipReached, &board.id, &c.name, None))
}

/// `task.updated` plus the finer-grained topics implied by the diff.
fn change_events(board_id: &str, column: &str, before: &Task, after: &Task) -> Vec<DomainEvent> {
    let event = |kind| DomainEvent::new(kind, board_id, column, Some(after.id.clone()));
    let mut events = vec![event(EventType::TaskUpdated)];

    if before.status != after.status {
        events.push(
            event(EventType::TaskStatusChanged)
                .with_metadata("old_status", before.status.as_str())
                .with_metadata("new_status", after.status.as_str()),
        );
        if after.status == Status::Done {
            events.push(event(EventType::TaskCompleted));
            let on_time = match (after.due_date, after.completed_date) {
                (Some(due), Some(done)) => done <= due,
                _ => false,
            };
            if on_time {
                events.push(event(EventType::TaskCompletedOnTime));
            }
        }
    }
    if before.priority != after.priority {
        events.push(
            event(EventType::TaskPriorityChanged)
                .with_metadata("old_priority", before.priority.as_str())
                .with_metadata("new_priority", after.priority.as_str()),
        );
    }
    match (before.due_date, after.due_date) {
        (None, Some(_)) => events.push(event(EventType::TaskDueDateSet)),
        (Some(old), Some(new)) if old != new => events.push(event(EventType::TaskDueDateChanged)),
        _ => {}
    }
    events
}
