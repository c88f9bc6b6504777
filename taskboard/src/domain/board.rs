// Board, Column and Task entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{DomainError, DomainResult};
use super::task_id::TaskId;
use super::values::{slugify, Priority, Status};

// ============================================================================
// Task
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_date: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(
        id: TaskId,
        title: &str,
        description: &str,
        priority: Priority,
        status: Status,
    ) -> DomainResult<Self> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::EmptyTaskName);
        }
        let now = Utc::now();
        let mut task = Self {
            id,
            project_id: String::new(),
            title: title.to_string(),
            description: description.to_string(),
            priority,
            status,
            tags: Vec::new(),
            metadata: HashMap::new(),
            parent_id: None,
            created_at: now,
            modified_at: now,
            due_date: None,
            completed_date: None,
        };
        if status == Status::Done {
            task.completed_date = Some(now);
        }
        Ok(task)
    }

    pub fn update_title(&mut self, title: &str) -> DomainResult<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(DomainError::EmptyTaskName);
        }
        self.title = title.to_string();
        self.touch();
        Ok(())
    }

    pub fn update_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.touch();
    }

    pub fn update_priority(&mut self, priority: Priority) {
        self.priority = priority;
        self.touch();
    }

    /// Moving into `done` stamps the completion date; leaving it clears it.
    pub fn update_status(&mut self, status: Status) {
        if status == Status::Done && self.status != Status::Done {
            self.completed_date = Some(Utc::now());
        } else if status != Status::Done {
            self.completed_date = None;
        }
        self.status = status;
        self.touch();
    }

    pub fn mark_as_completed(&mut self) {
        self.update_status(Status::Done);
    }

    pub fn set_due_date(&mut self, due: Option<DateTime<Utc>>) {
        self.due_date = due;
        self.touch();
    }

    pub fn add_tag(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.has_tag(tag) {
            self.tags.push(tag.to_string());
            self.touch();
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        if self.tags.len() != before {
            self.touch();
        }
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn set_metadata(&mut self, key: &str, value: &str) {
        self.metadata.insert(key.to_string(), value.to_string());
        self.touch();
    }

    pub fn is_overdue(&self) -> bool {
        self.is_overdue_at(Utc::now())
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        match self.due_date {
            Some(due) => self.status != Status::Done && due < now,
            None => false,
        }
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

// ============================================================================
// Column
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub order: i32,
    /// 0 means unlimited.
    #[serde(default)]
    pub wip_limit: i32,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl Column {
    pub fn new(name: &str, description: &str, order: i32, wip_limit: i32, color: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyColumnName);
        }
        if wip_limit < 0 {
            return Err(DomainError::InvalidWipLimit(wip_limit));
        }
        Ok(Self {
            name: name.to_string(),
            display_name: name.to_string(),
            description: description.to_string(),
            order,
            wip_limit,
            color: color.to_string(),
            tasks: Vec::new(),
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.name == name || (!self.display_name.is_empty() && self.display_name == name)
    }

    pub fn can_add_task(&self) -> bool {
        self.wip_limit == 0 || (self.tasks.len() as i32) < self.wip_limit
    }

    pub fn is_wip_limit_reached(&self) -> bool {
        self.wip_limit > 0 && (self.tasks.len() as i32) >= self.wip_limit
    }

    pub fn add_task(&mut self, task: Task) -> DomainResult<()> {
        if !self.can_add_task() {
            return Err(DomainError::WipLimitExceeded(self.name.clone()));
        }
        if self.find_task(&task.id).is_some() {
            return Err(DomainError::TaskAlreadyExists(task.id.to_string()));
        }
        self.tasks.push(task);
        Ok(())
    }

    pub fn remove_task(&mut self, id: &TaskId) -> DomainResult<Task> {
        let idx = self
            .tasks
            .iter()
            .position(|t| &t.id == id)
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
        Ok(self.tasks.remove(idx))
    }

    pub fn find_task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }
}

// ============================================================================
// Board
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Board {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub prefix: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub columns: Vec<Column>,
    pub next_task_num: u32,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// `<project_id>/<board-slug>`.
pub fn board_id_for(project_id: &str, board_name: &str) -> String {
    format!("{}/{}", project_id, slugify(board_name))
}

/// First three alphanumerics of the name, uppercased and padded with `X`.
pub fn generate_board_prefix(name: &str) -> String {
    let mut prefix: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if prefix.is_empty() {
        return "BRD".to_string();
    }
    while prefix.len() < 3 {
        prefix.push('X');
    }
    prefix
}

impl Board {
    pub fn new(project_id: &str, name: &str, description: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyBoardName);
        }
        let now = Utc::now();
        Ok(Self {
            id: board_id_for(project_id, name),
            project_id: project_id.to_string(),
            name: name.to_string(),
            prefix: generate_board_prefix(name),
            description: description.to_string(),
            columns: Vec::new(),
            next_task_num: 1,
            created_at: now,
            modified_at: now,
        })
    }

    pub fn add_column(&mut self, column: Column) -> DomainResult<()> {
        if self.columns.iter().any(|c| c.name == column.name) {
            return Err(DomainError::ColumnAlreadyExists(column.name));
        }
        self.columns.push(column);
        self.columns.sort_by_key(|c| c.order);
        self.touch();
        Ok(())
    }

    pub fn remove_column(&mut self, name: &str) -> DomainResult<Column> {
        let idx = self
            .columns
            .iter()
            .position(|c| c.matches(name))
            .ok_or_else(|| DomainError::ColumnNotFound(name.to_string()))?;
        if !self.columns[idx].tasks.is_empty() {
            return Err(DomainError::ColumnNotEmpty(name.to_string()));
        }
        self.touch();
        Ok(self.columns.remove(idx))
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.matches(name))
    }

    pub fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.matches(name))
    }

    /// Returns the task and the column holding it.
    pub fn find_task(&self, id: &TaskId) -> Option<(&Task, &Column)> {
        self.columns
            .iter()
            .find_map(|c| c.find_task(id).map(|t| (t, c)))
    }

    pub fn find_task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.columns
            .iter_mut()
            .find_map(|c| c.tasks.iter_mut().find(|t| &t.id == id))
    }

    /// Resolve a full id or a short `PRE-001` id against this board.
    pub fn resolve_task_id(&self, raw: &str) -> Option<TaskId> {
        if let Ok(id) = raw.parse::<TaskId>() {
            return self.find_task(&id).map(|(t, _)| t.id.clone());
        }
        let (prefix, number) = super::task_id::parse_short_id(raw)?;
        self.all_tasks()
            .find(|t| t.id.prefix() == prefix && t.id.number() == number)
            .map(|t| t.id.clone())
    }

    pub fn all_tasks(&self) -> impl Iterator<Item = &Task> {
        self.columns.iter().flat_map(|c| c.tasks.iter())
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    pub fn add_task(&mut self, column_name: &str, mut task: Task) -> DomainResult<()> {
        if task.project_id.is_empty() {
            task.project_id = self.project_id.clone();
        }
        let column = self
            .column_mut(column_name)
            .ok_or_else(|| DomainError::ColumnNotFound(column_name.to_string()))?;
        column.add_task(task)?;
        self.touch();
        Ok(())
    }

    pub fn remove_task(&mut self, id: &TaskId) -> DomainResult<Task> {
        let column = self
            .columns
            .iter_mut()
            .find(|c| c.find_task(id).is_some())
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
        let task = column.remove_task(id)?;
        self.touch();
        Ok(task)
    }

    /// Move a task, checking the target's WIP limit before touching the source.
    pub fn move_task(&mut self, id: &TaskId, target: &str) -> DomainResult<()> {
        let target_col = self
            .column(target)
            .ok_or_else(|| DomainError::ColumnNotFound(target.to_string()))?;
        let source_name = self
            .find_task(id)
            .map(|(_, c)| c.name.clone())
            .ok_or_else(|| DomainError::TaskNotFound(id.to_string()))?;
        if target_col.name == source_name {
            return Ok(());
        }
        if !target_col.can_add_task() {
            return Err(DomainError::WipLimitExceeded(target_col.name.clone()));
        }
        let target_name = target_col.name.clone();

        let task = self.remove_task(id)?;
        if let Err(err) = self.add_task(&target_name, task.clone()) {
            // Put it back where it was
            let _ = self.add_task(&source_name, task);
            return Err(err);
        }
        Ok(())
    }

    pub fn generate_next_task_id(&mut self, title: &str) -> DomainResult<TaskId> {
        let id = TaskId::new(&self.prefix, self.next_task_num, title)?;
        self.next_task_num += 1;
        self.touch();
        Ok(id)
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board_with_columns() -> Board {
        let mut board = Board::new("proj", "Main Board", "").unwrap();
        board.add_column(Column::new("To Do", "", 0, 0, "").unwrap()).unwrap();
        board.add_column(Column::new("In Progress", "", 1, 1, "").unwrap()).unwrap();
        board.add_column(Column::new("Done", "", 2, 0, "").unwrap()).unwrap();
        board
    }

    fn add(board: &mut Board, column: &str, title: &str) -> TaskId {
        let id = board.generate_next_task_id(title).unwrap();
        let task = Task::new(id.clone(), title, "", Priority::Medium, Status::Todo).unwrap();
        board.add_task(column, task).unwrap();
        id
    }

    #[test]
    fn test_board_identity() {
        let board = Board::new("proj", "Main Board", "").unwrap();
        assert_eq!(board.id, "proj/main-board");
        assert_eq!(board.prefix, "MAI");
        assert_eq!(generate_board_prefix("a!"), "AXX");
        assert_eq!(generate_board_prefix("--"), "BRD");
    }

    #[test]
    fn test_task_ids_increment() {
        let mut board = board_with_columns();
        let first = add(&mut board, "To Do", "First");
        let second = add(&mut board, "To Do", "Second");
        assert_eq!(first.to_string(), "MAI-001-first");
        assert_eq!(second.short_id(), "MAI-002");
        assert_eq!(board.resolve_task_id("MAI-002"), Some(second));
        assert_eq!(board.resolve_task_id("MAI-009"), None);
    }

    #[test]
    fn test_move_respects_wip_limit() {
        let mut board = board_with_columns();
        let a = add(&mut board, "To Do", "A");
        let b = add(&mut board, "To Do", "B");
        board.move_task(&a, "In Progress").unwrap();
        let err = board.move_task(&b, "In Progress").unwrap_err();
        assert_eq!(err, DomainError::WipLimitExceeded("In Progress".to_string()));
        // Source untouched after a rejected move
        assert_eq!(board.find_task(&b).unwrap().1.name, "To Do");
    }

    #[test]
    fn test_remove_column_requires_empty() {
        let mut board = board_with_columns();
        add(&mut board, "Done", "Old");
        assert!(matches!(board.remove_column("Done"), Err(DomainError::ColumnNotEmpty(_))));
        assert!(board.remove_column("In Progress").is_ok());
        assert!(matches!(
            board.add_column(Column::new("To Do", "", 5, 0, "").unwrap()),
            Err(DomainError::ColumnAlreadyExists(_))
        ));
    }

    #[test]
    fn test_status_done_stamps_completion() {
        let id = TaskId::new("ABC", 1, "x").unwrap();
        let mut task = Task::new(id, "x", "", Priority::None, Status::Todo).unwrap();
        task.add_tag("a");
        task.add_tag("a");
        assert_eq!(task.tags, vec!["a".to_string()]);
        task.mark_as_completed();
        assert!(task.completed_date.is_some());
        task.update_status(Status::InProgress);
        assert!(task.completed_date.is_none());
    }

    #[test]
    fn test_overdue() {
        let id = TaskId::new("ABC", 1, "x").unwrap();
        let mut task = Task::new(id, "x", "", Priority::None, Status::Todo).unwrap();
        let now = Utc::now();
        assert!(!task.is_overdue_at(now));
        task.set_due_date(Some(now - chrono::Duration::hours(1)));
        assert!(task.is_overdue_at(now));
        task.mark_as_completed();
        assert!(!task.is_overdue_at(now));
    }

    #[test]
    fn test_empty_title_rejected() {
        let id = TaskId::new("ABC", 1, "x").unwrap();
        assert_eq!(
            Task::new(id, "   ", "", Priority::None, Status::Todo).unwrap_err(),
            DomainError::EmptyTaskName
        );
    }
}
