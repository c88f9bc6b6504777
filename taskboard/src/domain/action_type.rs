// Effects an action performs once it fires, and the capabilities they need

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::board::{Board, Column, Task};
use super::error::{DomainError, DomainResult};
use super::event::DomainEvent;
use super::task_id::TaskId;
use super::values::{Priority, Status};

// ============================================================================
// Capabilities
// ============================================================================

pub trait Notifier: Send + Sync {
    fn send_notification(
        &self,
        title: &str,
        message: &str,
        metadata: &HashMap<String, String>,
    ) -> DomainResult<()>;
}

pub trait ScriptRunner: Send + Sync {
    /// Returns the script's combined output.
    fn run_script(&self, script_path: &str, env: &HashMap<String, String>) -> DomainResult<String>;
}

/// Write access to boards for automation effects.
pub trait TaskMutator: Send + Sync {
    fn update_task(&self, board_id: &str, task: &Task) -> DomainResult<()>;
    fn move_task(&self, board_id: &str, task_id: &TaskId, column_name: &str) -> DomainResult<()>;
    fn create_task(&self, board_id: &str, column_name: &str, task: Task) -> DomainResult<()>;
}

/// Snapshot plus capabilities handed to an executing action.
#[derive(Clone)]
pub struct ActionContext {
    pub current_time: DateTime<Utc>,
    pub task: Option<Task>,
    pub column: Option<Arc<Column>>,
    pub board: Option<Arc<Board>>,
    pub event: Option<Arc<DomainEvent>>,
    pub notifier: Option<Arc<dyn Notifier>>,
    pub script_runner: Option<Arc<dyn ScriptRunner>>,
    pub task_mutator: Option<Arc<dyn TaskMutator>>,
}

impl ActionContext {
    pub fn new(current_time: DateTime<Utc>) -> Self {
        Self {
            current_time,
            task: None,
            column: None,
            board: None,
            event: None,
            notifier: None,
            script_runner: None,
            task_mutator: None,
        }
    }

    /// Board id from the board snapshot, falling back to the event.
    fn board_id(&self) -> Option<String> {
        self.board
            .as_ref()
            .map(|b| b.id.clone())
            .or_else(|| self.event.as_ref().map(|e| e.board_id.clone()))
            .filter(|id| !id.is_empty())
    }
}

// ============================================================================
// Variants
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionType {
    Notification(NotificationAction),
    Script(ScriptAction),
    TaskMutation(TaskMutationAction),
    TaskMovement(TaskMovementAction),
    TaskCreation(TaskCreationAction),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptAction {
    pub script_path: String,
    #[serde(default, rename = "script_env")]
    pub env_vars: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TaskMutationAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_status: Option<Status>,
    #[serde(default)]
    pub add_tags: Vec<String>,
    #[serde(default)]
    pub remove_tags: Vec<String>,
    #[serde(default)]
    pub set_metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskMovementAction {
    pub target_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCreationAction {
    #[serde(rename = "task_title")]
    pub title: String,
    #[serde(default, rename = "task_description")]
    pub description: String,
    #[serde(default = "default_creation_priority", rename = "task_priority")]
    pub priority: Priority,
    #[serde(default, rename = "task_status")]
    pub status: Status,
    #[serde(rename = "task_column")]
    pub column_name: String,
    #[serde(default, rename = "task_tags")]
    pub tags: Vec<String>,
    #[serde(default, rename = "task_metadata")]
    pub metadata: HashMap<String, String>,
}

fn default_creation_priority() -> Priority {
    Priority::Medium
}

impl ActionType {
    pub fn name(&self) -> &'static str {
        match self {
            ActionType::Notification(_) => "notification",
            ActionType::Script(_) => "script",
            ActionType::TaskMutation(_) => "task_mutation",
            ActionType::TaskMovement(_) => "task_movement",
            ActionType::TaskCreation(_) => "task_creation",
        }
    }

    pub fn validate(&self) -> DomainResult<()> {
        match self {
            ActionType::Notification(a) => a.validate(),
            ActionType::Script(a) => a.validate(),
            ActionType::TaskMutation(_) => Ok(()),
            ActionType::TaskMovement(a) => a.validate(),
            ActionType::TaskCreation(a) => a.validate(),
        }
    }

    pub fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        match self {
            ActionType::Notification(a) => a.execute(ctx),
            ActionType::Script(a) => a.execute(ctx),
            ActionType::TaskMutation(a) => a.execute(ctx),
            ActionType::TaskMovement(a) => a.execute(ctx),
            ActionType::TaskCreation(a) => a.execute(ctx),
        }
    }
}

impl NotificationAction {
    fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::InvalidNotificationTitle);
        }
        if self.message.trim().is_empty() {
            return Err(DomainError::InvalidNotificationMessage);
        }
        Ok(())
    }

    fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        let notifier = ctx.notifier.as_ref().ok_or(DomainError::NotifierNotAvailable)?;
        let title = interpolate(&self.title, ctx);
        let message = interpolate(&self.message, ctx);
        notifier.send_notification(&title, &message, &self.metadata)
    }
}

/// Replace `{{task.title}}`-style placeholders with context values.
/// Placeholders without a value are left as written.
fn interpolate(template: &str, ctx: &ActionContext) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    let mut vars: Vec<(&str, String)> = Vec::new();
    if let Some(task) = &ctx.task {
        vars.push(("task.id", task.id.to_string()));
        vars.push(("task.title", task.title.clone()));
        vars.push(("task.priority", task.priority.to_string()));
        vars.push(("task.status", task.status.to_string()));
        if let Some(due) = task.due_date {
            vars.push(("task.due_date", due.to_rfc3339()));
        }
    }
    if let Some(board) = &ctx.board {
        vars.push(("board.id", board.id.clone()));
        vars.push(("board.name", board.name.clone()));
    }
    if let Some(column) = &ctx.column {
        vars.push(("column.name", column.name.clone()));
    }
    if let Some(event) = &ctx.event {
        vars.push(("event.type", event.event_type.to_string()));
    }

    let mut out = template.to_string();
    for (key, value) in vars {
        out = out.replace(&format!("{{{{{key}}}}}"), &value);
    }
    out
}

impl ScriptAction {
    fn validate(&self) -> DomainResult<()> {
        if self.script_path.trim().is_empty() {
            return Err(DomainError::InvalidScriptPath);
        }
        Ok(())
    }

    fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        let runner = ctx
            .script_runner
            .as_ref()
            .ok_or(DomainError::ScriptRunnerNotAvailable)?;
        let env = self.build_env(ctx);
        runner.run_script(&self.script_path, &env).map(|_| ())
    }

    /// Static variables first; live context wins on conflicts.
    pub fn build_env(&self, ctx: &ActionContext) -> HashMap<String, String> {
        let mut env = self.env_vars.clone();
        if let Some(task) = &ctx.task {
            env.insert("TASK_ID".into(), task.id.to_string());
            env.insert("TASK_TITLE".into(), task.title.clone());
            env.insert("TASK_PRIORITY".into(), task.priority.to_string());
            env.insert("TASK_STATUS".into(), task.status.to_string());
        }
        if let Some(board) = &ctx.board {
            env.insert("BOARD_ID".into(), board.id.clone());
            env.insert("BOARD_NAME".into(), board.name.clone());
        }
        if let Some(column) = &ctx.column {
            env.insert("COLUMN_NAME".into(), column.name.clone());
        }
        env
    }
}

impl TaskMutationAction {
    fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        let mut task = ctx.task.clone().ok_or(DomainError::MissingContext("task"))?;
        let mutator = ctx
            .task_mutator
            .as_ref()
            .ok_or(DomainError::TaskMutatorNotAvailable)?;
        let board_id = ctx.board_id().ok_or(DomainError::MissingContext("board"))?;

        if let Some(priority) = self.update_priority {
            task.update_priority(priority);
        }
        if let Some(status) = self.update_status {
            task.update_status(status);
        }
        for tag in &self.add_tags {
            task.add_tag(tag);
        }
        for tag in &self.remove_tags {
            task.remove_tag(tag);
        }
        for (key, value) in &self.set_metadata {
            task.set_metadata(key, value);
        }
        mutator.update_task(&board_id, &task)
    }
}

impl TaskMovementAction {
    fn validate(&self) -> DomainResult<()> {
        if self.target_column.trim().is_empty() {
            return Err(DomainError::InvalidTargetColumn);
        }
        Ok(())
    }

    fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        let task = ctx.task.as_ref().ok_or(DomainError::MissingContext("task"))?;
        let mutator = ctx
            .task_mutator
            .as_ref()
            .ok_or(DomainError::TaskMutatorNotAvailable)?;
        let board_id = ctx.board_id().ok_or(DomainError::MissingContext("board"))?;
        mutator.move_task(&board_id, &task.id, &self.target_column)
    }
}

impl TaskCreationAction {
    fn validate(&self) -> DomainResult<()> {
        if self.title.trim().is_empty() {
            return Err(DomainError::EmptyTaskName);
        }
        if self.column_name.trim().is_empty() {
            return Err(DomainError::InvalidTargetColumn);
        }
        Ok(())
    }

    fn execute(&self, ctx: &ActionContext) -> DomainResult<()> {
        let board = ctx.board.as_ref().ok_or(DomainError::MissingContext("board"))?;
        let mutator = ctx
            .task_mutator
            .as_ref()
            .ok_or(DomainError::TaskMutatorNotAvailable)?;

        let title = interpolate(&self.title, ctx);
        let mut scratch = Board::clone(board);
        let id = scratch.generate_next_task_id(&title)?;
        let mut task = Task::new(id, &title, &self.description, self.priority, self.status)?;
        task.project_id = board.project_id.clone();
        for tag in &self.tags {
            task.add_tag(tag);
        }
        for (key, value) in &self.metadata {
            task.set_metadata(key, value);
        }
        mutator.create_task(&board.id, &self.column_name, task)
    }
}
