// Domain error taxonomy
//
// Every variant renders to the string clients see in a failed Response.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    // Boards, columns and tasks
    #[error("board not found: {0}")]
    BoardNotFound(String),
    #[error("board name cannot be empty")]
    EmptyBoardName,
    #[error("board already exists: {0}")]
    BoardAlreadyExists(String),
    #[error("column not found: {0}")]
    ColumnNotFound(String),
    #[error("column name cannot be empty")]
    EmptyColumnName,
    #[error("column already exists: {0}")]
    ColumnAlreadyExists(String),
    #[error("column {0} still contains tasks")]
    ColumnNotEmpty(String),
    #[error("invalid WIP limit: {0}")]
    InvalidWipLimit(i32),
    #[error("task not found: {0}")]
    TaskNotFound(String),
    #[error("task already exists: {0}")]
    TaskAlreadyExists(String),
    #[error("WIP limit exceeded for column {0}")]
    WipLimitExceeded(String),
    #[error("task title cannot be empty")]
    EmptyTaskName,
    #[error("invalid task ID: {0}")]
    InvalidTaskId(String),
    #[error("invalid priority: {0}")]
    InvalidPriority(String),
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    // Actions
    #[error("action not found: {0}")]
    ActionNotFound(String),
    #[error("action already exists: {0}")]
    ActionAlreadyExists(String),
    #[error("invalid action ID")]
    InvalidActionId,
    #[error("invalid action name")]
    InvalidActionName,
    #[error("invalid action scope: {0}")]
    InvalidActionScope(String),
    #[error("invalid action type: {0}")]
    InvalidActionType(String),
    #[error("invalid trigger: {0}")]
    InvalidTrigger(String),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
    #[error("invalid event type: {0}")]
    InvalidEventType(String),
    #[error("action is disabled")]
    ActionDisabled,
    #[error("notification title cannot be empty")]
    InvalidNotificationTitle,
    #[error("notification message cannot be empty")]
    InvalidNotificationMessage,
    #[error("script path cannot be empty")]
    InvalidScriptPath,
    #[error("target column cannot be empty")]
    InvalidTargetColumn,
    #[error("{0} is required in action context")]
    MissingContext(&'static str),
    #[error("notifier not available")]
    NotifierNotAvailable,
    #[error("script runner not available")]
    ScriptRunnerNotAvailable,
    #[error("task mutator not available")]
    TaskMutatorNotAvailable,

    // Projects, time tracking, sessions
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("project name cannot be empty")]
    EmptyProjectName,
    #[error("project already exists: {0}")]
    ProjectAlreadyExists(String),
    #[error("project ID is required")]
    EmptyProjectId,
    #[error("time log not found: {0}")]
    TimeLogNotFound(String),
    #[error("time log already stopped")]
    TimeLogAlreadyStopped,
    #[error("end time cannot be before start time")]
    InvalidEndTime,
    #[error("duration cannot be negative")]
    InvalidDuration,
    #[error("session name cannot be empty")]
    EmptySessionName,
    #[error("working directory cannot be empty")]
    EmptyWorkingDir,

    // Collaborators
    #[error("{0}")]
    External(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn external(err: impl std::fmt::Display) -> Self {
        DomainError::External(err.to_string())
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        DomainError::Storage(err.to_string())
    }
}
