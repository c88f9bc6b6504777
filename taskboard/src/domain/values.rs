// Small closed value types shared across the domain

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::DomainError;

/// Task priority, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::None => "none",
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }

    /// Numeric rank used by ordering comparisons in conditions.
    pub fn rank(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" | "none" => Ok(Priority::None),
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(DomainError::InvalidPriority(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Todo,
    InProgress,
    Blocked,
    InReview,
    Done,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "todo",
            Status::InProgress => "in_progress",
            Status::Blocked => "blocked",
            Status::InReview => "in_review",
            Status::Done => "done",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "todo" => Ok(Status::Todo),
            "in_progress" => Ok(Status::InProgress),
            "blocked" => Ok(Status::Blocked),
            "in_review" => Ok(Status::InReview),
            "done" => Ok(Status::Done),
            other => Err(DomainError::InvalidStatus(other.to_string())),
        }
    }
}

/// Where an action applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionScope {
    Global,
    Board,
    Column,
    Task,
}

impl ActionScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionScope::Global => "global",
            ActionScope::Board => "board",
            ActionScope::Column => "column",
            ActionScope::Task => "task",
        }
    }
}

impl fmt::Display for ActionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionScope {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "global" => Ok(ActionScope::Global),
            "board" => Ok(ActionScope::Board),
            "column" => Ok(ActionScope::Column),
            "task" => Ok(ActionScope::Task),
            other => Err(DomainError::InvalidActionScope(other.to_string())),
        }
    }
}

/// Discriminator of a trigger, used for repository filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    Time,
    Event,
}

impl FromStr for TriggerType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "time" => Ok(TriggerType::Time),
            "event" => Ok(TriggerType::Event),
            other => Err(DomainError::InvalidTrigger(format!("unknown trigger type {other}"))),
        }
    }
}

/// Topics published on the event bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "task.created")]
    TaskCreated,
    #[serde(rename = "task.updated")]
    TaskUpdated,
    #[serde(rename = "task.deleted")]
    TaskDeleted,
    #[serde(rename = "task.moved")]
    TaskMoved,
    #[serde(rename = "task.status_changed")]
    TaskStatusChanged,
    #[serde(rename = "task.priority_changed")]
    TaskPriorityChanged,
    #[serde(rename = "task.due_date_set")]
    TaskDueDateSet,
    #[serde(rename = "task.due_date_changed")]
    TaskDueDateChanged,
    #[serde(rename = "task.completed")]
    TaskCompleted,
    #[serde(rename = "task.due_approaching")]
    TaskDueApproaching,
    #[serde(rename = "task.overdue")]
    TaskOverdue,
    #[serde(rename = "task.completed_on_time")]
    TaskCompletedOnTime,
    #[serde(rename = "column.created")]
    ColumnCreated,
    #[serde(rename = "column.deleted")]
    ColumnDeleted,
    #[serde(rename = "column.wip_reached")]
    ColumnWipReached,
}

impl EventType {
    pub const ALL: [EventType; 15] = [
        EventType::TaskCreated,
        EventType::TaskUpdated,
        EventType::TaskDeleted,
        EventType::TaskMoved,
        EventType::TaskStatusChanged,
        EventType::TaskPriorityChanged,
        EventType::TaskDueDateSet,
        EventType::TaskDueDateChanged,
        EventType::TaskCompleted,
        EventType::TaskDueApproaching,
        EventType::TaskOverdue,
        EventType::TaskCompletedOnTime,
        EventType::ColumnCreated,
        EventType::ColumnDeleted,
        EventType::ColumnWipReached,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::TaskCreated => "task.created",
            EventType::TaskUpdated => "task.updated",
            EventType::TaskDeleted => "task.deleted",
            EventType::TaskMoved => "task.moved",
            EventType::TaskStatusChanged => "task.status_changed",
            EventType::TaskPriorityChanged => "task.priority_changed",
            EventType::TaskDueDateSet => "task.due_date_set",
            EventType::TaskDueDateChanged => "task.due_date_changed",
            EventType::TaskCompleted => "task.completed",
            EventType::TaskDueApproaching => "task.due_approaching",
            EventType::TaskOverdue => "task.overdue",
            EventType::TaskCompletedOnTime => "task.completed_on_time",
            EventType::ColumnCreated => "column.created",
            EventType::ColumnDeleted => "column.deleted",
            EventType::ColumnWipReached => "column.wip_reached",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .iter()
            .copied()
            .find(|event| event.as_str() == s)
            .ok_or_else(|| DomainError::InvalidEventType(s.to_string()))
    }
}

/// Origin of a time log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeLogSource {
    Manual,
    Timer,
    Git,
    Tmux,
}

impl TimeLogSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeLogSource::Manual => "manual",
            TimeLogSource::Timer => "timer",
            TimeLogSource::Git => "git",
            TimeLogSource::Tmux => "tmux",
        }
    }
}

impl fmt::Display for TimeLogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowercase, collapse every run of non-alphanumerics into `-`, trim dashes.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut pending_dash = false;
    for ch in input.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "project".to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_and_parse() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::Low > Priority::None);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert_eq!("".parse::<Priority>().unwrap(), Priority::None);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_event_type_wire_names() {
        for event in EventType::ALL {
            let json = serde_json::to_string(&event).unwrap();
            assert_eq!(json, format!("\"{}\"", event.as_str()));
            assert_eq!(event.as_str().parse::<EventType>().unwrap(), event);
        }
        assert!("task.exploded".parse::<EventType>().is_err());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("My Cool Project"), "my-cool-project");
        assert_eq!(slugify("  --api__server!! "), "api-server");
        assert_eq!(slugify("???"), "project");
    }
}
