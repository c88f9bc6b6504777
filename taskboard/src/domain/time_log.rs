// Time log entries produced by manual timers, auto tracking and manual entry

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::task_id::TaskId;
use super::values::TimeLogSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeLog {
    pub id: String,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<TaskId>,
    pub source: TimeLogSource,
    pub start_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Whole seconds; zero while running.
    #[serde(default)]
    pub duration_secs: i64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl TimeLog {
    pub fn start(
        project_id: &str,
        task_id: Option<TaskId>,
        source: TimeLogSource,
        start_time: DateTime<Utc>,
        description: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            task_id,
            source,
            start_time,
            end_time: None,
            duration_secs: 0,
            description: description.to_string(),
            metadata: HashMap::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.end_time.is_none()
    }

    pub fn stop(&mut self, end: DateTime<Utc>) -> DomainResult<()> {
        if !self.is_running() {
            return Err(DomainError::TimeLogAlreadyStopped);
        }
        if end < self.start_time {
            return Err(DomainError::InvalidEndTime);
        }
        self.end_time = Some(end);
        self.duration_secs = (end - self.start_time).num_seconds();
        Ok(())
    }

    /// Fix the duration of a manual entry; sets the end time accordingly.
    pub fn set_duration(&mut self, duration: Duration) -> DomainResult<()> {
        if duration < Duration::zero() {
            return Err(DomainError::InvalidDuration);
        }
        self.end_time = Some(self.start_time + duration);
        self.duration_secs = duration.num_seconds();
        Ok(())
    }

    /// Elapsed time so far for running logs.
    pub fn duration_at(&self, now: DateTime<Utc>) -> Duration {
        match self.end_time {
            Some(end) => end - self.start_time,
            None => now - self.start_time,
        }
    }

    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        let end = self.end_time.unwrap_or_else(Utc::now);
        self.start_time < to && end >= from
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_computes_duration_once() {
        let start = Utc::now() - Duration::minutes(30);
        let mut log = TimeLog::start("proj", None, TimeLogSource::Timer, start, "");
        assert!(log.is_running());
        log.stop(start + Duration::minutes(30)).unwrap();
        assert_eq!(log.duration_secs, 1800);
        assert_eq!(log.stop(Utc::now()), Err(DomainError::TimeLogAlreadyStopped));
    }

    #[test]
    fn test_stop_rejects_end_before_start() {
        let start = Utc::now();
        let mut log = TimeLog::start("proj", None, TimeLogSource::Timer, start, "");
        assert_eq!(log.stop(start - Duration::seconds(1)), Err(DomainError::InvalidEndTime));
    }

    #[test]
    fn test_manual_duration() {
        let start = Utc::now() - Duration::hours(2);
        let mut log = TimeLog::start("proj", None, TimeLogSource::Manual, start, "review");
        log.set_duration(Duration::minutes(45)).unwrap();
        assert!(!log.is_running());
        assert_eq!(log.end_time, Some(start + Duration::minutes(45)));
        assert!(log.set_duration(Duration::seconds(-1)).is_err());
    }
}
