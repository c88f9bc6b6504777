use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use super::{JsonCollection, TimeLogRepository};
use crate::domain::task_id::TaskId;
use crate::domain::time_log::TimeLog;
use crate::domain::{DomainError, DomainResult};

pub struct JsonTimeLogRepository {
    logs: JsonCollection<TimeLog>,
}

impl JsonTimeLogRepository {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            logs: JsonCollection::open(data_dir.join("time_logs.json"))?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            logs: JsonCollection::in_memory(),
        }
    }
}

fn by_start(mut logs: Vec<TimeLog>) -> Vec<TimeLog> {
    logs.sort_by_key(|l| l.start_time);
    logs
}

impl TimeLogRepository for JsonTimeLogRepository {
    fn save(&self, log: &TimeLog) -> DomainResult<()> {
        self.logs.upsert(&log.id, log.clone())
    }

    fn find_by_id(&self, id: &str) -> DomainResult<TimeLog> {
        self.logs
            .get(id)
            .ok_or_else(|| DomainError::TimeLogNotFound(id.to_string()))
    }

    fn list_by_project(&self, project_id: &str) -> DomainResult<Vec<TimeLog>> {
        Ok(by_start(self.logs.filter(|l| l.project_id == project_id)))
    }

    fn list_by_task(&self, task_id: &TaskId) -> DomainResult<Vec<TimeLog>> {
        Ok(by_start(
            self.logs.filter(|l| l.task_id.as_ref() == Some(task_id)),
        ))
    }

    fn list_by_project_in_range(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<TimeLog>> {
        Ok(by_start(self.logs.filter(|l| {
            l.project_id == project_id && l.overlaps(from, to)
        })))
    }

    fn list_running(&self) -> DomainResult<Vec<TimeLog>> {
        Ok(by_start(self.logs.filter(|l| l.is_running())))
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        self.logs
            .remove(id)?
            .map(|_| ())
            .ok_or_else(|| DomainError::TimeLogNotFound(id.to_string()))
    }
}
