// Repositories backing the daemon
//
// Each collection lives in one JSON file under the data directory and is
// rewritten atomically after every mutation.

mod actions;
mod boards;
mod projects;
mod time_logs;

pub use actions::JsonActionRepository;
pub use boards::JsonBoardRepository;
pub use projects::JsonProjectRepository;
pub use time_logs::JsonTimeLogRepository;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::domain::action::Action;
use crate::domain::board::Board;
use crate::domain::project::Project;
use crate::domain::task_id::TaskId;
use crate::domain::time_log::TimeLog;
use crate::domain::values::{ActionScope, TriggerType};
use crate::domain::{DomainError, DomainResult};

// ============================================================================
// Repository contracts
// ============================================================================

pub trait BoardRepository: Send + Sync {
    fn save(&self, board: &Board) -> DomainResult<()>;
    fn find_by_id(&self, id: &str) -> DomainResult<Board>;
    fn exists(&self, id: &str) -> bool;
    fn list(&self) -> DomainResult<Vec<Board>>;
    fn list_by_project(&self, project_id: &str) -> DomainResult<Vec<Board>>;
    fn delete(&self, id: &str) -> DomainResult<()>;
}

pub trait ActionRepository: Send + Sync {
    fn create(&self, action: &Action) -> DomainResult<()>;
    fn update(&self, action: &Action) -> DomainResult<()>;
    fn delete(&self, id: &str) -> DomainResult<()>;
    fn get_by_id(&self, id: &str) -> DomainResult<Action>;
    fn list_all(&self) -> DomainResult<Vec<Action>>;
    fn list_by_scope(&self, scope: ActionScope, scope_id: &str) -> DomainResult<Vec<Action>>;
    fn list_global(&self) -> DomainResult<Vec<Action>> {
        self.list_by_scope(ActionScope::Global, "")
    }
    fn list_by_board(&self, board_id: &str) -> DomainResult<Vec<Action>> {
        self.list_by_scope(ActionScope::Board, board_id)
    }
    fn list_by_column(&self, column_id: &str) -> DomainResult<Vec<Action>> {
        self.list_by_scope(ActionScope::Column, column_id)
    }
    fn list_by_task(&self, task_id: &str) -> DomainResult<Vec<Action>> {
        self.list_by_scope(ActionScope::Task, task_id)
    }
    fn list_enabled(&self) -> DomainResult<Vec<Action>>;
    fn list_by_trigger_type(&self, trigger_type: TriggerType) -> DomainResult<Vec<Action>>;
    fn update_last_run(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()>;
}

pub trait ProjectRepository: Send + Sync {
    fn save(&self, project: &Project) -> DomainResult<()>;
    fn find_by_id(&self, id: &str) -> DomainResult<Project>;
    fn find_by_slug(&self, slug: &str) -> DomainResult<Project>;
    fn find_by_working_dir(&self, dir: &str) -> DomainResult<Option<Project>>;
    fn list(&self) -> DomainResult<Vec<Project>>;
    fn delete(&self, id: &str) -> DomainResult<()>;
}

pub trait TimeLogRepository: Send + Sync {
    fn save(&self, log: &TimeLog) -> DomainResult<()>;
    fn find_by_id(&self, id: &str) -> DomainResult<TimeLog>;
    fn list_by_project(&self, project_id: &str) -> DomainResult<Vec<TimeLog>>;
    fn list_by_task(&self, task_id: &TaskId) -> DomainResult<Vec<TimeLog>>;
    fn list_by_project_in_range(
        &self,
        project_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> DomainResult<Vec<TimeLog>>;
    fn list_running(&self) -> DomainResult<Vec<TimeLog>>;
    fn delete(&self, id: &str) -> DomainResult<()>;
}

// ============================================================================
// JSON-file collection
// ============================================================================

/// Keyed collection mirrored to one JSON file, or kept in memory only.
pub struct JsonCollection<T> {
    path: Option<PathBuf>,
    items: RwLock<BTreeMap<String, T>>,
}

impl<T> JsonCollection<T>
where
    T: Serialize + DeserializeOwned + Clone,
{
    /// Load the collection, starting empty if the file doesn't exist.
    pub fn open(path: PathBuf) -> Result<Self> {
        let items = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if contents.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
        } else {
            BTreeMap::new()
        };
        Ok(Self {
            path: Some(path),
            items: RwLock::new(items),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            path: None,
            items: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<T> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn values(&self) -> Vec<T> {
        self.read().values().cloned().collect()
    }

    pub fn filter<F>(&self, mut keep: F) -> Vec<T>
    where
        F: FnMut(&T) -> bool,
    {
        self.read().values().filter(|v| keep(v)).cloned().collect()
    }

    pub fn upsert(&self, key: &str, item: T) -> DomainResult<()> {
        let mut items = self.write();
        items.insert(key.to_string(), item);
        self.persist(&items)
    }

    /// Apply `f` to an existing item and persist; None when the key is absent.
    pub fn modify<R, F>(&self, key: &str, f: F) -> DomainResult<Option<R>>
    where
        F: FnOnce(&mut T) -> DomainResult<R>,
    {
        let mut items = self.write();
        let Some(item) = items.get_mut(key) else {
            return Ok(None);
        };
        let result = f(item)?;
        self.persist(&items)?;
        Ok(Some(result))
    }

    pub fn remove(&self, key: &str) -> DomainResult<Option<T>> {
        let mut items = self.write();
        let removed = items.remove(key);
        if removed.is_some() {
            self.persist(&items)?;
        }
        Ok(removed)
    }

    fn persist(&self, items: &BTreeMap<String, T>) -> DomainResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let contents = serde_json::to_string_pretty(items).map_err(DomainError::storage)?;
        atomic_write(path, &contents).map_err(|e| DomainError::storage(format!("{e:#}")))
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, T>> {
        self.items.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, T>> {
        self.items.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Atomically replace a file using write-to-temp + rename.
pub fn atomic_write(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("Invalid path: {}", path.display()))?;
    fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create directory: {}", parent.display()))?;

    // Same directory keeps the rename on one filesystem
    let temp_path = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown"),
        std::process::id()
    ));

    fs::write(&temp_path, contents)
        .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;
    fs::rename(&temp_path, path).with_context(|| {
        format!(
            "Failed to rename {} to {}",
            temp_path.display(),
            path.display()
        )
    })?;
    Ok(())
}
