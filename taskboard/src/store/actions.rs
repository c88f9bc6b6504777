use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

use super::{ActionRepository, JsonCollection};
use crate::domain::action::Action;
use crate::domain::values::{ActionScope, TriggerType};
use crate::domain::{DomainError, DomainResult};

pub struct JsonActionRepository {
    actions: JsonCollection<Action>,
}

impl JsonActionRepository {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            actions: JsonCollection::open(data_dir.join("actions.json"))?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            actions: JsonCollection::in_memory(),
        }
    }
}

impl ActionRepository for JsonActionRepository {
    fn create(&self, action: &Action) -> DomainResult<()> {
        if self.actions.contains(&action.id) {
            return Err(DomainError::ActionAlreadyExists(action.id.clone()));
        }
        self.actions.upsert(&action.id, action.clone())
    }

    fn update(&self, action: &Action) -> DomainResult<()> {
        let updated = action.clone();
        self.actions
            .modify(&action.id, move |stored| {
                *stored = updated;
                Ok(())
            })?
            .ok_or_else(|| DomainError::ActionNotFound(action.id.clone()))
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        self.actions
            .remove(id)?
            .map(|_| ())
            .ok_or_else(|| DomainError::ActionNotFound(id.to_string()))
    }

    fn get_by_id(&self, id: &str) -> DomainResult<Action> {
        self.actions
            .get(id)
            .ok_or_else(|| DomainError::ActionNotFound(id.to_string()))
    }

    fn list_all(&self) -> DomainResult<Vec<Action>> {
        Ok(self.actions.values())
    }

    fn list_by_scope(&self, scope: ActionScope, scope_id: &str) -> DomainResult<Vec<Action>> {
        Ok(self.actions.filter(|a| {
            a.scope == scope && (scope == ActionScope::Global || a.scope_id == scope_id)
        }))
    }

    fn list_enabled(&self) -> DomainResult<Vec<Action>> {
        Ok(self.actions.filter(|a| a.enabled))
    }

    fn list_by_trigger_type(&self, trigger_type: TriggerType) -> DomainResult<Vec<Action>> {
        Ok(self.actions.filter(|a| a.trigger_type() == trigger_type))
    }

    fn update_last_run(&self, id: &str, at: DateTime<Utc>) -> DomainResult<()> {
        self.actions
            .modify(id, |action| {
                action.mark_as_run(at);
                Ok(())
            })?
            .ok_or_else(|| DomainError::ActionNotFound(id.to_string()))
    }
}
