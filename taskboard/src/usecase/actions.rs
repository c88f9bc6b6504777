// Action CRUD and enable/disable

use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::action::Action;
use crate::domain::action_type::ActionType;
use crate::domain::condition::{Condition, ConditionGroup, LogicalOperator};
use crate::domain::trigger::Trigger;
use crate::domain::values::{ActionScope, TriggerType};
use crate::domain::DomainResult;
use crate::store::ActionRepository;

/// Conditions arrive either as a bare list (AND) or as a full group.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ConditionsPayload {
    List(Vec<Condition>),
    Group(ConditionGroup),
}

impl From<ConditionsPayload> for ConditionGroup {
    fn from(payload: ConditionsPayload) -> Self {
        match payload {
            ConditionsPayload::List(conditions) => ConditionGroup::new(LogicalOperator::And, conditions),
            ConditionsPayload::Group(group) => group,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateActionRequest {
    /// Generated when empty.
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scope: String,
    #[serde(default)]
    pub scope_id: String,
    pub trigger: Trigger,
    pub action_type: ActionType,
    #[serde(default)]
    pub conditions: Option<ConditionsPayload>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateActionRequest {
    pub action_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub trigger: Option<Trigger>,
    #[serde(default)]
    pub action_type: Option<ActionType>,
    #[serde(default)]
    pub conditions: Option<ConditionsPayload>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListActionsRequest {
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub scope_id: String,
    #[serde(default)]
    pub enabled_only: bool,
    #[serde(default)]
    pub trigger_type: Option<String>,
}

pub struct ActionService {
    actions: Arc<dyn ActionRepository>,
}

impl ActionService {
    pub fn new(actions: Arc<dyn ActionRepository>) -> Self {
        Self { actions }
    }

    pub fn create_action(&self, req: CreateActionRequest) -> DomainResult<Action> {
        let scope: ActionScope = req.scope.parse()?;
        let id = if req.id.trim().is_empty() {
            Uuid::new_v4().to_string()
        } else {
            req.id
        };
        let action = Action::new(
            &id,
            &req.name,
            &req.description,
            scope,
            &req.scope_id,
            req.trigger,
            req.action_type,
            req.conditions.map(Into::into),
        )?;
        self.actions.create(&action)?;
        Ok(action)
    }

    pub fn update_action(&self, req: UpdateActionRequest) -> DomainResult<Action> {
        let mut action = self.actions.get_by_id(&req.action_id)?;
        if let Some(name) = &req.name {
            action.update_name(name)?;
        }
        if let Some(description) = &req.description {
            action.update_description(description);
        }
        if let Some(trigger) = req.trigger {
            action.update_trigger(trigger)?;
        }
        if let Some(action_type) = req.action_type {
            action.update_action_type(action_type)?;
        }
        if let Some(conditions) = req.conditions {
            let group: ConditionGroup = conditions.into();
            action.update_conditions((!group.is_empty()).then_some(group));
        }
        self.actions.update(&action)?;
        Ok(action)
    }

    pub fn delete_action(&self, id: &str) -> DomainResult<()> {
        self.actions.delete(id)
    }

    pub fn get_action(&self, id: &str) -> DomainResult<Action> {
        self.actions.get_by_id(id)
    }

    pub fn list_actions(&self, req: ListActionsRequest) -> DomainResult<Vec<Action>> {
        let mut actions = match req.scope.as_deref().filter(|s| !s.is_empty()) {
            Some(scope) => self.actions.list_by_scope(scope.parse()?, &req.scope_id)?,
            None => self.actions.list_all()?,
        };
        if req.enabled_only {
            actions.retain(|a| a.enabled);
        }
        if let Some(kind) = req.trigger_type.as_deref().filter(|s| !s.is_empty()) {
            let kind: TriggerType = kind.parse()?;
            actions.retain(|a| a.trigger_type() == kind);
        }
        actions.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(actions)
    }

    pub fn set_enabled(&self, id: &str, enabled: bool) -> DomainResult<Action> {
        let mut action = self.actions.get_by_id(id)?;
        if enabled {
            action.enable();
        } else {
            action.disable();
        }
        self.actions.update(&action)?;
        Ok(action)
    }
}
