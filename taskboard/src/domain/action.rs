// Automation rules: a scoped trigger paired with one effect

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action_type::{ActionContext, ActionType};
use super::condition::ConditionGroup;
use super::error::{DomainError, DomainResult};
use super::trigger::{Trigger, TriggerContext};
use super::values::{ActionScope, TriggerType};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub scope: ActionScope,
    /// Board id, column name or task id depending on `scope`; empty for global.
    #[serde(default)]
    pub scope_id: String,
    pub enabled: bool,
    pub trigger: Trigger,
    pub action_type: ActionType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionGroup>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run: Option<DateTime<Utc>>,
}

impl Action {
    /// New actions start enabled.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: &str,
        name: &str,
        description: &str,
        scope: ActionScope,
        scope_id: &str,
        trigger: Trigger,
        action_type: ActionType,
        conditions: Option<ConditionGroup>,
    ) -> DomainResult<Self> {
        if id.trim().is_empty() {
            return Err(DomainError::InvalidActionId);
        }
        if name.trim().is_empty() {
            return Err(DomainError::InvalidActionName);
        }
        trigger.validate()?;
        action_type.validate()?;

        let now = Utc::now();
        Ok(Self {
            id: id.to_string(),
            name: name.trim().to_string(),
            description: description.to_string(),
            scope,
            scope_id: scope_id.to_string(),
            enabled: true,
            trigger,
            action_type,
            conditions,
            created_at: now,
            modified_at: now,
            last_run: None,
        })
    }

    pub fn trigger_type(&self) -> TriggerType {
        self.trigger.trigger_type()
    }

    pub fn update_name(&mut self, name: &str) -> DomainResult<()> {
        if name.trim().is_empty() {
            return Err(DomainError::InvalidActionName);
        }
        self.name = name.trim().to_string();
        self.touch();
        Ok(())
    }

    pub fn update_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.touch();
    }

    pub fn enable(&mut self) {
        self.enabled = true;
        self.touch();
    }

    pub fn disable(&mut self) {
        self.enabled = false;
        self.touch();
    }

    pub fn update_trigger(&mut self, trigger: Trigger) -> DomainResult<()> {
        trigger.validate()?;
        self.trigger = trigger;
        self.touch();
        Ok(())
    }

    pub fn update_action_type(&mut self, action_type: ActionType) -> DomainResult<()> {
        action_type.validate()?;
        self.action_type = action_type;
        self.touch();
        Ok(())
    }

    pub fn update_conditions(&mut self, conditions: Option<ConditionGroup>) {
        self.conditions = conditions;
        self.touch();
    }

    pub fn mark_as_run(&mut self, at: DateTime<Utc>) {
        self.last_run = Some(at);
    }

    /// Copy under a new id, name suffixed, never run.
    pub fn clone_as(&self, new_id: &str) -> DomainResult<Self> {
        let mut copy = Action::new(
            new_id,
            &format!("{} (copy)", self.name),
            &self.description,
            self.scope,
            &self.scope_id,
            self.trigger.clone(),
            self.action_type.clone(),
            self.conditions.clone(),
        )?;
        copy.enabled = self.enabled;
        Ok(copy)
    }

    pub fn matches_scope(&self, board_id: &str, column_id: &str, task_id: &str) -> bool {
        match self.scope {
            ActionScope::Global => true,
            ActionScope::Board => self.scope_id == board_id,
            ActionScope::Column => self.scope_id == column_id,
            ActionScope::Task => self.scope_id == task_id,
        }
    }

    /// Conditions only filter when there is a task to evaluate them against.
    pub fn should_execute(&self, ctx: &TriggerContext) -> bool {
        if !self.enabled || !self.trigger.should_trigger(ctx) {
            return false;
        }
        match (&self.conditions, &ctx.task) {
            (Some(group), Some(task)) => group.evaluate(task, ctx.column.as_deref()),
            _ => true,
        }
    }

    /// Runs the effect; `last_run` is stamped only on success and the caller
    /// persists it.
    pub fn execute(&mut self, ctx: &ActionContext) -> DomainResult<()> {
        if !self.enabled {
            return Err(DomainError::ActionDisabled);
        }
        self.action_type.execute(ctx)?;
        self.mark_as_run(ctx.current_time);
        Ok(())
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}
