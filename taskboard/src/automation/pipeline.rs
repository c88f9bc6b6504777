// Evaluate -> execute pipeline shared by the time and event paths

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::action::Action;
use crate::domain::action_type::{ActionContext, Notifier, ScriptRunner, TaskMutator};
use crate::domain::board::{Board, Column, Task};
use crate::domain::event::DomainEvent;
use crate::domain::task_id::TaskId;
use crate::domain::trigger::TriggerContext;
use crate::domain::values::TriggerType;
use crate::domain::DomainResult;
use crate::store::{ActionRepository, BoardRepository};

/// What an evaluation run is about.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub current_time: DateTime<Utc>,
    pub board_id: String,
    pub column_id: String,
    pub task_id: Option<TaskId>,
    pub event: Option<Arc<DomainEvent>>,
}

impl EvaluationContext {
    /// No board, column, task or event.
    pub fn global(current_time: DateTime<Utc>) -> Self {
        Self {
            current_time,
            board_id: String::new(),
            column_id: String::new(),
            task_id: None,
            event: None,
        }
    }

    pub fn from_event(event: Arc<DomainEvent>) -> Self {
        Self {
            current_time: Utc::now(),
            board_id: event.board_id.clone(),
            column_id: event.column_id.clone(),
            task_id: event.task_id.clone(),
            event: Some(event),
        }
    }
}

/// An action that decided to fire, with the snapshot it decided on.
#[derive(Debug, Clone)]
pub struct FiredAction {
    pub action: Action,
    pub context: TriggerContext,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub fired: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct ActionPipeline {
    actions: Arc<dyn ActionRepository>,
    boards: Arc<dyn BoardRepository>,
    notifier: Option<Arc<dyn Notifier>>,
    script_runner: Option<Arc<dyn ScriptRunner>>,
    task_mutator: Option<Arc<dyn TaskMutator>>,
}

impl ActionPipeline {
    pub fn new(actions: Arc<dyn ActionRepository>, boards: Arc<dyn BoardRepository>) -> Self {
        Self {
            actions,
            boards,
            notifier: None,
            script_runner: None,
            task_mutator: None,
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_script_runner(mut self, runner: Arc<dyn ScriptRunner>) -> Self {
        self.script_runner = Some(runner);
        self
    }

    pub fn with_task_mutator(mut self, mutator: Arc<dyn TaskMutator>) -> Self {
        self.task_mutator = Some(mutator);
        self
    }

    /// Enabled actions in scope whose trigger and conditions pass.
    pub fn evaluate(&self, ctx: &EvaluationContext) -> DomainResult<Vec<FiredAction>> {
        let candidates = self.actions.list_enabled()?;
        let (board, column, task) = self.resolve(ctx);

        let task_key = ctx.task_id.as_ref().map(ToString::to_string).unwrap_or_default();
        let column_key = column
            .as_ref()
            .map(|c| c.name.clone())
            .unwrap_or_else(|| ctx.column_id.clone());

        let fired = candidates
            .into_iter()
            .filter(|action| action.matches_scope(&ctx.board_id, &column_key, &task_key))
            .filter_map(|action| {
                let trigger_ctx = TriggerContext {
                    current_time: ctx.current_time,
                    task: task.clone(),
                    column: column.clone(),
                    board: board.clone(),
                    event: ctx.event.clone(),
                    last_run: action.last_run,
                };
                action.should_execute(&trigger_ctx).then_some(FiredAction {
                    action,
                    context: trigger_ctx,
                })
            })
            .collect();
        Ok(fired)
    }

    /// Time-triggered actions checked against the clock alone. A tick has no
    /// board, column or task, so only global actions match its scope.
    pub fn evaluate_time_based(&self, now: DateTime<Utc>) -> DomainResult<Vec<FiredAction>> {
        let fired = self
            .actions
            .list_by_trigger_type(TriggerType::Time)?
            .into_iter()
            .filter(|action| action.enabled && action.matches_scope("", "", ""))
            .filter_map(|action| {
                let mut trigger_ctx = TriggerContext::at(now);
                trigger_ctx.last_run = action.last_run;
                action.should_execute(&trigger_ctx).then_some(FiredAction {
                    action,
                    context: trigger_ctx,
                })
            })
            .collect();
        Ok(fired)
    }

    /// Run one fired action and persist its new `last_run`. A failure to
    /// persist is logged, not returned.
    pub fn execute(&self, fired: FiredAction) -> DomainResult<()> {
        let FiredAction { mut action, context } = fired;
        let action_ctx = ActionContext {
            current_time: context.current_time,
            task: context.task.as_deref().cloned(),
            column: context.column,
            board: context.board,
            event: context.event,
            notifier: self.notifier.clone(),
            script_runner: self.script_runner.clone(),
            task_mutator: self.task_mutator.clone(),
        };

        action.execute(&action_ctx)?;
        if let Some(last_run) = action.last_run {
            if let Err(err) = self.actions.update_last_run(&action.id, last_run) {
                warn!(action = %action.id, error = %err, "Failed to record action run");
            }
        }
        info!(action = %action.id, name = %action.name, kind = action.action_type.name(), "Action executed");
        Ok(())
    }

    /// Execute every fired action; one failure does not stop the rest.
    pub fn execute_all(&self, fired: Vec<FiredAction>) -> RunSummary {
        let mut summary = RunSummary {
            fired: fired.len(),
            ..Default::default()
        };
        for item in fired {
            let id = item.action.id.clone();
            match self.execute(item) {
                Ok(()) => summary.succeeded += 1,
                Err(err) => {
                    summary.failed += 1;
                    warn!(action = %id, error = %err, "Action failed");
                }
            }
        }
        summary
    }

    pub fn process_event(&self, event: Arc<DomainEvent>) -> DomainResult<RunSummary> {
        let ctx = EvaluationContext::from_event(event);
        let fired = self.evaluate(&ctx)?;
        Ok(self.execute_all(fired))
    }

    pub fn run_time_based(&self, now: DateTime<Utc>) -> DomainResult<RunSummary> {
        let fired = self.evaluate_time_based(now)?;
        Ok(self.execute_all(fired))
    }

    /// Best effort: a failed lookup leaves that part of the context empty.
    #[allow(clippy::type_complexity)]
    fn resolve(
        &self,
        ctx: &EvaluationContext,
    ) -> (Option<Arc<Board>>, Option<Arc<Column>>, Option<Arc<Task>>) {
        if ctx.board_id.is_empty() {
            return (None, None, None);
        }
        let board = match self.boards.find_by_id(&ctx.board_id) {
            Ok(board) => board,
            Err(err) => {
                debug!(board = %ctx.board_id, error = %err, "Evaluating without board context");
                return (None, None, None);
            }
        };

        let mut column = (!ctx.column_id.is_empty())
            .then(|| board.column(&ctx.column_id).cloned())
            .flatten();
        let mut task = None;
        if let Some(id) = &ctx.task_id {
            if let Some((found, holder)) = board.find_task(id) {
                task = Some(Arc::new(found.clone()));
                if column.is_none() {
                    column = Some(holder.clone());
                }
            }
        }
        (Some(Arc::new(board)), column.map(Arc::new), task)
    }
}
