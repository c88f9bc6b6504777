// Automation: event dispatch and the action evaluate/execute pipeline

pub mod event_bus;
pub mod manager;
pub mod pipeline;
pub mod task_mutator;

pub use event_bus::InProcessEventBus;
pub use manager::ActionManager;
pub use pipeline::{ActionPipeline, EvaluationContext};
pub use task_mutator::BoardTaskMutator;
