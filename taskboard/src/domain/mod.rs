// Domain model: boards, tasks, automation rules, sessions and time logs

pub mod action;
pub mod action_type;
pub mod board;
pub mod condition;
pub mod error;
pub mod event;
pub mod project;
pub mod services;
pub mod session;
pub mod task_id;
pub mod time_log;
pub mod trigger;
pub mod values;

pub use error::{DomainError, DomainResult};
