// Session tracking: terminal sessions mapped onto projects and boards

pub mod git_strategy;
pub mod manager;
pub mod strategy;
pub mod sync;

pub use git_strategy::{parse_branch_name, GitBranchStrategy};
pub use manager::SessionManager;
pub use strategy::{BoardSyncStrategy, GeneralStrategy};
pub use sync::{BoardPlan, SessionBoardPlanner, SessionSync};
