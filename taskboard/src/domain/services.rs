// Contracts for external systems consumed by the session and time managers

use std::path::Path;

use super::error::DomainResult;
use super::session::Session;

/// Lists terminal sessions (tmux in production).
pub trait SessionTracker: Send + Sync {
    fn is_available(&self) -> bool;
    fn list_sessions(&self) -> DomainResult<Vec<Session>>;
    /// The attached session, if any.
    fn get_active_session(&self) -> DomainResult<Option<Session>>;
}

/// Version control queries and branch operations.
pub trait VcsProvider: Send + Sync {
    fn is_repository(&self, path: &Path) -> bool;
    fn get_repository_root(&self, path: &Path) -> DomainResult<String>;
    fn get_current_branch(&self, path: &Path) -> DomainResult<String>;
    fn list_branches(&self, path: &Path) -> DomainResult<Vec<String>>;
    /// Directory whose changes signal branch changes; empty when unknown.
    fn get_refs_path(&self, path: &Path) -> DomainResult<String>;
    fn branch_exists(&self, path: &Path, branch: &str) -> bool;
    fn checkout_branch(&self, path: &Path, branch: &str) -> DomainResult<()>;
    fn create_and_checkout_branch(&self, path: &Path, branch: &str) -> DomainResult<()>;
}

pub type ChangeCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Filesystem change notifications keyed by path.
pub trait ChangeWatcher: Send + Sync {
    fn watch(&self, path: &Path, on_change: ChangeCallback) -> DomainResult<()>;
    fn unwatch(&self, path: &Path) -> DomainResult<()>;
    fn close(&self) -> DomainResult<()>;
}
