// Board sync strategies: how a session's board is reconciled with its source

use std::path::PathBuf;
use std::sync::Arc;

use crate::domain::board::Board;
use crate::domain::session::Session;
use crate::domain::DomainResult;

pub trait BoardSyncStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn can_handle(&self, session: &Session) -> bool;
    /// Reconcile `board` in place. The caller saves it.
    fn sync(&self, session: &Session, board: &mut Board) -> DomainResult<()>;
    fn should_watch(&self) -> bool;
    /// Path whose changes should trigger a re-sync, when known.
    fn watch_path(&self, session: &Session) -> Option<PathBuf>;
}

/// First strategy that accepts the session. Order matters: specific
/// strategies go before the catch-all.
pub fn select_strategy<'a>(
    strategies: &'a [Arc<dyn BoardSyncStrategy>],
    session: &Session,
) -> Option<&'a Arc<dyn BoardSyncStrategy>> {
    strategies.iter().find(|s| s.can_handle(session))
}

/// Catch-all: the board exists but nothing feeds it.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeneralStrategy;

impl BoardSyncStrategy for GeneralStrategy {
    fn name(&self) -> &'static str {
        "general"
    }

    fn can_handle(&self, _session: &Session) -> bool {
        true
    }

    fn sync(&self, _session: &Session, _board: &mut Board) -> DomainResult<()> {
        Ok(())
    }

    fn should_watch(&self) -> bool {
        false
    }

    fn watch_path(&self, _session: &Session) -> Option<PathBuf> {
        None
    }
}
