// SessionTracker backed by tmux

use std::process::Command;

use crate::domain::services::SessionTracker;
use crate::domain::session::Session;
use crate::domain::{DomainError, DomainResult};

const SESSION_TYPE: &str = "tmux";

#[derive(Debug, Default, Clone, Copy)]
pub struct TmuxTracker;

impl TmuxTracker {
    pub fn new() -> Self {
        Self
    }
}

fn list_sessions(format: &str) -> DomainResult<String> {
    let output = Command::new("tmux")
        .args(["list-sessions", "-F", format])
        .output()
        .map_err(|e| DomainError::external(format!("failed to run tmux: {e}")))?;
    if !output.status.success() {
        return Err(DomainError::external(format!(
            "tmux list-sessions failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Lines of `name:path`. Paths may contain colons; names may not.
fn parse_sessions(out: &str) -> Vec<Session> {
    out.lines()
        .filter_map(|line| line.split_once(':'))
        .filter_map(|(name, dir)| Session::new(name, dir, SESSION_TYPE).ok())
        .collect()
}

/// Lines of `name:attached:path`; the first attached session wins.
fn parse_active(out: &str) -> Option<Session> {
    out.lines().find_map(|line| {
        let mut parts = line.splitn(3, ':');
        let (name, attached, dir) = (parts.next()?, parts.next()?, parts.next()?);
        let attached = attached.parse::<u32>().unwrap_or(0) > 0;
        attached
            .then(|| Session::new(name, dir, SESSION_TYPE).ok())
            .flatten()
    })
}

impl SessionTracker for TmuxTracker {
    fn is_available(&self) -> bool {
        Command::new("tmux")
            .arg("list-sessions")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }

    fn list_sessions(&self) -> DomainResult<Vec<Session>> {
        Ok(parse_sessions(&list_sessions("#{session_name}:#{pane_current_path}")?))
    }

    fn get_active_session(&self) -> DomainResult<Option<Session>> {
        Ok(parse_active(&list_sessions(
            "#{session_name}:#{session_attached}:#{pane_current_path}",
        )?))
    }
}
