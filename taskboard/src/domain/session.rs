// Terminal sessions reported by a SessionTracker

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{DomainError, DomainResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub name: String,
    pub working_dir: String,
    pub session_type: String,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Session {
    pub fn new(name: &str, working_dir: &str, session_type: &str) -> DomainResult<Self> {
        if name.trim().is_empty() {
            return Err(DomainError::EmptySessionName);
        }
        if working_dir.trim().is_empty() {
            return Err(DomainError::EmptyWorkingDir);
        }
        Ok(Self {
            name: name.to_string(),
            working_dir: working_dir.to_string(),
            session_type: session_type.to_string(),
            metadata: HashMap::new(),
        })
    }
}
