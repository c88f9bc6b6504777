// Projects group boards and time logs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::{DomainError, DomainResult};
use super::values::slugify;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub working_dir: String,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Project {
    /// The id is the slug of the name.
    pub fn new(name: &str, description: &str, working_dir: &str) -> DomainResult<Self> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyProjectName);
        }
        let slug = slugify(name);
        let now = Utc::now();
        Ok(Self {
            id: slug.clone(),
            name: name.to_string(),
            slug,
            description: description.to_string(),
            color: String::new(),
            archived: false,
            working_dir: working_dir.to_string(),
            created_at: now,
            modified_at: now,
            metadata: HashMap::new(),
        })
    }

    pub fn rename(&mut self, name: &str) -> DomainResult<()> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::EmptyProjectName);
        }
        self.name = name.to_string();
        self.touch();
        Ok(())
    }

    pub fn set_description(&mut self, description: &str) {
        self.description = description.to_string();
        self.touch();
    }

    pub fn set_working_dir(&mut self, dir: &str) {
        self.working_dir = dir.to_string();
        self.touch();
    }

    pub fn set_color(&mut self, color: &str) {
        self.color = color.to_string();
        self.touch();
    }

    pub fn set_archived(&mut self, archived: bool) {
        self.archived = archived;
        self.touch();
    }

    fn touch(&mut self) {
        self.modified_at = Utc::now();
    }
}
