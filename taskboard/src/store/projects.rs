use anyhow::Result;
use std::path::Path;

use super::{JsonCollection, ProjectRepository};
use crate::domain::project::Project;
use crate::domain::{DomainError, DomainResult};

pub struct JsonProjectRepository {
    projects: JsonCollection<Project>,
}

impl JsonProjectRepository {
    pub fn open(data_dir: &Path) -> Result<Self> {
        Ok(Self {
            projects: JsonCollection::open(data_dir.join("projects.json"))?,
        })
    }

    pub fn in_memory() -> Self {
        Self {
            projects: JsonCollection::in_memory(),
        }
    }
}

impl ProjectRepository for JsonProjectRepository {
    fn save(&self, project: &Project) -> DomainResult<()> {
        self.projects.upsert(&project.id, project.clone())
    }

    fn find_by_id(&self, id: &str) -> DomainResult<Project> {
        self.projects
            .get(id)
            .ok_or_else(|| DomainError::ProjectNotFound(id.to_string()))
    }

    fn find_by_slug(&self, slug: &str) -> DomainResult<Project> {
        self.projects
            .filter(|p| p.slug == slug)
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::ProjectNotFound(slug.to_string()))
    }

    fn find_by_working_dir(&self, dir: &str) -> DomainResult<Option<Project>> {
        if dir.is_empty() {
            return Ok(None);
        }
        Ok(self.projects.filter(|p| p.working_dir == dir).into_iter().next())
    }

    fn list(&self) -> DomainResult<Vec<Project>> {
        Ok(self.projects.values())
    }

    fn delete(&self, id: &str) -> DomainResult<()> {
        self.projects
            .remove(id)?
            .map(|_| ())
            .ok_or_else(|| DomainError::ProjectNotFound(id.to_string()))
    }
}
