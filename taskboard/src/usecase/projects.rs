// Project CRUD

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::project::Project;
use crate::domain::values::slugify;
use crate::domain::{DomainError, DomainResult};
use crate::store::{BoardRepository, ProjectRepository};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub working_dir: String,
    #[serde(default)]
    pub color: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProjectRequest {
    pub project_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub working_dir: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectDetails {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub working_dir: String,
    pub color: String,
    pub archived: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

impl From<Project> for ProjectDetails {
    fn from(p: Project) -> Self {
        Self {
            id: p.id,
            name: p.name,
            slug: p.slug,
            description: p.description,
            working_dir: p.working_dir,
            color: p.color,
            archived: p.archived,
            created_at: p.created_at,
            modified_at: p.modified_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectSummary {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub archived: bool,
    pub board_count: usize,
    pub task_count: usize,
}

#[derive(Clone)]
pub struct ProjectService {
    projects: Arc<dyn ProjectRepository>,
    boards: Arc<dyn BoardRepository>,
}

impl ProjectService {
    pub fn new(projects: Arc<dyn ProjectRepository>, boards: Arc<dyn BoardRepository>) -> Self {
        Self { projects, boards }
    }

    pub fn create_project(&self, req: CreateProjectRequest) -> DomainResult<ProjectDetails> {
        let mut project = Project::new(&req.name, &req.description, &req.working_dir)?;
        if self.projects.find_by_id(&project.id).is_ok() {
            return Err(DomainError::ProjectAlreadyExists(project.id));
        }
        if !req.color.is_empty() {
            project.set_color(&req.color);
        }
        self.projects.save(&project)?;
        Ok(project.into())
    }

    /// Look up by id, then by slug.
    pub fn find(&self, id_or_slug: &str) -> DomainResult<Project> {
        match self.projects.find_by_id(id_or_slug) {
            Ok(project) => Ok(project),
            Err(_) => self.projects.find_by_slug(id_or_slug),
        }
    }

    pub fn get_project(&self, id_or_slug: &str) -> DomainResult<ProjectDetails> {
        self.find(id_or_slug).map(Into::into)
    }

    pub fn list_projects(&self) -> DomainResult<Vec<ProjectSummary>> {
        let mut summaries = Vec::new();
        for project in self.projects.list()? {
            let boards = self.boards.list_by_project(&project.id)?;
            summaries.push(ProjectSummary {
                board_count: boards.len(),
                task_count: boards.iter().map(|b| b.task_count()).sum(),
                id: project.id,
                name: project.name,
                slug: project.slug,
                description: project.description,
                archived: project.archived,
            });
        }
        summaries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(summaries)
    }

    pub fn update_project(&self, req: UpdateProjectRequest) -> DomainResult<ProjectDetails> {
        let mut project = self.find(&req.project_id)?;
        if let Some(name) = &req.name {
            project.rename(name)?;
        }
        if let Some(description) = &req.description {
            project.set_description(description);
        }
        if let Some(dir) = &req.working_dir {
            project.set_working_dir(dir);
        }
        if let Some(color) = &req.color {
            project.set_color(color);
        }
        if let Some(archived) = req.archived {
            project.set_archived(archived);
        }
        self.projects.save(&project)?;
        Ok(project.into())
    }

    pub fn delete_project(&self, id_or_slug: &str) -> DomainResult<()> {
        let project = self.find(id_or_slug)?;
        self.projects.delete(&project.id)
    }

    /// Fetch the project named `name`, creating it if needed, and point it at
    /// `working_dir`.
    pub fn get_or_create(&self, name: &str, working_dir: &str, description: &str) -> DomainResult<Project> {
        let id = slugify(name);
        let project = match self.projects.find_by_id(&id) {
            Ok(mut existing) => {
                if existing.working_dir == working_dir {
                    return Ok(existing);
                }
                existing.set_working_dir(working_dir);
                existing
            }
            Err(DomainError::ProjectNotFound(_)) => Project::new(name, description, working_dir)?,
            Err(err) => return Err(err),
        };
        self.projects.save(&project)?;
        Ok(project)
    }
}
