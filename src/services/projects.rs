// src/services/projects.rs
//! Project management.

use chrono::Utc;
use log::info;
use reqwest::Url;
use std::sync::Arc;

use crate::error::{InsightError, InsightResult};
use crate::repository::{ProjectRepository, RepositoryManager};
use crate::storage::{new_id, NewProject, Project, ProjectStatus};

fn non_empty(value: &str, field: &str) -> InsightResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(InsightError::Validation(format!("{} is required", field)));
    }
    Ok(trimmed.to_string())
}

fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Check that a client website is an absolute http(s) URL.
pub fn validate_website(website: &str) -> InsightResult<String> {
    let url = Url::parse(website)
        .map_err(|e| InsightError::Validation(format!("invalid website URL {}: {}", website, e)))?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Ok(url.to_string()),
        _ => Err(InsightError::Validation(format!(
            "website must be an http(s) URL: {}",
            website
        ))),
    }
}

pub struct ProjectService<R: RepositoryManager> {
    repos: Arc<R>,
}

impl<R: RepositoryManager> ProjectService<R> {
    pub fn new(repos: Arc<R>) -> Self {
        Self { repos }
    }

    pub async fn create(&self, new_project: NewProject) -> InsightResult<Project> {
        let title = non_empty(&new_project.title, "title")?;
        let client_name = non_empty(&new_project.client_name, "client name")?;
        let client_website = optional(new_project.client_website)
            .map(|w| validate_website(&w))
            .transpose()?;

        let now = Utc::now();
        let project = Project {
            id: new_id(),
            title,
            client_name,
            client_industry: optional(new_project.client_industry),
            client_website,
            status: ProjectStatus::Draft,
            created_at: now,
            updated_at: now,
        };

        let project = self.repos.projects().insert(project).await?;
        info!("Created project {} ({})", project.title, project.id);
        Ok(project)
    }

    pub async fn get(&self, id: &str) -> InsightResult<Project> {
        self.repos
            .projects()
            .get(id)
            .await?
            .ok_or_else(|| InsightError::ProjectNotFound(id.to_string()))
    }

    pub async fn list(&self) -> InsightResult<Vec<Project>> {
        self.repos.projects().list().await
    }

    pub async fn update_status(&self, id: &str, status: ProjectStatus) -> InsightResult<Project> {
        let mut project = self.get(id).await?;
        if project.status == status {
            return Ok(project);
        }
        project.status = status;
        project.updated_at = Utc::now();
        self.repos.projects().update(project).await
    }
}
