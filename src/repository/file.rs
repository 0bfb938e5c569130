// src/repository/file.rs
//! JSON file repositories.
//!
//! Layout under the data directory:
//!
//! ```text
//! projects/<project>.json
//! documents/<project>/<document>.json
//! insights/<project>.json
//! reviews/<project>.json
//! ```

use async_trait::async_trait;
use log::warn;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::traits::*;
use super::RepositoryManager;
use crate::error::{InsightError, InsightResult};
use crate::storage::{new_id, Document, InsightRecord, Project, ReviewTable};

/// Reject ids that could escape the data directory.
fn path_component(id: &str) -> InsightResult<&str> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if valid {
        Ok(id)
    } else {
        Err(InsightError::Validation(format!("invalid identifier: {:?}", id)))
    }
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> InsightResult<Option<T>> {
    if !fs::try_exists(path).await? {
        return Ok(None);
    }
    let content = fs::read_to_string(path).await?;
    Ok(Some(serde_json::from_str(&content)?))
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> InsightResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).await?;
    Ok(())
}

/// Every `*.json` file in `dir`. Unreadable entries are skipped with a warning.
async fn read_dir_json<T: DeserializeOwned>(dir: &Path) -> InsightResult<Vec<T>> {
    let mut items = Vec::new();
    if !fs::try_exists(dir).await? {
        return Ok(items);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<T>(&content) {
            Ok(item) => items.push(item),
            Err(e) => warn!("Skipping unreadable record {:?}: {}", path, e),
        }
    }
    Ok(items)
}

pub struct FileProjectRepository {
    dir: PathBuf,
}

impl FileProjectRepository {
    fn path(&self, id: &str) -> InsightResult<PathBuf> {
        Ok(self.dir.join(format!("{}.json", path_component(id)?)))
    }
}

#[async_trait]
impl ProjectRepository for FileProjectRepository {
    async fn insert(&self, project: Project) -> InsightResult<Project> {
        write_json(&self.path(&project.id)?, &project).await?;
        Ok(project)
    }

    async fn get(&self, id: &str) -> InsightResult<Option<Project>> {
        read_json(&self.path(id)?).await
    }

    async fn list(&self) -> InsightResult<Vec<Project>> {
        let mut projects: Vec<Project> = read_dir_json(&self.dir).await?;
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn update(&self, project: Project) -> InsightResult<Project> {
        let path = self.path(&project.id)?;
        if !fs::try_exists(&path).await? {
            return Err(InsightError::ProjectNotFound(project.id));
        }
        write_json(&path, &project).await?;
        Ok(project)
    }
}

pub struct FileDocumentRepository {
    dir: PathBuf,
}

impl FileDocumentRepository {
    fn project_dir(&self, project_id: &str) -> InsightResult<PathBuf> {
        Ok(self.dir.join(path_component(project_id)?))
    }

    fn path(&self, project_id: &str, id: &str) -> InsightResult<PathBuf> {
        Ok(self
            .project_dir(project_id)?
            .join(format!("{}.json", path_component(id)?)))
    }
}

#[async_trait]
impl DocumentRepository for FileDocumentRepository {
    async fn insert(&self, mut document: Document) -> InsightResult<Document> {
        document.id = new_id();
        write_json(&self.path(&document.project_id, &document.id)?, &document).await?;
        Ok(document)
    }

    async fn get(&self, project_id: &str, id: &str) -> InsightResult<Option<Document>> {
        read_json(&self.path(project_id, id)?).await
    }

    async fn list_by_project(&self, project_id: &str) -> InsightResult<Vec<Document>> {
        let mut documents: Vec<Document> = read_dir_json(&self.project_dir(project_id)?).await?;
        documents.sort_by(|a, b| a.uploaded_at.cmp(&b.uploaded_at));
        Ok(documents)
    }

    async fn delete(&self, project_id: &str, id: &str) -> InsightResult<()> {
        let path = self.path(project_id, id)?;
        if !fs::try_exists(&path).await? {
            return Err(InsightError::DocumentNotFound(id.to_string()));
        }
        fs::remove_file(path).await?;
        Ok(())
    }
}

pub struct FileInsightRepository {
    dir: PathBuf,
}

#[async_trait]
impl InsightRepository for FileInsightRepository {
    async fn get(&self, project_id: &str) -> InsightResult<Option<InsightRecord>> {
        let path = self.dir.join(format!("{}.json", path_component(project_id)?));
        read_json(&path).await
    }

    async fn set(&self, record: InsightRecord) -> InsightResult<()> {
        let path = self
            .dir
            .join(format!("{}.json", path_component(&record.project_id)?));
        write_json(&path, &record).await
    }
}

pub struct FileReviewRepository {
    dir: PathBuf,
}

#[async_trait]
impl ReviewRepository for FileReviewRepository {
    async fn get(&self, project_id: &str) -> InsightResult<ReviewTable> {
        let path = self.dir.join(format!("{}.json", path_component(project_id)?));
        Ok(read_json(&path).await?.unwrap_or_default())
    }

    async fn set(&self, project_id: &str, table: ReviewTable) -> InsightResult<()> {
        let path = self.dir.join(format!("{}.json", path_component(project_id)?));
        write_json(&path, &table).await
    }
}

pub struct FileRepositoryManager {
    projects: FileProjectRepository,
    documents: FileDocumentRepository,
    insights: FileInsightRepository,
    reviews: FileReviewRepository,
}

impl FileRepositoryManager {
    /// Create the directory layout under `root` if it does not exist.
    pub async fn open(root: impl AsRef<Path>) -> InsightResult<Self> {
        let root = root.as_ref();
        let manager = Self {
            projects: FileProjectRepository { dir: root.join("projects") },
            documents: FileDocumentRepository { dir: root.join("documents") },
            insights: FileInsightRepository { dir: root.join("insights") },
            reviews: FileReviewRepository { dir: root.join("reviews") },
        };
        for dir in [
            &manager.projects.dir,
            &manager.documents.dir,
            &manager.insights.dir,
            &manager.reviews.dir,
        ] {
            fs::create_dir_all(dir).await?;
        }
        Ok(manager)
    }
}

impl RepositoryManager for FileRepositoryManager {
    type ProjectRepo = FileProjectRepository;
    type DocumentRepo = FileDocumentRepository;
    type InsightRepo = FileInsightRepository;
    type ReviewRepo = FileReviewRepository;

    fn projects(&self) -> &Self::ProjectRepo {
        &self.projects
    }

    fn documents(&self) -> &Self::DocumentRepo {
        &self.documents
    }

    fn insights(&self) -> &Self::InsightRepo {
        &self.insights
    }

    fn reviews(&self) -> &Self::ReviewRepo {
        &self.reviews
    }
}
