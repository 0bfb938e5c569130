// src/repository/memory.rs
//! In-memory repositories, used by tests and by `--ephemeral` runs.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::traits::*;
use super::RepositoryManager;
use crate::error::{InsightError, InsightResult};
use crate::storage::{new_id, Document, InsightRecord, Project, ReviewTable};

#[derive(Default)]
pub struct MemoryProjectRepository {
    projects: RwLock<HashMap<String, Project>>,
}

#[async_trait]
impl ProjectRepository for MemoryProjectRepository {
    async fn insert(&self, project: Project) -> InsightResult<Project> {
        self.projects
            .write()
            .await
            .insert(project.id.clone(), project.clone());
        Ok(project)
    }

    async fn get(&self, id: &str) -> InsightResult<Option<Project>> {
        Ok(self.projects.read().await.get(id).cloned())
    }

    async fn list(&self) -> InsightResult<Vec<Project>> {
        let mut projects: Vec<Project> = self.projects.read().await.values().cloned().collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn update(&self, project: Project) -> InsightResult<Project> {
        let mut guard = self.projects.write().await;
        match guard.get_mut(&project.id) {
            Some(slot) => {
                *slot = project.clone();
                Ok(project)
            }
            None => Err(InsightError::ProjectNotFound(project.id)),
        }
    }
}

#[derive(Default)]
pub struct MemoryDocumentRepository {
    // project id -> documents in upload order
    documents: RwLock<HashMap<String, Vec<Document>>>,
}

#[async_trait]
impl DocumentRepository for MemoryDocumentRepository {
    async fn insert(&self, mut document: Document) -> InsightResult<Document> {
        document.id = new_id();
        self.documents
            .write()
            .await
            .entry(document.project_id.clone())
            .or_default()
            .push(document.clone());
        Ok(document)
    }

    async fn get(&self, project_id: &str, id: &str) -> InsightResult<Option<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .get(project_id)
            .and_then(|docs| docs.iter().find(|d| d.id == id).cloned()))
    }

    async fn list_by_project(&self, project_id: &str) -> InsightResult<Vec<Document>> {
        Ok(self
            .documents
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete(&self, project_id: &str, id: &str) -> InsightResult<()> {
        let mut guard = self.documents.write().await;
        let docs = guard
            .get_mut(project_id)
            .ok_or_else(|| InsightError::DocumentNotFound(id.to_string()))?;
        let before = docs.len();
        docs.retain(|d| d.id != id);
        if docs.len() == before {
            return Err(InsightError::DocumentNotFound(id.to_string()));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryInsightRepository {
    records: RwLock<HashMap<String, InsightRecord>>,
}

#[async_trait]
impl InsightRepository for MemoryInsightRepository {
    async fn get(&self, project_id: &str) -> InsightResult<Option<InsightRecord>> {
        Ok(self.records.read().await.get(project_id).cloned())
    }

    async fn set(&self, record: InsightRecord) -> InsightResult<()> {
        self.records
            .write()
            .await
            .insert(record.project_id.clone(), record);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryReviewRepository {
    tables: RwLock<HashMap<String, ReviewTable>>,
}

#[async_trait]
impl ReviewRepository for MemoryReviewRepository {
    async fn get(&self, project_id: &str) -> InsightResult<ReviewTable> {
        Ok(self
            .tables
            .read()
            .await
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set(&self, project_id: &str, table: ReviewTable) -> InsightResult<()> {
        self.tables.write().await.insert(project_id.to_string(), table);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryRepositoryManager {
    projects: MemoryProjectRepository,
    documents: MemoryDocumentRepository,
    insights: MemoryInsightRepository,
    reviews: MemoryReviewRepository,
}

impl MemoryRepositoryManager {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RepositoryManager for MemoryRepositoryManager {
    type ProjectRepo = MemoryProjectRepository;
    type DocumentRepo = MemoryDocumentRepository;
    type InsightRepo = MemoryInsightRepository;
    type ReviewRepo = MemoryReviewRepository;

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

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn document(project_id: &str, name: &str) -> Document {
        Document {
            id: "temp-1".into(),
            name: name.into(),
            size: 10,
            mime_type: "application/pdf".into(),
            project_id: project_id.into(),
            uploaded_by: "user-1".into(),
            uploaded_at: Utc::now(),
            priority: 0,
            storage_url: String::new(),
        }
    }

    #[tokio::test]
    async fn insert_replaces_temporary_id() {
        let repo = MemoryDocumentRepository::default();
        let stored = repo.insert(document("p1", "a.pdf")).await.unwrap();
        assert!(!stored.id.starts_with("temp-"));
        assert!(repo.get("p1", &stored.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn deleting_missing_document_reports_not_found() {
        let repo = MemoryDocumentRepository::default();
        let stored = repo.insert(document("p1", "a.pdf")).await.unwrap();
        repo.delete("p1", &stored.id).await.unwrap();
        let err = repo.delete("p1", &stored.id).await.unwrap_err();
        assert!(matches!(err, InsightError::DocumentNotFound(_)));
    }

    #[tokio::test]
    async fn review_tables_default_to_empty() {
        let repo = MemoryReviewRepository::default();
        assert!(repo.get("p1").await.unwrap().is_empty());
    }
}
