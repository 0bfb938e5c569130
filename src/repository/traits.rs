// src/repository/traits.rs
//! Repository trait definitions for data access layer abstraction
//!
//! These traits are the persistence port of the application. Services only
//! talk to storage through them, so the merge and review logic can run against
//! the in-memory implementation in tests and the JSON file implementation in
//! the binary.

use async_trait::async_trait;
use chrono::Utc;

use crate::error::InsightResult;
use crate::services::insights::merge_insights;
use crate::storage::{Document, InsightRecord, Project, ReviewTable, StrategicInsight};

#[async_trait]
pub trait ProjectRepository: Send + Sync {
    async fn insert(&self, project: Project) -> InsightResult<Project>;

    async fn get(&self, id: &str) -> InsightResult<Option<Project>>;

    /// All projects, newest first
    async fn list(&self) -> InsightResult<Vec<Project>>;

    /// Replace a stored project. Fails with `ProjectNotFound` if absent.
    async fn update(&self, project: Project) -> InsightResult<Project>;
}

#[async_trait]
pub trait DocumentRepository: Send + Sync {
    /// Persist a document. Any temporary id is replaced by a server id.
    async fn insert(&self, document: Document) -> InsightResult<Document>;

    async fn get(&self, project_id: &str, id: &str) -> InsightResult<Option<Document>>;

    async fn list_by_project(&self, project_id: &str) -> InsightResult<Vec<Document>>;

    /// Fails with `DocumentNotFound` when nothing was stored under `id`.
    async fn delete(&self, project_id: &str, id: &str) -> InsightResult<()>;
}

#[async_trait]
pub trait InsightRepository: Send + Sync {
    async fn get(&self, project_id: &str) -> InsightResult<Option<InsightRecord>>;

    async fn set(&self, record: InsightRecord) -> InsightResult<()>;

    /// Read-modify-write merge of `incoming` into the stored collection.
    ///
    /// Not atomic across writers: two concurrent merges for the same project
    /// can lose one of the updates.
    async fn merge(
        &self,
        project_id: &str,
        incoming: Vec<StrategicInsight>,
        using_fallback: bool,
    ) -> InsightResult<InsightRecord> {
        let existing = self
            .get(project_id)
            .await?
            .map(|record| record.insights)
            .unwrap_or_default();

        let now = Utc::now();
        let record = InsightRecord {
            project_id: project_id.to_string(),
            insights: merge_insights(existing, incoming),
            generation_timestamp: now,
            using_fallback_data: using_fallback,
            timestamp: now,
        };
        self.set(record.clone()).await?;
        Ok(record)
    }
}

#[async_trait]
pub trait ReviewRepository: Send + Sync {
    /// Stored decisions for a project; empty when none were recorded.
    async fn get(&self, project_id: &str) -> InsightResult<ReviewTable>;

    async fn set(&self, project_id: &str, table: ReviewTable) -> InsightResult<()>;
}
