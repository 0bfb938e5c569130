// src/services/documents.rs
//! Document intake and listing.
//!
//! Uploads are validated as a batch, stored as blobs, then recorded. Outside
//! production a storage or database failure does not fail the upload: the
//! document is reported back with its temporary id and is not persisted.

use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

use super::traits::FileStorageService;
use super::upload::{document_priority, file_extension, mime_for_extension, CandidateFile, RejectedFile, UploadPolicy};
use crate::error::{InsightError, InsightResult};
use crate::repository::{DocumentRepository, ProjectRepository, RepositoryManager};
use crate::storage::Document;

/// One file received from a client.
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReport {
    pub uploaded: Vec<Document>,
    pub rejected: Vec<RejectedFile>,
    /// Documents that only exist locally because storage was unavailable.
    pub local_only: Vec<String>,
}

/// Highest priority first, then oldest upload first.
pub fn sort_by_priority(documents: &mut [Document]) {
    documents.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| a.uploaded_at.cmp(&b.uploaded_at))
    });
}

pub struct DocumentService<R: RepositoryManager> {
    repos: Arc<R>,
    file_storage: Arc<dyn FileStorageService>,
    policy: UploadPolicy,
    production: bool,
}

impl<R: RepositoryManager> DocumentService<R> {
    pub fn new(
        repos: Arc<R>,
        file_storage: Arc<dyn FileStorageService>,
        policy: UploadPolicy,
        production: bool,
    ) -> Self {
        Self {
            repos,
            file_storage,
            policy,
            production,
        }
    }

    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Return `Ok(None)` for a degradable failure outside production.
    fn degrade(&self, error: InsightError, file_name: &str) -> InsightResult<Option<String>> {
        if self.production {
            return Err(error);
        }
        warn!("Keeping {} locally only: {}", file_name, error);
        Ok(None)
    }

    pub async fn upload(
        &self,
        project_id: &str,
        uploaded_by: &str,
        files: Vec<UploadFile>,
    ) -> InsightResult<UploadReport> {
        if uploaded_by.trim().is_empty() {
            return Err(InsightError::Authentication("sign in to upload documents".to_string()));
        }
        if self.repos.projects().get(project_id).await?.is_none() {
            return Err(InsightError::ProjectNotFound(project_id.to_string()));
        }

        let current = self.repos.documents().list_by_project(project_id).await?.len();
        let candidates = files
            .iter()
            .map(|f| CandidateFile {
                name: f.name.clone(),
                size: f.data.len() as u64,
                mime_type: f.mime_type.clone(),
            })
            .collect();
        let batch = self.policy.validate_batch(candidates, current)?;

        let mut report = UploadReport {
            uploaded: Vec::new(),
            rejected: batch.rejected,
            local_only: Vec::new(),
        };

        let mut remaining = files.into_iter();
        for accepted in batch.accepted {
            // Accepted files keep their input order.
            let Some(file) = remaining.by_ref().find(|f| f.name == accepted.file.name) else {
                continue;
            };

            let mime_type = file.mime_type.clone().unwrap_or_else(|| {
                file_extension(&file.name)
                    .map(|ext| mime_for_extension(&ext).to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string())
            });
            let mut document = Document {
                id: accepted.temp_id.clone(),
                name: file.name.clone(),
                size: file.data.len() as u64,
                mime_type,
                project_id: project_id.to_string(),
                uploaded_by: uploaded_by.to_string(),
                uploaded_at: Utc::now(),
                priority: document_priority(&file.name),
                storage_url: String::new(),
            };

            let stored = match self
                .file_storage
                .store_file(project_id, &file.name, &file.data)
                .await
            {
                Ok(url) => Some(url),
                Err(e) => self.degrade(e, &file.name)?,
            };
            let Some(url) = stored else {
                report.local_only.push(document.id.clone());
                report.uploaded.push(document);
                continue;
            };
            document.storage_url = url;

            match self.repos.documents().insert(document.clone()).await {
                Ok(saved) => report.uploaded.push(saved),
                Err(e) if self.production => {
                    if let Err(cleanup) = self.file_storage.delete_file(&document.storage_url).await {
                        warn!("Orphaned blob for {}: {}", file.name, cleanup);
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!("Keeping {} locally only: {}", file.name, e);
                    report.local_only.push(document.id.clone());
                    report.uploaded.push(document);
                }
            }
        }

        info!(
            "Uploaded {} documents to project {} ({} rejected, {} local only)",
            report.uploaded.len(),
            project_id,
            report.rejected.len(),
            report.local_only.len()
        );
        Ok(report)
    }

    /// Documents of a project, highest priority first.
    pub async fn list(&self, project_id: &str) -> InsightResult<Vec<Document>> {
        let mut documents = self.repos.documents().list_by_project(project_id).await?;
        sort_by_priority(&mut documents);
        Ok(documents)
    }

    /// Delete the blob and the record. A document that is already gone
    /// counts as removed.
    pub async fn remove(&self, project_id: &str, document_id: &str) -> InsightResult<()> {
        let Some(document) = self.repos.documents().get(project_id, document_id).await? else {
            info!("Document {} already removed", document_id);
            return Ok(());
        };

        if !document.storage_url.is_empty() {
            if let Err(e) = self.file_storage.delete_file(&document.storage_url).await {
                warn!("Failed to delete stored file for {}: {}", document.name, e);
            }
        }

        match self.repos.documents().delete(project_id, document_id).await {
            Ok(()) | Err(InsightError::DocumentNotFound(_)) => {
                info!("Removed document {} from project {}", document.name, project_id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}
