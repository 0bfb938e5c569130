// src/services/traits.rs
//! Service layer trait definitions
//!
//! Seams to external collaborators: the hosted analysis functions and blob
//! storage for uploaded files.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InsightResult;

/// Body of a document analysis invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentAnalysisRequest {
    pub project_id: String,
    pub document_ids: Vec<String>,
    pub industry: String,
    pub client_name: String,
    pub processing_mode: String,
}

/// Body of a website analysis invocation. With `check_progress` set the
/// function reports the status of the running analysis instead of starting
/// a new one.
#[derive(Debug, Clone, Serialize)]
pub struct WebsiteAnalysisRequest {
    #[serde(rename = "projectId")]
    pub project_id: String,
    #[serde(rename = "websiteUrl")]
    pub website_url: String,
    #[serde(rename = "clientName")]
    pub client_name: String,
    #[serde(rename = "clientIndustry")]
    pub client_industry: String,
    #[serde(rename = "maxPages")]
    pub max_pages: u32,
    #[serde(rename = "timeoutSeconds")]
    pub timeout_seconds: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub check_progress: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub test_mode: bool,
    #[serde(rename = "debugMode", skip_serializing_if = "std::ops::Not::not")]
    pub debug_mode: bool,
}

impl WebsiteAnalysisRequest {
    pub fn as_progress_check(&self) -> Self {
        Self {
            check_progress: true,
            ..self.clone()
        }
    }
}

/// Remote status of a website analysis. `progress` is `None` when the
/// function did not report one.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressReport {
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub status: Option<String>,
}

impl ProgressReport {
    pub fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.round().clamp(0.0, 100.0) as u8)
    }
}

/// Hosted analysis functions
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    /// Invoke document analysis and return the raw response body
    async fn analyze_documents(&self, request: &DocumentAnalysisRequest) -> InsightResult<Value>;

    /// Invoke website analysis and return the raw response body
    async fn analyze_website(&self, request: &WebsiteAnalysisRequest) -> InsightResult<Value>;

    /// Poll the status of a running website analysis
    async fn website_progress(&self, request: &WebsiteAnalysisRequest) -> InsightResult<ProgressReport>;

    /// Check if the function platform is reachable
    async fn is_available(&self) -> bool;
}

/// Blob storage for uploaded files
#[async_trait]
pub trait FileStorageService: Send + Sync {
    /// Store file data and return its storage URL
    async fn store_file(&self, project_id: &str, file_name: &str, data: &[u8]) -> InsightResult<String>;

    /// Delete a stored file. Missing files are not an error.
    async fn delete_file(&self, storage_url: &str) -> InsightResult<()>;

    /// Check if a stored file exists
    async fn file_exists(&self, storage_url: &str) -> bool;
}
