// src/services/mod.rs
//! Service layer module
//!
//! This module contains the business logic layer that sits between the API and repository layers.
//! Services encapsulate the workflow rules (upload limits, analysis fallback, insight merge,
//! review aggregation) and coordinate the repositories with the remote analysis functions.

pub mod analysis;
pub mod dispatcher;
pub mod documents;
pub mod file_storage;
pub mod insights;
pub mod progress;
pub mod projects;
pub mod remote;
pub mod review;
pub mod traits;
pub mod upload;

// Re-export commonly used types and traits
pub use traits::*;

use std::sync::Arc;

use crate::config::Config;
use crate::error::InsightResult;
use crate::repository::RepositoryManager;
use analysis::AnalysisService;
use dispatcher::AnalysisDispatcher;
use documents::DocumentService;
use insights::InsightStore;
use projects::ProjectService;
use review::ReviewService;

/// Service manager that provides access to all services
pub struct ServiceManager<R: RepositoryManager> {
    repository_manager: Arc<R>,
    config: Arc<Config>,
    backend: Arc<dyn AnalysisBackend>,
    project_service: Arc<ProjectService<R>>,
    document_service: Arc<DocumentService<R>>,
    insight_store: Arc<InsightStore<R>>,
    review_service: Arc<ReviewService<R>>,
    analysis_service: AnalysisService<R>,
}

impl<R: RepositoryManager> ServiceManager<R> {
    /// Create a new service manager talking to the configured function
    /// platform and storing uploads under the data directory
    pub fn new(repository_manager: Arc<R>, config: &Config) -> InsightResult<Self> {
        let backend = Arc::new(remote::FunctionClient::new(
            &config.backend,
            config.analysis.hard_timeout(),
        )?);
        let file_storage = Arc::new(file_storage::LocalFileStorageService::new(
            config.storage.data_directory.join("uploads"),
        ));

        Ok(Self::with_collaborators(
            repository_manager,
            config,
            backend,
            file_storage,
        ))
    }

    /// Create a service manager with explicit remote collaborators
    pub fn with_collaborators(
        repository_manager: Arc<R>,
        config: &Config,
        backend: Arc<dyn AnalysisBackend>,
        file_storage: Arc<dyn FileStorageService>,
    ) -> Self {
        let project_service = Arc::new(ProjectService::new(repository_manager.clone()));

        let document_service = Arc::new(DocumentService::new(
            repository_manager.clone(),
            file_storage,
            config.upload_policy(),
            config.is_production(),
        ));

        let insight_store = Arc::new(InsightStore::new(repository_manager.clone()));
        let review_service = Arc::new(ReviewService::new(repository_manager.clone()));

        let dispatcher = Arc::new(AnalysisDispatcher::new(
            backend.clone(),
            config.ai.clone(),
            config.analysis.clone(),
        ));

        let analysis_service = AnalysisService::new(
            repository_manager.clone(),
            dispatcher,
            insight_store.clone(),
            review_service.clone(),
            project_service.clone(),
            config.analysis.clone(),
        );

        Self {
            repository_manager,
            config: Arc::new(config.clone()),
            backend,
            project_service,
            document_service,
            insight_store,
            review_service,
            analysis_service,
        }
    }

    /// Get project service
    pub fn projects(&self) -> &ProjectService<R> {
        self.project_service.as_ref()
    }

    /// Get document service
    pub fn documents(&self) -> &DocumentService<R> {
        self.document_service.as_ref()
    }

    /// Get insight store
    pub fn insights(&self) -> &InsightStore<R> {
        self.insight_store.as_ref()
    }

    /// Get review service
    pub fn reviews(&self) -> &ReviewService<R> {
        self.review_service.as_ref()
    }

    /// Get analysis service
    pub fn analysis(&self) -> &AnalysisService<R> {
        &self.analysis_service
    }

    /// Get the remote analysis backend
    pub fn backend(&self) -> &dyn AnalysisBackend {
        self.backend.as_ref()
    }

    /// Get configuration
    pub fn config(&self) -> &Config {
        self.config.as_ref()
    }

    /// Get repository manager
    pub fn repositories(&self) -> &R {
        self.repository_manager.as_ref()
    }
}
