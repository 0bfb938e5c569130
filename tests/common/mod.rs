#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use strategy_insights::config::Config;
use strategy_insights::error::{InsightError, InsightResult};
use strategy_insights::repository::MemoryRepositoryManager;
use strategy_insights::services::file_storage::LocalFileStorageService;
use strategy_insights::services::{
    AnalysisBackend, DocumentAnalysisRequest, ProgressReport, ServiceManager, WebsiteAnalysisRequest,
};

/// Analysis backend double. Responses can be swapped between runs.
pub struct MockBackend {
    pub documents: Mutex<InsightResult<Value>>,
    pub website: Mutex<InsightResult<Value>>,
    pub document_calls: AtomicUsize,
}

impl MockBackend {
    pub fn failing() -> Self {
        Self {
            documents: Mutex::new(Err(InsightError::Analysis("function returned 500".into()))),
            website: Mutex::new(Err(InsightError::Analysis("function returned 500".into()))),
            document_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_documents(body: Value) -> Self {
        let backend = Self::failing();
        backend.set_documents(Ok(body));
        backend
    }

    pub fn set_documents(&self, response: InsightResult<Value>) {
        *self.documents.lock().unwrap() = response;
    }

    pub fn set_website(&self, response: InsightResult<Value>) {
        *self.website.lock().unwrap() = response;
    }

    pub fn calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }
}

fn replay(slot: &Mutex<InsightResult<Value>>) -> InsightResult<Value> {
    match &*slot.lock().unwrap() {
        Ok(body) => Ok(body.clone()),
        Err(e) => Err(InsightError::Analysis(e.to_string())),
    }
}

#[async_trait]
impl AnalysisBackend for MockBackend {
    async fn analyze_documents(&self, _request: &DocumentAnalysisRequest) -> InsightResult<Value> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        replay(&self.documents)
    }

    async fn analyze_website(&self, _request: &WebsiteAnalysisRequest) -> InsightResult<Value> {
        replay(&self.website)
    }

    async fn website_progress(&self, _request: &WebsiteAnalysisRequest) -> InsightResult<ProgressReport> {
        Ok(ProgressReport::default())
    }

    async fn is_available(&self) -> bool {
        true
    }
}

/// Config with fast timers and a valid-looking API key.
pub fn test_config(data_dir: &Path) -> Config {
    let mut config = Config::default();
    config.ai.api_key = format!("sk-ant-{}", "k".repeat(40));
    config.storage.data_directory = data_dir.to_path_buf();
    config.analysis.simulation_interval_ms = 10;
    config.analysis.poll_interval_ms = 20;
    config.analysis.completion_delay_ms = 10;
    config.analysis.document_timeout_secs = 2;
    config.analysis.website_timeout_secs = 2;
    config.analysis.hard_timeout_secs = 5;
    config
}

pub fn services(
    config: &Config,
    backend: Arc<MockBackend>,
) -> Arc<ServiceManager<MemoryRepositoryManager>> {
    let storage = Arc::new(LocalFileStorageService::new(
        config.storage.data_directory.join("uploads"),
    ));
    Arc::new(ServiceManager::with_collaborators(
        Arc::new(MemoryRepositoryManager::new()),
        config,
        backend,
        storage,
    ))
}

pub fn document_insights() -> Value {
    json!({
        "analysisResults": [{
            "documentId": "doc-1",
            "insights": [
                {"id": "ins-1", "category": "audience_gaps", "confidence": 0.9,
                 "content": {"title": "Teens are missing", "summary": "Reach among 13-17 is low"}},
                {"id": "ins-2", "category": "gaming_opportunities", "confidence": 74,
                 "content": {"title": "Branded island"}},
                {"category": "key_narratives", "title": "Play together", "confidence": 61}
            ]
        }]
    })
}
