// src/services/remote.rs
//! HTTP client for the hosted analysis functions.

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::traits::{AnalysisBackend, DocumentAnalysisRequest, ProgressReport, WebsiteAnalysisRequest};
use crate::ai::parse_response_body;
use crate::config::BackendConfig;
use crate::error::{InsightError, InsightResult};

/// Calls `POST {base_url}/functions/v1/{name}` with the anon key as bearer.
pub struct FunctionClient {
    client: Client,
    base_url: String,
    anon_key: String,
    document_function: String,
    website_function: String,
}

impl FunctionClient {
    pub fn new(config: &BackendConfig, request_timeout: Duration) -> InsightResult<Self> {
        // The dispatcher applies its own, shorter deadline; this one only
        // guards against connections that never close.
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| InsightError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
            document_function: config.document_function.clone(),
            website_function: config.website_function.clone(),
        })
    }

    /// Build URL for a function endpoint
    fn build_url(&self, function: &str) -> String {
        format!("{}/functions/v1/{}", self.base_url, function.trim_start_matches('/'))
    }

    async fn invoke<B: Serialize + Sync>(&self, function: &str, body: &B) -> InsightResult<Value> {
        let url = self.build_url(function);
        debug!("Invoking function {}", url);

        let mut request = self.client.post(&url).json(body);
        if !self.anon_key.is_empty() {
            request = request.bearer_auth(&self.anon_key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                InsightError::Analysis(format!("request to {} timed out", function))
            } else {
                InsightError::Analysis(format!("failed to reach {}: {}", function, e))
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| InsightError::Analysis(format!("failed to read {} response: {}", function, e)))?;

        if !status.is_success() {
            return Err(InsightError::Analysis(format!(
                "{} returned {}: {}",
                function,
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        parse_response_body(&text)
            .map_err(|e| InsightError::Analysis(format!("{} returned invalid JSON: {}", function, e)))
    }
}

#[async_trait]
impl AnalysisBackend for FunctionClient {
    async fn analyze_documents(&self, request: &DocumentAnalysisRequest) -> InsightResult<Value> {
        self.invoke(&self.document_function, request).await
    }

    async fn analyze_website(&self, request: &WebsiteAnalysisRequest) -> InsightResult<Value> {
        self.invoke(&self.website_function, request).await
    }

    async fn website_progress(&self, request: &WebsiteAnalysisRequest) -> InsightResult<ProgressReport> {
        let body = self
            .invoke(&self.website_function, &request.as_progress_check())
            .await?;
        Ok(serde_json::from_value(body).unwrap_or_default())
    }

    async fn is_available(&self) -> bool {
        match self.client.get(&self.base_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(_) => false,
        }
    }
}
