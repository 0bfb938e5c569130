// src/api/routes/health.rs
//! Health check routes
//!
//! This module provides health check endpoints for monitoring the application status.

use axum::{extract::State, response::Json, routing::get, Router};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::api::{error::ApiError, ApiResult, AppState};
use crate::repository::RepositoryManager;

/// Create health check routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check::<R>))
}

/// Basic health check endpoint
/// Returns 200 OK if the service is running
async fn health_check() -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "service": "strategy-insights",
        "version": env!("CARGO_PKG_VERSION")
    })))
}

/// Readiness check endpoint
///
/// Storage must be reachable. The analysis backend and API key only degrade
/// analysis to fallback data, so they are reported but do not fail the check.
async fn readiness_check<R: RepositoryManager>(
    State(state): State<AppState<R>>,
) -> ApiResult<Json<Value>> {
    let mut checks = HashMap::new();

    let storage_accessible = tokio::fs::metadata(&state.config.storage.data_directory)
        .await
        .is_ok();
    checks.insert("storage", if storage_accessible { "accessible" } else { "inaccessible" });

    let backend_available = state.services.backend().is_available().await;
    checks.insert("analysis_backend", if backend_available { "available" } else { "unavailable" });

    checks.insert(
        "ai_api_key",
        if state.config.ai.is_configured() { "configured" } else { "missing" },
    );

    let running = state.services.analysis().jobs().active_count().await;

    if !storage_accessible {
        return Err(ApiError::ServiceUnavailable("Storage is not accessible".to_string()));
    }

    Ok(Json(json!({
        "status": if backend_available && state.config.ai.is_configured() { "ready" } else { "degraded" },
        "timestamp": chrono::Utc::now(),
        "checks": checks,
        "running_analyses": running
    })))
}
