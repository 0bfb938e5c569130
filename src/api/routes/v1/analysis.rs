// src/api/routes/v1/analysis.rs
//! Analysis API routes
//!
//! Starting an analysis returns immediately with 202; clients poll the status
//! endpoint until the run is completed or failed.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::repository::RepositoryManager;
use crate::services::analysis::JobStatus;
use crate::storage::InsightSource;

/// Create analysis routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .route("/projects/:id/analysis/documents", post(analyze_documents::<R>))
        .route("/projects/:id/analysis/website", post(analyze_website::<R>))
        .route("/projects/:id/analysis/status", get(analysis_status::<R>))
}

async fn start<R: RepositoryManager>(
    state: AppState<R>,
    project_id: &str,
    source: InsightSource,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobStatus>>)> {
    let status = state.services.analysis().start(project_id, source).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::success_with_message(
            status,
            format!("{} analysis started", source),
        )),
    ))
}

async fn analyze_documents<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobStatus>>)> {
    start(state, &project_id, InsightSource::Document).await
}

async fn analyze_website<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<(StatusCode, Json<ApiResponse<JobStatus>>)> {
    start(state, &project_id, InsightSource::Website).await
}

async fn analysis_status<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ApiResponse<JobStatus>>> {
    let status = state.services.analysis().status(&project_id).await?;
    Ok(Json(ApiResponse::success(status)))
}
