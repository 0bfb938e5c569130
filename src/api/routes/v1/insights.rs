// src/api/routes/v1/insights.rs
//! Insight, review and presentation API routes

use axum::{
    extract::{Path, State},
    response::Json,
    routing::{get, put},
    Router,
};
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::repository::RepositoryManager;
use crate::services::review::{PresentationSection, ReviewSnapshot, ReviewStats};
use crate::storage::{InsightRecord, ReviewStatus};

/// Create insight routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .route("/projects/:id/insights", get(get_insights::<R>))
        .route("/projects/:id/review", get(get_review::<R>))
        .route("/projects/:id/review/:insight_id", put(set_review_status::<R>))
        .route("/projects/:id/presentation", get(get_presentation::<R>))
}

#[derive(Debug, Deserialize)]
struct ReviewRequest {
    status: ReviewStatus,
}

async fn get_insights<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ApiResponse<InsightRecord>>> {
    state.services.projects().get(&project_id).await?;
    let record = state.services.insights().load(&project_id).await?;
    Ok(Json(ApiResponse::success(record)))
}

async fn get_review<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ApiResponse<ReviewSnapshot>>> {
    state.services.projects().get(&project_id).await?;
    let snapshot = state.services.reviews().snapshot(&project_id).await?;
    Ok(Json(ApiResponse::success(snapshot)))
}

async fn set_review_status<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path((project_id, insight_id)): Path<(String, String)>,
    Json(request): Json<ReviewRequest>,
) -> ApiResult<Json<ApiResponse<ReviewStats>>> {
    state.services.projects().get(&project_id).await?;
    let stats = state
        .services
        .reviews()
        .set_status(&project_id, &insight_id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(stats)))
}

/// Accepted insights grouped by category
async fn get_presentation<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<PresentationSection>>>> {
    state.services.projects().get(&project_id).await?;
    let outline = state.services.reviews().outline(&project_id).await?;
    Ok(Json(ApiResponse::success(outline)))
}
