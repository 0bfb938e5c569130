// src/api/routes/v1/projects.rs
//! Project management API routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, patch},
    Router,
};
use serde::Deserialize;

use crate::api::{ApiResponse, ApiResult, AppState};
use crate::repository::RepositoryManager;
use crate::storage::{NewProject, Project, ProjectStatus};

/// Create project routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .route("/projects", get(list_projects::<R>).post(create_project::<R>))
        .route("/projects/:id", get(get_project::<R>))
        .route("/projects/:id/status", patch(update_status::<R>))
}

#[derive(Debug, Deserialize)]
struct UpdateStatusRequest {
    status: ProjectStatus,
}

/// List all projects, newest first
async fn list_projects<R: RepositoryManager>(
    State(state): State<AppState<R>>,
) -> ApiResult<Json<ApiResponse<Vec<Project>>>> {
    let projects = state.services.projects().list().await?;
    Ok(Json(ApiResponse::success(projects)))
}

async fn create_project<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Json(request): Json<NewProject>,
) -> ApiResult<(StatusCode, Json<ApiResponse<Project>>)> {
    let project = state.services.projects().create(request).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(
            project,
            "Project created".to_string(),
        )),
    ))
}

async fn get_project<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<Project>>> {
    let project = state.services.projects().get(&id).await?;
    Ok(Json(ApiResponse::success(project)))
}

async fn update_status<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> ApiResult<Json<ApiResponse<Project>>> {
    let project = state
        .services
        .projects()
        .update_status(&id, request.status)
        .await?;
    Ok(Json(ApiResponse::success(project)))
}
