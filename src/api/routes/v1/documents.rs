// src/api/routes/v1/documents.rs
//! Document upload API routes
//!
//! Uploads are multipart; every part with a file name is one document.

use axum::{
    extract::{Multipart, Path, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get},
    Router,
};

use crate::api::{error::ApiError, ApiResponse, ApiResult, AppState, USER_ID_HEADER};
use crate::error::InsightError;
use crate::repository::RepositoryManager;
use crate::services::documents::{UploadFile, UploadReport};
use crate::storage::Document;

/// Create document routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .route(
            "/projects/:id/documents",
            get(list_documents::<R>).post(upload_documents::<R>),
        )
        .route(
            "/projects/:id/documents/:document_id",
            delete(remove_document::<R>),
        )
}

/// Caller identity from the mock identity header.
fn user_id(headers: &HeaderMap) -> Result<String, InsightError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
        .ok_or_else(|| InsightError::Authentication("sign in to upload documents".to_string()))
}

/// Documents of a project, highest priority first
async fn list_documents<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
) -> ApiResult<Json<ApiResponse<Vec<Document>>>> {
    state.services.projects().get(&project_id).await?;
    let documents = state.services.documents().list(&project_id).await?;
    Ok(Json(ApiResponse::success(documents)))
}

async fn upload_documents<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path(project_id): Path<String>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<ApiResponse<UploadReport>>)> {
    let uploaded_by = user_id(&headers)?;

    let mut files = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart body: {}", e)))?
    {
        let Some(name) = field.file_name().map(String::from) else {
            continue;
        };
        let mime_type = field.content_type().map(String::from);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read {}: {}", name, e)))?;
        files.push(UploadFile {
            name,
            mime_type,
            data: data.to_vec(),
        });
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files in request".to_string()));
    }

    let report = state
        .services
        .documents()
        .upload(&project_id, &uploaded_by, files)
        .await?;

    let message = format!(
        "{} uploaded, {} rejected",
        report.uploaded.len(),
        report.rejected.len()
    );
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::success_with_message(report, message)),
    ))
}

async fn remove_document<R: RepositoryManager>(
    State(state): State<AppState<R>>,
    Path((project_id, document_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    state
        .services
        .documents()
        .remove(&project_id, &document_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
