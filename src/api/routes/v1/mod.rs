// src/api/routes/v1/mod.rs
//! Version 1 API routes
//!
//! Every resource lives under a project: `/projects/:id/...`.

pub mod analysis;
pub mod documents;
pub mod insights;
pub mod projects;

use axum::Router;

use crate::api::AppState;
use crate::repository::RepositoryManager;

/// Create all v1 API routes
pub fn create_routes<R: RepositoryManager>() -> Router<AppState<R>> {
    Router::new()
        .merge(projects::create_routes())
        .merge(documents::create_routes())
        .merge(analysis::create_routes())
        .merge(insights::create_routes())
}
