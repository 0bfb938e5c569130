// src/api/mod.rs
//! API layer module
//!
//! This module contains the HTTP API layer that handles incoming requests,
//! validates input, calls appropriate services, and formats responses.

pub mod routes;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderName, HeaderValue, Method};
use axum::Router;
use log::warn;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;

use crate::config::Config;
use crate::repository::RepositoryManager;
use crate::services::ServiceManager;

/// Header carrying the caller's identity until real authentication exists
pub const USER_ID_HEADER: &str = "x-user-id";

/// API application state
pub struct AppState<R: RepositoryManager> {
    pub services: Arc<ServiceManager<R>>,
    pub config: Arc<Config>,
}

impl<R: RepositoryManager> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            services: self.services.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R: RepositoryManager> AppState<R> {
    pub fn new(services: Arc<ServiceManager<R>>) -> Self {
        let config = Arc::new(services.config().clone());
        Self { services, config }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!("Ignoring invalid CORS origin {}", origin);
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::PATCH,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ])
}

/// Create the main API router with all routes and middleware
pub fn create_router<R: RepositoryManager>(state: AppState<R>) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(cors_layer(&state.config.server.cors_origins))
        .layer(TimeoutLayer::new(Duration::from_secs(
            state.config.server.request_timeout_secs,
        )));

    Router::new()
        .nest("/api/v1", routes::v1::create_routes())
        .nest("/health", routes::health::create_routes())
        .layer(DefaultBodyLimit::max(state.config.server.max_body_size))
        .layer(middleware)
        .with_state(state)
}

/// API error types
pub mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use log::error;
    use serde_json::json;
    use std::fmt;

    use crate::error::InsightError;

    /// API error type
    #[derive(Debug)]
    pub enum ApiError {
        BadRequest(String),
        ServiceUnavailable(String),
        /// A workflow error, mapped by kind
        Domain(InsightError),
    }

    impl fmt::Display for ApiError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            match self {
                ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
                ApiError::ServiceUnavailable(msg) => write!(f, "Service Unavailable: {}", msg),
                ApiError::Domain(err) => write!(f, "{}", err),
            }
        }
    }

    impl std::error::Error for ApiError {}

    fn domain_status(err: &InsightError) -> StatusCode {
        match err {
            InsightError::Validation(_) => StatusCode::BAD_REQUEST,
            InsightError::Authentication(_) => StatusCode::UNAUTHORIZED,
            InsightError::DocumentNotFound(_) | InsightError::ProjectNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            InsightError::Conflict(_) => StatusCode::CONFLICT,
            InsightError::StorageUpload(_) => StatusCode::SERVICE_UNAVAILABLE,
            InsightError::Analysis(_) => StatusCode::BAD_GATEWAY,
            InsightError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            InsightError::Database(_) | InsightError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let (status, code, retriable, message) = match self {
                ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", false, msg),
                ApiError::ServiceUnavailable(msg) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", true, msg)
                }
                ApiError::Domain(err) => {
                    let status = domain_status(&err);
                    if status.is_server_error() {
                        error!("Request failed: {}", err);
                    }
                    (status, err.code(), err.is_retriable(), err.to_string())
                }
            };

            let body = Json(json!({
                "error": {
                    "message": message,
                    "code": code,
                    "status": status.as_u16(),
                    "retriable": retriable
                }
            }));

            (status, body).into_response()
        }
    }

    impl From<InsightError> for ApiError {
        fn from(err: InsightError) -> Self {
            ApiError::Domain(err)
        }
    }
}

/// API result type
pub type ApiResult<T> = Result<T, error::ApiError>;

/// Common API response wrapper
#[derive(serde::Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            timestamp: chrono::Utc::now(),
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
            timestamp: chrono::Utc::now(),
        }
    }
}
