//! API middleware and shared handler types
//!
//! Contains:
//! - Application state shared by every handler
//! - The JSON error envelope and service error mapping
//! - The admin bearer-token gate
//! - Request statistics

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::AdminConfig;
use crate::db::DynDatabasePool;
use crate::services::{
    ContentService, ContentServiceError, DraftService, DraftServiceError, ImportError,
    ImportService, PackageService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Total response time in microseconds (for calculating average)
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in microseconds
    pub fn avg_response_time_us(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub content_service: Arc<ContentService>,
    pub package_service: Arc<PackageService>,
    pub draft_service: Arc<DraftService>,
    pub import_service: Arc<ImportService>,
    pub admin: Arc<AdminConfig>,
    pub request_stats: Arc<RequestStats>,
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "IMPORT_REJECTED" => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

/// Internal errors are logged in full; the client only sees a generic message
fn internal(err: anyhow::Error) -> ApiError {
    tracing::error!("Request failed: {:#}", err);
    ApiError::internal_error("Internal server error")
}

impl From<ContentServiceError> for ApiError {
    fn from(err: ContentServiceError) -> Self {
        match err {
            ContentServiceError::NotFound(m) => Self::not_found(m),
            ContentServiceError::ValidationError(m) => Self::validation_error(m),
            ContentServiceError::Conflict(m) => Self::conflict(m),
            ContentServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<DraftServiceError> for ApiError {
    fn from(err: DraftServiceError) -> Self {
        match err {
            DraftServiceError::NotFound(m) => Self::not_found(m),
            DraftServiceError::ValidationError(m) => Self::validation_error(m),
            DraftServiceError::Conflict(m) => Self::conflict(m),
            DraftServiceError::InternalError(e) => internal(e),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::ValidationError(m) => Self::validation_error(m),
            ImportError::Rejected(report) => {
                let message = format!("{} row(s) failed validation", report.skipped.len());
                match serde_json::to_value(&report) {
                    Ok(details) => Self::with_details("IMPORT_REJECTED", message, details),
                    Err(_) => Self::new("IMPORT_REJECTED", message),
                }
            }
            ImportError::InternalError(e) => internal(e),
        }
    }
}

// ============================================================================
// Middleware
// ============================================================================

/// Extract a bearer token from the Authorization header
fn extract_bearer_token(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
}

/// Admin gate: the bearer token must be one of the configured admin tokens.
/// With no tokens configured every request passes.
pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.admin.is_open() {
        return Ok(next.run(request).await);
    }

    let token = extract_bearer_token(&request)
        .ok_or_else(|| ApiError::unauthorized("Missing admin token"))?;
    if !state.admin.accepts(token) {
        tracing::warn!(
            "Rejected admin request to {} with unknown token",
            request.uri().path()
        );
        return Err(ApiError::forbidden("Invalid admin token"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
///
/// Records request count and response time for the health endpoint.
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    state.request_stats.record(duration_us);

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{ImportReport, SkippedRow};

    #[test]
    fn test_request_stats_average() {
        let stats = RequestStats::new();
        assert_eq!(stats.avg_response_time_us(), 0.0);
        stats.record(100);
        stats.record(300);
        assert_eq!(stats.total_requests(), 2);
        assert_eq!(stats.avg_response_time_us(), 200.0);
    }

    #[test]
    fn test_service_errors_map_to_status_codes() {
        let cases = [
            (ApiError::from(ContentServiceError::NotFound("x".into())), StatusCode::NOT_FOUND),
            (
                ApiError::from(ContentServiceError::ValidationError("x".into())),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(DraftServiceError::Conflict("x".into())), StatusCode::CONFLICT),
            (
                ApiError::from(DraftServiceError::InternalError(anyhow::anyhow!("db down"))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, status) in cases {
            assert_eq!(error.status(), status);
        }
    }

    #[test]
    fn test_rejected_import_carries_report() {
        let report = ImportReport {
            total_rows: 2,
            accepted: 1,
            skipped: vec![SkippedRow {
                line: 3,
                reason: "Field 'image_url' cannot be empty".to_string(),
            }],
            ..Default::default()
        };
        let error = ApiError::from(ImportError::Rejected(report));
        assert_eq!(error.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let details = error.error.details.unwrap();
        assert_eq!(details["skipped"][0]["line"], 3);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let error = ApiError::from(ContentServiceError::InternalError(anyhow::anyhow!(
            "no such table: secrets"
        )));
        assert!(!error.error.message.contains("secrets"));
    }
}
