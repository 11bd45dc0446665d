//! CSV import and export endpoints

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use crate::api::common::parse_kind;
use crate::api::middleware::{ApiError, AppState};
use crate::services::csv_import;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}/import", post(import_csv))
        .route("/{kind}/import/template", get(import_template))
        .route("/{kind}/export", get(export_csv))
}

#[derive(Debug, Default, Deserialize)]
struct ImportQuery {
    #[serde(default)]
    dry_run: bool,
}

/// The body is the raw CSV text
async fn import_csv(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<ImportQuery>,
    body: String,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let report = state
        .import_service
        .import(kind, &body, query.dry_run)
        .await?;
    Ok(Json(report))
}

fn csv_download(kind: &str, suffix: &str, body: String) -> impl IntoResponse {
    let disposition = format!("attachment; filename=\"{}{}.csv\"", kind, suffix);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
}

async fn import_template(Path(kind): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let body = csv_import::template(kind)?;
    Ok(csv_download(kind.as_str(), "-template", body))
}

async fn export_csv(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let body = state.import_service.export(kind).await?;
    Ok(csv_download(kind.as_str(), "", body))
}
