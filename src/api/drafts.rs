//! Draft endpoints

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{parse_kind, ItemResponse, ItemsResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Draft, SaveDraftInput, UpdateDraftInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}", get(list_drafts).post(save_draft))
        .route(
            "/{kind}/{id}",
            get(get_draft).put(update_draft).delete(delete_draft),
        )
        .route("/{kind}/{id}/publish", post(publish_draft))
}

#[derive(Serialize)]
struct DraftResponse {
    draft: Draft,
}

#[derive(Debug, Default, Deserialize)]
struct PublishInput {
    #[serde(default)]
    expected_version: Option<i64>,
}

async fn list_drafts(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let drafts = state.draft_service.list(kind).await?;
    Ok(Json(ItemsResponse::from(drafts)))
}

async fn get_draft(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let draft = state.draft_service.get(kind, id).await?;
    Ok(Json(DraftResponse { draft }))
}

async fn save_draft(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(input): Json<SaveDraftInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let draft = state.draft_service.save(kind, &input).await?;
    Ok(Json(DraftResponse { draft }))
}

async fn update_draft(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(input): Json<UpdateDraftInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let draft = state.draft_service.update(kind, id, &input).await?;
    Ok(Json(DraftResponse { draft }))
}

async fn delete_draft(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    state.draft_service.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Body is optional: `{"expected_version": n}`
async fn publish_draft(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let input: PublishInput = if body.is_empty() {
        PublishInput::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::validation_error(format!("Invalid publish body: {}", e)))?
    };
    let expected_version = input.expected_version;
    let item = state
        .draft_service
        .publish(kind, id, expected_version)
        .await?;
    Ok(Json(ItemResponse { item }))
}
