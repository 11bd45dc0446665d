//! Admin content endpoints
//!
//! CRUD, visibility and manual ordering for every content kind.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};

use crate::api::common::{parse_kind, GroupQuery, ItemResponse, ItemsResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Fields, FlagInput, MoveInput, ReorderInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{kind}", get(list_content).post(create_content))
        .route("/{kind}/order", put(reorder_content))
        .route(
            "/{kind}/{id}",
            get(get_content).put(update_content).delete(delete_content),
        )
        .route("/{kind}/{id}/toggle", post(toggle_content))
        .route("/{kind}/{id}/flag", put(set_content_flag))
        .route("/{kind}/{id}/move", post(move_content))
}

async fn list_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<GroupQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let records = state.content_service.list(kind, query.group).await?;
    Ok(Json(ItemsResponse::from(records)))
}

async fn get_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.get(kind, id).await?;
    Ok(Json(ItemResponse { item }))
}

async fn create_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(input): Json<Fields>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.create(kind, &input).await?;
    Ok((StatusCode::CREATED, Json(ItemResponse { item })))
}

async fn update_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(input): Json<Fields>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.update(kind, id, &input).await?;
    Ok(Json(ItemResponse { item }))
}

async fn delete_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    state.content_service.delete(kind, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn toggle_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.toggle(kind, id).await?;
    Ok(Json(ItemResponse { item }))
}

async fn set_content_flag(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(input): Json<FlagInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let item = state.content_service.set_flag(kind, id, input.value).await?;
    Ok(Json(ItemResponse { item }))
}

/// Returns the affected scope in its new order
async fn move_content(
    State(state): State<AppState>,
    Path((kind, id)): Path<(String, i64)>,
    Json(input): Json<MoveInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = state.content_service.move_item(kind, id, &input).await?;
    Ok(Json(ItemsResponse::from(scope)))
}

async fn reorder_content(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Json(input): Json<ReorderInput>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let scope = state.content_service.reorder(kind, &input).await?;
    Ok(Json(ItemsResponse::from(scope)))
}
