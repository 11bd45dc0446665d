//! Public read endpoints for the travel site

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::api::common::{parse_kind, parse_target, ItemsResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ContentKind, ContentRecord, ListingTarget, PackageListing};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/content/{kind}", get(list_visible))
        .route("/listings/{target}", get(get_listing))
        .route("/popup", get(get_popup))
        .route("/health", get(health))
}

#[derive(Serialize)]
struct ListingResponse {
    listing: ListingTarget,
    items: Vec<PackageListing>,
}

#[derive(Serialize)]
struct PopupResponse {
    popup: Option<ContentRecord>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    database: &'static str,
    total_requests: u64,
    avg_response_time_ms: f64,
    uptime_seconds: u64,
}

async fn list_visible(
    State(state): State<AppState>,
    Path(kind): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    let records = state.content_service.list_visible(kind).await?;
    Ok(Json(ItemsResponse::from(records)))
}

async fn get_listing(
    State(state): State<AppState>,
    Path(target): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let target = parse_target(&target)?;
    let items = state
        .package_service
        .list_listing(target)
        .await
        .map_err(|e| {
            tracing::error!("Failed to load {} listing: {:#}", target, e);
            ApiError::internal_error("Internal server error")
        })?;
    Ok(Json(ListingResponse {
        listing: target,
        items,
    }))
}

async fn get_popup(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let popup = state
        .content_service
        .active_singleton(ContentKind::Popup)
        .await?;
    Ok(Json(PopupResponse { popup }))
}

/// Always answers 200 so load balancers can read the body
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = match state.pool.ping().await {
        Ok(()) => "ok",
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            "unavailable"
        }
    };
    let stats = &state.request_stats;
    Json(HealthResponse {
        status: if database == "ok" { "ok" } else { "degraded" },
        database,
        total_requests: stats.total_requests(),
        avg_response_time_ms: stats.avg_response_time_us() / 1000.0,
        uptime_seconds: stats.uptime_seconds(),
    })
}
