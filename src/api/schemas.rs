//! Schema endpoints: lets the admin front-end build its forms

use axum::{extract::Path, response::IntoResponse, routing::get, Json, Router};

use crate::api::common::{parse_kind, ItemsResponse};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ContentKind, EntitySchema};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_schemas))
        .route("/{kind}", get(get_schema))
}

async fn list_schemas() -> impl IntoResponse {
    let schemas: Vec<&'static EntitySchema> =
        ContentKind::ALL.iter().map(|kind| kind.schema()).collect();
    Json(ItemsResponse::from(schemas))
}

async fn get_schema(Path(kind): Path<String>) -> Result<impl IntoResponse, ApiError> {
    let kind = parse_kind(&kind)?;
    Ok(Json(kind.schema()))
}
