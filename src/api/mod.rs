//! API layer - HTTP handlers and routing
//!
//! Public endpoints (`/api/v1`):
//! - Visible content per kind, package listings, the active popup, health
//!
//! Admin endpoints (`/api/v1/admin`, behind the bearer-token gate):
//! - Schemas, content CRUD and ordering, CSV import/export, drafts

pub mod common;
pub mod content;
pub mod drafts;
pub mod import;
pub mod middleware;
pub mod public;
pub mod schemas;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware, Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    let admin_routes = Router::new()
        .nest("/admin/schemas", schemas::router())
        .nest("/admin/content", content::router().merge(import::router()))
        .nest("/admin/drafts", drafts::router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::require_admin,
        ));

    public::router().merge(admin_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    let cors = match cors_origin.parse::<HeaderValue>() {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!("Ignoring invalid CORS origin '{}': {}", cors_origin, e);
            cors
        }
    };

    Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        // Request stats (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::config::{AdminConfig, ImportConfig};
    use crate::db::repositories::{
        SqlxContentRepository, SqlxDraftRepository, SqlxListingRepository,
    };
    use crate::db::{create_test_pool, migrations};
    use crate::services::{ContentService, DraftService, ImportService, PackageService};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::{json, Value};
    use std::sync::Arc;

    const TOKEN: &str = "test-admin-token";

    async fn server_with_tokens(tokens: Vec<String>) -> TestServer {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        let cache = Arc::new(MemoryCache::new());
        let package_service = Arc::new(PackageService::new(
            SqlxListingRepository::boxed(pool.clone()),
            cache.clone(),
        ));
        let content_service = Arc::new(ContentService::new(
            SqlxContentRepository::boxed(pool.clone()),
            cache,
        ));
        let draft_service = Arc::new(DraftService::new(
            SqlxDraftRepository::boxed(pool.clone()),
            content_service.clone(),
        ));
        let import_service = Arc::new(ImportService::new(
            content_service.clone(),
            ImportConfig::default(),
        ));

        let state = AppState {
            pool,
            content_service,
            package_service,
            draft_service,
            import_service,
            admin: Arc::new(AdminConfig { tokens }),
            request_stats: Arc::new(RequestStats::new()),
        };
        TestServer::new(build_router(state, "http://localhost:3000"))
            .expect("Failed to start test server")
    }

    async fn server() -> TestServer {
        server_with_tokens(vec![TOKEN.to_string()]).await
    }

    #[tokio::test]
    async fn test_admin_gate() {
        let server = server().await;

        let missing = server.get("/api/v1/admin/content/banners").await;
        assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

        let wrong = server
            .get("/api/v1/admin/content/banners")
            .authorization_bearer("nope")
            .await;
        assert_eq!(wrong.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(wrong.json::<Value>()["error"]["code"], "FORBIDDEN");

        let ok = server
            .get("/api/v1/admin/content/banners")
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(ok.status_code(), StatusCode::OK);

        // Public routes never need a token
        let public = server.get("/api/v1/content/banners").await;
        assert_eq!(public.status_code(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_open_gate_without_tokens() {
        let server = server_with_tokens(Vec::new()).await;
        let response = server.get("/api/v1/admin/schemas").await;
        assert_eq!(response.status_code(), StatusCode::OK);
        assert_eq!(response.json::<Value>()["total"], 7);
    }

    #[tokio::test]
    async fn test_content_lifecycle() {
        let server = server().await;

        let created = server
            .post("/api/v1/admin/content/offers")
            .authorization_bearer(TOKEN)
            .json(&json!({"title": "Early bird", "discount_percent": 15}))
            .await;
        assert_eq!(created.status_code(), StatusCode::CREATED);
        let id = created.json::<Value>()["item"]["id"].as_i64().unwrap();

        let updated = server
            .put(&format!("/api/v1/admin/content/offers/{}", id))
            .authorization_bearer(TOKEN)
            .json(&json!({"discount_text": "15% off"}))
            .await;
        assert_eq!(updated.status_code(), StatusCode::OK);
        let body = updated.json::<Value>();
        assert_eq!(body["item"]["title"], "Early bird");
        assert_eq!(body["item"]["discount_text"], "15% off");

        let toggled = server
            .post(&format!("/api/v1/admin/content/offers/{}/toggle", id))
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(toggled.json::<Value>()["item"]["is_active"], false);
        let public = server.get("/api/v1/content/offers").await;
        assert_eq!(public.json::<Value>()["total"], 0);

        let deleted = server
            .delete(&format!("/api/v1/admin/content/offers/{}", id))
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(deleted.status_code(), StatusCode::NO_CONTENT);

        let missing = server
            .get(&format!("/api/v1/admin/content/offers/{}", id))
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_validation_and_unknown_kind() {
        let server = server().await;

        let empty_title = server
            .post("/api/v1/admin/content/banners")
            .authorization_bearer(TOKEN)
            .json(&json!({"title": "  ", "image_url": "a.jpg"}))
            .await;
        assert_eq!(empty_title.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(empty_title.json::<Value>()["error"]["code"], "VALIDATION_ERROR");

        let unknown = server
            .get("/api/v1/admin/content/users")
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(unknown.status_code(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_move_and_reorder() {
        let server = server().await;
        let mut ids = Vec::new();
        for name in ["A", "B", "C"] {
            let response = server
                .post("/api/v1/admin/content/partners")
                .authorization_bearer(TOKEN)
                .json(&json!({"name": name}))
                .await;
            ids.push(response.json::<Value>()["item"]["id"].as_i64().unwrap());
        }

        let moved = server
            .post(&format!("/api/v1/admin/content/partners/{}/move", ids[2]))
            .authorization_bearer(TOKEN)
            .json(&json!({"direction": "up"}))
            .await;
        let names: Vec<Value> = moved.json::<Value>()["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("A"), json!("C"), json!("B")]);

        let bad = server
            .put("/api/v1/admin/content/partners/order")
            .authorization_bearer(TOKEN)
            .json(&json!({"ids": [ids[0], ids[1]]}))
            .await;
        assert_eq!(bad.status_code(), StatusCode::BAD_REQUEST);

        let reordered = server
            .put("/api/v1/admin/content/partners/order")
            .authorization_bearer(TOKEN)
            .json(&json!({"ids": [ids[1], ids[0], ids[2]]}))
            .await;
        let body = reordered.json::<Value>();
        let positions: Vec<i64> = body["items"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["position"].as_i64().unwrap())
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
        assert_eq!(body["items"][0]["name"], "B");
    }

    #[tokio::test]
    async fn test_popup_activation_is_exclusive() {
        let server = server().await;
        let mut ids = Vec::new();
        for title in ["First", "Second"] {
            let response = server
                .post("/api/v1/admin/content/popups")
                .authorization_bearer(TOKEN)
                .json(&json!({"title": title}))
                .await;
            ids.push(response.json::<Value>()["item"]["id"].as_i64().unwrap());
        }

        assert_eq!(server.get("/api/v1/popup").await.json::<Value>()["popup"], Value::Null);

        for id in &ids {
            server
                .put(&format!("/api/v1/admin/content/popups/{}/flag", id))
                .authorization_bearer(TOKEN)
                .json(&json!({"value": true}))
                .await;
        }

        let popup = server.get("/api/v1/popup").await.json::<Value>();
        assert_eq!(popup["popup"]["title"], "Second");
        let visible = server.get("/api/v1/content/popups").await.json::<Value>();
        assert_eq!(visible["total"], 1);
    }

    #[tokio::test]
    async fn test_csv_import_and_export() {
        let server = server().await;

        let template = server
            .get("/api/v1/admin/content/partners/import/template")
            .authorization_bearer(TOKEN)
            .await;
        assert!(template.text().starts_with("name,logo_url"));

        let dry = server
            .post("/api/v1/admin/content/partners/import")
            .add_query_param("dry_run", true)
            .authorization_bearer(TOKEN)
            .text("name\tcategory\nSkyways\tAirline\n")
            .await;
        assert_eq!(dry.json::<Value>()["inserted"], 0);

        let imported = server
            .post("/api/v1/admin/content/partners/import")
            .authorization_bearer(TOKEN)
            .text("name\tcategory\nSkyways\tAirline\n")
            .await;
        assert_eq!(imported.status_code(), StatusCode::OK);
        assert_eq!(imported.json::<Value>()["inserted"], 1);

        let exported = server
            .get("/api/v1/admin/content/partners/export")
            .authorization_bearer(TOKEN)
            .await;
        assert!(exported.text().contains("Skyways"));
    }

    #[tokio::test]
    async fn test_strict_import_rejection_reports_rows() {
        let server = server().await;
        let response = server
            .post("/api/v1/admin/content/banners/import")
            .authorization_bearer(TOKEN)
            .text("title,image_url\nGood,a.jpg\nBad,\n")
            .await;
        assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.json::<Value>();
        assert_eq!(body["error"]["code"], "IMPORT_REJECTED");
        assert_eq!(body["error"]["details"]["skipped"][0]["line"], 3);
    }

    #[tokio::test]
    async fn test_draft_publish_flow() {
        let server = server().await;

        let saved = server
            .post("/api/v1/admin/drafts/packages")
            .authorization_bearer(TOKEN)
            .json(&json!({"data": {
                "title": "Magical Kerala",
                "destination": "Kerala",
                "publish_to": ["featured"]
            }}))
            .await;
        let draft = saved.json::<Value>()["draft"].clone();
        let id = draft["id"].as_i64().unwrap();
        assert_eq!(draft["version"], 1);

        let stale = server
            .put(&format!("/api/v1/admin/drafts/packages/{}", id))
            .authorization_bearer(TOKEN)
            .json(&json!({"data": {"title": "X"}, "expected_version": 5}))
            .await;
        assert_eq!(stale.status_code(), StatusCode::CONFLICT);

        let published = server
            .post(&format!("/api/v1/admin/drafts/packages/{}/publish", id))
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(published.status_code(), StatusCode::OK);
        assert_eq!(published.json::<Value>()["item"]["slug"], "magical-kerala");

        let listing = server.get("/api/v1/listings/featured").await.json::<Value>();
        assert_eq!(listing["items"][0]["title"], "Magical Kerala");

        let drafts = server
            .get("/api/v1/admin/drafts/packages")
            .authorization_bearer(TOKEN)
            .await;
        assert_eq!(drafts.json::<Value>()["total"], 0);
    }

    #[tokio::test]
    async fn test_health_reports_database() {
        let server = server().await;
        server.get("/api/v1/content/banners").await;
        let health = server.get("/api/v1/health").await.json::<Value>();
        assert_eq!(health["status"], "ok");
        assert_eq!(health["database"], "ok");
        assert!(health["total_requests"].as_u64().unwrap() >= 1);
    }
}
