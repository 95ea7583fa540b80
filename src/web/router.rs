//! Router configuration for Web API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, services::ServeDir, trace::TraceLayer};

use super::handlers::*;
use super::middleware::{
    api_rate_limit, create_cors_layer, jwt_auth, login_rate_limit, security_headers, JwtState,
    RateLimitState,
};
use crate::config::{Config, StorageBackend};

/// Create the main API router.
pub fn create_router(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limits: Arc<RateLimitState>,
    config: &Config,
) -> Router {
    // Login and registration share the stricter limiter.
    let login_limits = rate_limits.clone();
    let auth_limited_routes = Router::new()
        .route("/login", post(login))
        .route("/register", post(register))
        .route_layer(middleware::from_fn(move |req, next| {
            login_rate_limit(login_limits.clone(), req, next)
        }));

    let auth_routes = Router::new()
        .merge(auth_limited_routes)
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me));

    // Static segments take precedence over `/:id`.
    let file_routes = Router::new()
        .route("/", get(list_files))
        .route("/upload", post(upload_file))
        .route("/trash/all", get(list_trash))
        .route("/trash/empty", delete(empty_trash))
        .route("/starred/all", get(list_starred_files))
        .route("/recent/all", get(list_recent))
        .route("/search/query", get(search_files))
        .route("/shared/me", get(list_shared_files))
        .route("/usage/me", get(storage_usage))
        .route("/public/:id", get(get_public_file))
        .route("/public/:id/download", get(download_public_file))
        .route("/:id", get(get_file).delete(trash_file))
        .route("/:id/download", get(download_file))
        .route("/:id/rename", put(rename_file))
        .route("/:id/move", put(move_file))
        .route("/:id/trash", put(trash_file))
        .route("/:id/restore", put(restore_file))
        .route("/:id/permanent", delete(purge_file))
        .route("/:id/star", put(star_file))
        .route("/:id/share", post(share_file))
        .route("/:id/share/:user_id", delete(unshare_file))
        .route("/:id/public", post(publish_file).delete(unpublish_file))
        .layer(DefaultBodyLimit::max(max_upload_bytes(config)));

    let folder_routes = Router::new()
        .route("/", get(list_folders).post(create_folder))
        .route("/root/contents", get(root_contents))
        .route("/starred/all", get(list_starred_folders))
        .route("/shared/me", get(list_shared_folders))
        .route("/:id", get(get_folder).delete(delete_folder))
        .route("/:id/contents", get(folder_contents))
        .route("/:id/breadcrumbs", get(folder_breadcrumbs))
        .route("/:id/rename", put(rename_folder))
        .route("/:id/move", put(move_folder))
        .route("/:id/star", put(star_folder))
        .route("/:id/share", post(share_folder))
        .route("/:id/share/:user_id", delete(unshare_folder))
        .route("/:id/public", post(publish_folder).delete(unpublish_folder));

    let api_limits = rate_limits;
    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/files", file_routes)
        .nest("/folders", folder_routes)
        .layer(middleware::from_fn(move |req, next| {
            api_rate_limit(api_limits.clone(), req, next)
        }));

    // Clone jwt_state for the middleware closure
    let jwt_state_for_middleware = jwt_state.clone();

    Router::new()
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(&config.server.cors_origins))
                .layer(middleware::from_fn(security_headers))
                .layer(middleware::from_fn(move |req, next| {
                    let state = jwt_state_for_middleware.clone();
                    jwt_auth(state, req, next)
                })),
        )
        .with_state(app_state)
}

fn max_upload_bytes(config: &Config) -> usize {
    (config.drive.max_upload_size_mb as usize).saturating_mul(1024 * 1024)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}

/// Serve locally stored objects under `/objects` when the local backend is active.
pub fn create_objects_router(config: &Config) -> Option<Router> {
    if config.storage.backend != StorageBackend::Local {
        return None;
    }
    Some(Router::new().nest_service("/objects", ServeDir::new(&config.storage.local_path)))
}

/// Assemble the complete application: API, health check and object serving.
pub fn create_app(
    app_state: Arc<AppState>,
    jwt_state: Arc<JwtState>,
    rate_limits: Arc<RateLimitState>,
    config: &Config,
) -> Router {
    let mut router =
        create_router(app_state, jwt_state, rate_limits, config).merge(create_health_router());

    if let Some(objects) = create_objects_router(config) {
        router = router.merge(objects);
    }

    router.layer(CompressionLayer::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_health_router() {
        let response = create_health_router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_objects_router_only_for_local_backend() {
        let mut config = Config::default();
        assert!(create_objects_router(&config).is_some());

        config.storage.backend = StorageBackend::Cloudinary;
        assert!(create_objects_router(&config).is_none());
    }

    #[test]
    fn test_max_upload_bytes() {
        let mut config = Config::default();
        config.drive.max_upload_size_mb = 2;
        assert_eq!(max_upload_bytes(&config), 2 * 1024 * 1024);
    }
}
