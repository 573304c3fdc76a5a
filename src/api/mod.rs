//! API layer - HTTP handlers and routing
//!
//! Everything is served under `/api/v1`:
//! - Tool endpoints (registry and runs)
//! - Public blog, page, tool section, comment and newsletter endpoints
//! - Public site information
//! - Auth endpoints
//! - Superadmin dashboard endpoints under `/admin`

pub mod admin;
pub mod auth;
pub mod blog;
pub mod comments;
pub mod common;
pub mod middleware;
pub mod newsletter;
pub mod pages;
pub mod site;
pub mod tool_sections;
pub mod tools;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode},
    middleware as axum_middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tower_http::{compression::CompressionLayer, cors::{Any, CorsLayer}, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub database: &'static str,
}

/// GET /api/v1/health
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.pool.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(HealthResponse {
                status: "ok",
                version: env!("CARGO_PKG_VERSION"),
                database: "ok",
            }),
        ),
        Err(e) => {
            tracing::error!("Health check database ping failed: {:#}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "degraded",
                    version: env!("CARGO_PKG_VERSION"),
                    database: "unavailable",
                }),
            )
        }
    }
}

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Superadmin routes
    let admin_routes = Router::new()
        .nest("/admin", admin::router())
        .nest("/admin/posts", blog::admin_router())
        .nest("/admin/pages", pages::admin_router())
        .nest("/admin/tool-sections", tool_sections::admin_router())
        .nest("/admin/comments", comments::admin_router())
        .nest("/admin/subscribers", newsletter::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Any signed-in user
    let protected_routes = Router::new()
        .nest("/auth", auth::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    Router::new()
        .route("/health", get(health))
        .nest("/tools", tools::router(&state))
        .nest("/blog", blog::router())
        .nest("/pages", pages::router())
        .nest("/tool-sections", tool_sections::router())
        .nest("/newsletter", newsletter::router())
        .nest("/site", site::router())
        .nest("/auth", auth::public_router())
        .merge(admin_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .fallback(not_found);

    // CORS with credentials so the dashboard can send its session cookie
    let origin = state.config.server.cors_origin.trim();
    match origin.parse::<HeaderValue>() {
        // Browsers refuse credentials with a wildcard origin
        Ok(_) if origin == "*" => {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
            router = router.layer(cors);
        }
        Ok(origin) => {
            let cors = CorsLayer::new()
                .allow_origin(origin)
                .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
                .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
                .allow_credentials(true);
            router = router.layer(cors);
        }
        Err(_) => tracing::warn!(
            origin = %state.config.server.cors_origin,
            "Invalid CORS origin, cross-origin requests will be refused"
        ),
    }

    router
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
