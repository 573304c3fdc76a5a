//! Admin API endpoints
//!
//! - GET /api/v1/admin/dashboard - Content and usage counts
//! - GET /api/v1/admin/stats - Process stats plus tool usage (`?days`)
//! - GET|PUT /api/v1/admin/settings/site
//! - GET|PUT /api/v1/admin/settings/tools
//! - GET|PUT /api/v1/admin/settings/analytics
//!
//! Content, comment and subscriber management routes live next to their
//! public counterparts and are nested under `/admin` by the router.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::services::stats::{DashboardStats, SystemStats, UsageReport};
use crate::store::{AnalyticsSettings, SiteSettings, ToolSettings};
use crate::tools::registry;

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    #[serde(default = "default_days")]
    pub days: u32,
}

fn default_days() -> u32 {
    30
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub system: SystemStats,
    pub usage: UsageReport,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/stats", get(get_stats))
        .route("/settings/site", get(get_site_settings).put(update_site_settings))
        .route("/settings/tools", get(get_tool_settings).put(update_tool_settings))
        .route(
            "/settings/analytics",
            get(get_analytics_settings).put(update_analytics_settings),
        )
}

/// GET /api/v1/admin/dashboard
async fn get_dashboard(State(state): State<AppState>) -> Result<Json<DashboardStats>, ApiError> {
    let stats = state.stats_service.dashboard().await.map_err(ApiError::internal)?;
    Ok(Json(stats))
}

/// GET /api/v1/admin/stats
async fn get_stats(
    State(state): State<AppState>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ApiError> {
    let usage = state
        .stats_service
        .tool_usage(query.days)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(StatsResponse {
        system: state.stats_service.system(),
        usage,
    }))
}

async fn get_site_settings(State(state): State<AppState>) -> Json<SiteSettings> {
    Json(state.stores.site.get().await)
}

async fn update_site_settings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(settings): Json<SiteSettings>,
) -> Result<Json<SiteSettings>, ApiError> {
    settings.validate().map_err(ApiError::validation_error)?;
    let saved = state.stores.site.set(settings).await.map_err(ApiError::internal)?;
    tracing::info!(user_id = user.id, "Site settings updated");
    Ok(Json(saved))
}

async fn get_tool_settings(State(state): State<AppState>) -> Json<ToolSettings> {
    Json(state.stores.tools.get().await)
}

async fn update_tool_settings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(settings): Json<ToolSettings>,
) -> Result<Json<ToolSettings>, ApiError> {
    settings
        .validate(registry::is_known)
        .map_err(ApiError::validation_error)?;
    let saved = state.stores.tools.set(settings).await.map_err(ApiError::internal)?;
    tracing::info!(user_id = user.id, disabled = saved.disabled.len(), "Tool settings updated");
    Ok(Json(saved))
}

async fn get_analytics_settings(State(state): State<AppState>) -> Json<AnalyticsSettings> {
    Json(state.stores.analytics.get().await)
}

async fn update_analytics_settings(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(settings): Json<AnalyticsSettings>,
) -> Result<Json<AnalyticsSettings>, ApiError> {
    settings.validate().map_err(ApiError::validation_error)?;
    let saved = state
        .stores
        .analytics
        .set(settings)
        .await
        .map_err(ApiError::internal)?;
    tracing::info!(user_id = user.id, "Analytics settings updated");
    Ok(Json(saved))
}
