//! Page endpoints
//!
//! - GET /api/v1/pages/{slug} - A published static page
//!
//! Dashboard (superadmin):
//! - GET|POST /api/v1/admin/pages
//! - GET|PUT|DELETE /api/v1/admin/pages/{id}
//! - PUT /api/v1/admin/pages/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};

use crate::api::common::{AdminContentQuery, StatusRequest};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{CreatePageInput, Page, PagedResult, UpdatePageInput};

pub fn router() -> Router<AppState> {
    Router::new().route("/{slug}", get(get_page))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_pages).post(create_page))
        .route("/{id}", get(admin_get_page).put(update_page).delete(delete_page))
        .route("/{id}/status", put(set_page_status))
}

/// GET /api/v1/pages/{slug}
async fn get_page(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<Page>, ApiError> {
    state
        .page_service
        .get_published_by_slug(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Page not found: {}", slug)))
}

async fn admin_list_pages(
    State(state): State<AppState>,
    Query(query): Query<AdminContentQuery>,
) -> Result<Json<PagedResult<Page>>, ApiError> {
    let filter = query.filter()?;
    Ok(Json(state.page_service.list(&filter, &query.params()).await?))
}

async fn create_page(
    State(state): State<AppState>,
    Json(input): Json<CreatePageInput>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.page_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(page)))
}

async fn admin_get_page(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Page>, ApiError> {
    Ok(Json(state.page_service.get_by_id(id).await?))
}

async fn update_page(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdatePageInput>,
) -> Result<Json<Page>, ApiError> {
    Ok(Json(state.page_service.update(id, input).await?))
}

async fn delete_page(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.page_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_page_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<Page>, ApiError> {
    let status = body.content_status()?;
    Ok(Json(state.page_service.set_status(id, status, body.scheduled_at).await?))
}
