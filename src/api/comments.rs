//! Comment moderation endpoints (superadmin)
//!
//! - GET /api/v1/admin/comments (`?status&page&per_page`)
//! - PUT /api/v1/admin/comments/{id}/status
//! - DELETE /api/v1/admin/comments/{id}
//!
//! Reading and posting comments under a post lives in `blog`.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_admin_per_page, default_page};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{Comment, CommentStatus, ListParams, PagedResult};

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_admin_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ModerateRequest {
    pub status: String,
}

/// Dashboard view of a comment, contact details included
#[derive(Debug, Serialize)]
pub struct AdminCommentResponse {
    pub id: i64,
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub content: String,
    pub status: CommentStatus,
    pub ip_address: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for AdminCommentResponse {
    fn from(c: Comment) -> Self {
        Self {
            id: c.id,
            post_id: c.post_id,
            parent_id: c.parent_id,
            author_name: c.author_name,
            author_email: c.author_email,
            content: c.content,
            status: c.status,
            ip_address: c.ip_address,
            created_at: c.created_at,
        }
    }
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_comments))
        .route("/{id}/status", put(moderate_comment))
        .route("/{id}", delete(delete_comment))
}

fn parse_status(raw: &str) -> Result<CommentStatus, ApiError> {
    raw.parse().map_err(ApiError::validation_error)
}

/// GET /api/v1/admin/comments
async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentQuery>,
) -> Result<Json<PagedResult<AdminCommentResponse>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(parse_status)
        .transpose()?;
    let params = ListParams::new(query.page, query.per_page);

    let result = state.comment_service.list(status, &params).await?;
    Ok(Json(result.map(AdminCommentResponse::from)))
}

/// PUT /api/v1/admin/comments/{id}/status
async fn moderate_comment(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<ModerateRequest>,
) -> Result<Json<AdminCommentResponse>, ApiError> {
    let status = parse_status(&body.status)?;
    let comment = state.comment_service.moderate(id, status).await?;
    Ok(Json(comment.into()))
}

/// DELETE /api/v1/admin/comments/{id}
async fn delete_comment(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.comment_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
