//! Public blog endpoints
//!
//! - GET /api/v1/blog - Published posts (`?page&per_page&tag`)
//! - GET /api/v1/blog/{slug} - One post; counts a view
//! - GET /api/v1/blog/{slug}/comments - Approved comments as threads
//! - POST /api/v1/blog/{slug}/comments - Submit a comment
//!
//! Dashboard (superadmin):
//! - GET|POST /api/v1/admin/posts
//! - GET|PUT|DELETE /api/v1/admin/posts/{id}
//! - PUT /api/v1/admin/posts/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{client_ip, default_page, default_per_page, user_agent, AdminContentQuery, StatusRequest};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{
    BlogPost, CommentStatus, CommentThread, CreateBlogPostInput, CreateCommentInput, ListParams, PagedResult,
    UpdateBlogPostInput,
};

#[derive(Debug, Deserialize)]
pub struct BlogListQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub parent_id: Option<i64>,
    pub author_name: String,
    pub author_email: String,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct CommentListResponse {
    pub comments: Vec<CommentThread>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct CommentCreatedResponse {
    pub id: i64,
    pub status: CommentStatus,
    /// False while the comment waits for moderation
    pub visible: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_posts))
        .route("/{slug}", get(get_post))
        .route("/{slug}/comments", get(list_comments).post(create_comment))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_posts).post(create_post))
        .route("/{id}", get(admin_get_post).put(update_post).delete(delete_post))
        .route("/{id}/status", put(set_post_status))
}

/// GET /api/v1/blog
async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<BlogListQuery>,
) -> Result<Json<PagedResult<BlogPost>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);
    let result = state
        .blog_service
        .list_published(query.tag.as_deref(), &params)
        .await?;
    Ok(Json(result))
}

async fn published_post(state: &AppState, slug: &str) -> Result<BlogPost, ApiError> {
    state
        .blog_service
        .get_published_by_slug(slug)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Blog post not found: {}", slug)))
}

/// GET /api/v1/blog/{slug}
async fn get_post(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Json<BlogPost>, ApiError> {
    // The cached copy carries a stale counter
    let mut post = published_post(&state, &slug).await?;
    if let Some(views) = state.blog_service.record_view(post.id).await {
        post.view_count = views;
    }
    Ok(Json(post))
}

/// GET /api/v1/blog/{slug}/comments
async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CommentListResponse>, ApiError> {
    let post = published_post(&state, &slug).await?;
    let comments = state.comment_service.list_for_post(post.id).await?;

    fn count(threads: &[CommentThread]) -> usize {
        threads.iter().map(|t| 1 + count(&t.replies)).sum()
    }

    Ok(Json(CommentListResponse {
        total: count(&comments),
        comments,
    }))
}

/// POST /api/v1/blog/{slug}/comments
async fn create_comment(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    headers: HeaderMap,
    Json(body): Json<CommentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let post = published_post(&state, &slug).await?;

    let input = CreateCommentInput {
        post_id: post.id,
        parent_id: body.parent_id,
        author_name: body.author_name,
        author_email: body.author_email,
        content: body.content,
    };
    let comment = state
        .comment_service
        .create(input, client_ip(&headers), user_agent(&headers))
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommentCreatedResponse {
            id: comment.id,
            visible: comment.status == CommentStatus::Approved,
            status: comment.status,
        }),
    ))
}

/// GET /api/v1/admin/posts
async fn admin_list_posts(
    State(state): State<AppState>,
    Query(query): Query<AdminContentQuery>,
) -> Result<Json<PagedResult<BlogPost>>, ApiError> {
    let filter = query.filter()?;
    let result = state.blog_service.list(&filter, &query.params()).await?;
    Ok(Json(result))
}

/// POST /api/v1/admin/posts
async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<CreateBlogPostInput>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.blog_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

/// GET /api/v1/admin/posts/{id}
async fn admin_get_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog_service.get_by_id(id).await?))
}

/// PUT /api/v1/admin/posts/{id}
async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateBlogPostInput>,
) -> Result<Json<BlogPost>, ApiError> {
    Ok(Json(state.blog_service.update(id, input).await?))
}

/// DELETE /api/v1/admin/posts/{id}
async fn delete_post(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.blog_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/v1/admin/posts/{id}/status
async fn set_post_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<BlogPost>, ApiError> {
    let status = body.content_status()?;
    Ok(Json(state.blog_service.set_status(id, status, body.scheduled_at).await?))
}
