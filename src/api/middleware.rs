//! API middleware and shared state
//!
//! - Application state wiring
//! - The flat JSON error type and its status mapping
//! - Session authentication (Bearer token or `session` cookie)
//! - Superadmin authorization
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::create_cache;
use crate::config::Config;
use crate::db::repositories::{
    SqlxBlogPostRepository, SqlxCommentRepository, SqlxPageRepository, SqlxSessionRepository,
    SqlxSubscriberRepository, SqlxToolSectionRepository, SqlxToolUsageRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    BlogService, CommentService, ContentError, LoginRateLimiter, MarkdownRenderer, NewsletterError,
    NewsletterService, PageService, RequestStats, StatsService, ToolSectionService, UserService,
    UserServiceError,
};
use crate::store::Stores;
use crate::tools::{ToolError, Toolbox};

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub user_service: Arc<UserService>,
    pub blog_service: Arc<BlogService>,
    pub page_service: Arc<PageService>,
    pub section_service: Arc<ToolSectionService>,
    pub comment_service: Arc<CommentService>,
    pub newsletter_service: Arc<NewsletterService>,
    pub stats_service: Arc<StatsService>,
    pub stores: Stores,
    pub toolbox: Arc<Toolbox>,
    pub rate_limiter: Arc<LoginRateLimiter>,
    pub request_stats: Arc<RequestStats>,
}

impl AppState {
    /// Wire repositories, services, stores and tools over a migrated pool
    pub async fn new(config: Config, pool: DynDatabasePool) -> anyhow::Result<Self> {
        let cache = create_cache(&config.cache);
        let stores = Stores::open(&config.storage).await?;

        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let post_repo = SqlxBlogPostRepository::boxed(pool.clone());
        let page_repo = SqlxPageRepository::boxed(pool.clone());
        let section_repo = SqlxToolSectionRepository::boxed(pool.clone());
        let comment_repo = SqlxCommentRepository::boxed(pool.clone());
        let subscriber_repo = SqlxSubscriberRepository::boxed(pool.clone());
        let usage_repo = SqlxToolUsageRepository::boxed(pool.clone());

        let rate_limiter = Arc::new(LoginRateLimiter::new());
        let request_stats = Arc::new(RequestStats::new());

        let user_service = Arc::new(UserService::new(user_repo, session_repo, rate_limiter.clone()));
        user_service.ensure_admin(&config.admin).await?;

        let markdown = MarkdownRenderer::new();
        let blog_service = Arc::new(BlogService::new(post_repo.clone(), cache.clone(), markdown.clone()));
        let page_service = Arc::new(PageService::new(page_repo.clone(), cache.clone(), markdown.clone()));
        let section_service = Arc::new(ToolSectionService::new(section_repo.clone(), cache, markdown));
        let comment_service = Arc::new(CommentService::new(
            comment_repo.clone(),
            post_repo.clone(),
            stores.site.clone(),
        ));
        let newsletter_service = Arc::new(NewsletterService::new(
            subscriber_repo.clone(),
            config.newsletter.secret.clone(),
        ));
        let stats_service = Arc::new(StatsService::new(
            post_repo,
            page_repo,
            section_repo,
            comment_repo,
            subscriber_repo,
            usage_repo,
            request_stats.clone(),
        ));
        let toolbox = Arc::new(Toolbox::new(&config.tools, &config.ai)?);

        Ok(Self {
            pool,
            config: Arc::new(config),
            user_service,
            blog_service,
            page_service,
            section_service,
            comment_service,
            newsletter_service,
            stats_service,
            stores,
            toolbox,
            rate_limiter,
            request_stats,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// Error body: `{ "error": "...", "code": "VALIDATION_ERROR" }`
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            details: None,
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            details: Some(details),
            ..Self::new(code, message)
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new("BAD_REQUEST", message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause, answer with a generic message
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {:#}", err);
        Self::internal_error("Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.code.as_str() {
            "VALIDATION_ERROR" | "BAD_REQUEST" => StatusCode::BAD_REQUEST,
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "CONFLICT" => StatusCode::CONFLICT,
            "PAYLOAD_TOO_LARGE" => StatusCode::PAYLOAD_TOO_LARGE,
            "RATE_LIMIT" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<ContentError> for ApiError {
    fn from(err: ContentError) -> Self {
        match err {
            ContentError::NotFound(_) => Self::not_found(err.to_string()),
            ContentError::Validation(msg) => Self::validation_error(msg),
            ContentError::DuplicateSlug(_) => Self::conflict(err.to_string()),
            ContentError::Disabled(msg) => Self::forbidden(msg),
            ContentError::Transition(e) => Self::validation_error(e.to_string()),
            ContentError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => Self::unauthorized(msg),
            UserServiceError::ValidationError(msg) => Self::validation_error(msg),
            UserServiceError::UserExists(_) => Self::conflict(err.to_string()),
            UserServiceError::RateLimited { retry_after } => Self::with_details(
                "RATE_LIMIT",
                err.to_string(),
                serde_json::json!({ "retry_after": retry_after }),
            ),
            UserServiceError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<NewsletterError> for ApiError {
    fn from(err: NewsletterError) -> Self {
        match err {
            NewsletterError::InvalidEmail => Self::validation_error(err.to_string()),
            NewsletterError::InvalidToken => Self::bad_request(err.to_string()),
            NewsletterError::NotFound => Self::not_found(err.to_string()),
            NewsletterError::InternalError(e) => Self::internal(e),
        }
    }
}

impl From<ToolError> for ApiError {
    fn from(err: ToolError) -> Self {
        let message = err.to_string();
        match err {
            ToolError::InvalidInput(_) => Self::validation_error(message),
            ToolError::UnsupportedFormat(_) => Self::bad_request(message),
            ToolError::WrongPassword => {
                Self::with_details("BAD_REQUEST", message, serde_json::json!({ "reason": "wrong_password" }))
            }
            ToolError::TooLarge { size, limit } => Self::with_details(
                "PAYLOAD_TOO_LARGE",
                message,
                serde_json::json!({ "size": size, "limit": limit }),
            ),
            ToolError::Processing(_) => Self::new("PROCESSING_ERROR", message),
            ToolError::External(_) => Self::new("EXTERNAL_ERROR", message),
            ToolError::Timeout { .. } => Self::new("TIMEOUT", message),
        }
    }
}

/// Extract session token from request
pub(crate) fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    headers
        .get(header::COOKIE)
        .and_then(|h| h.to_str().ok())
        .and_then(|cookies| {
            cookies
                .split(';')
                .map(str::trim)
                .find_map(|c| c.strip_prefix("session="))
                .filter(|t| !t.is_empty())
                .map(str::to_string)
        })
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Superadmin authorization middleware; runs after `require_auth`
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_superadmin() {
        return Err(ApiError::forbidden("Superadmin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
///
/// Records request count, 5xx count and response time.
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;

    let duration_us = start.elapsed().as_micros() as u64;
    state
        .request_stats
        .record(duration_us, response.status().is_server_error());

    response
}


#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(20))]

        #[test]
        fn unknown_codes_are_server_errors(code in "[A-Z_]{3,20}") {
            let known = [
                "VALIDATION_ERROR", "BAD_REQUEST", "UNAUTHORIZED", "FORBIDDEN",
                "NOT_FOUND", "CONFLICT", "PAYLOAD_TOO_LARGE", "RATE_LIMIT",
            ];
            prop_assume!(!known.contains(&code.as_str()));
            prop_assert_eq!(ApiError::new(code, "x").status(), StatusCode::INTERNAL_SERVER_ERROR);
        }

        #[test]
        fn bearer_token_roundtrip(token in "[A-Za-z0-9_-]{1,64}") {
            let mut h = axum::http::HeaderMap::new();
            h.insert(header::AUTHORIZATION, format!("Bearer {}", token).parse().unwrap());
            prop_assert_eq!(extract_session_token(&h), Some(token));
        }
    }
}
