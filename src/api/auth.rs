//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login - Superadmin login
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user
//! - PUT /api/v1/auth/password - Change password

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

use crate::api::common::{client_ip, session_cookie, CLEAR_SESSION_COOKIE};
use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::models::{Session, User};
use crate::services::LoginInput;

/// Request body for login; `username` also accepts an email
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: String,
    pub display_name: String,
    pub last_login_at: Option<String>,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            display_name: user.display().to_string(),
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            last_login_at: user.last_login_at.map(|t| t.to_rfc3339()),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub token: String,
    pub expires_at: String,
}

impl AuthResponse {
    fn new(session: &Session, user: User) -> Self {
        Self {
            user: user.into(),
            token: session.id.clone(),
            expires_at: session.expires_at.to_rfc3339(),
        }
    }
}

/// Routes that need no session
pub fn public_router() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Routes behind `require_auth`
pub fn protected_router() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let ip: Option<IpAddr> = client_ip(&headers).and_then(|s| s.parse().ok());

    let (session, user) = state
        .user_service
        .login(LoginInput::new(body.username, body.password), ip)
        .await?;

    tracing::info!(user_id = user.id, "User logged in");

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.id))],
        Json(AuthResponse::new(&session, user)),
    ))
}

/// POST /api/v1/auth/logout
async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<impl IntoResponse, ApiError> {
    if let Some(token) = extract_session_token(&headers) {
        state.user_service.logout(&token).await?;
    }

    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, CLEAR_SESSION_COOKIE.to_string())],
    ))
}

/// GET /api/v1/auth/me
async fn me(AuthenticatedUser(user): AuthenticatedUser) -> Json<UserResponse> {
    Json(user.into())
}

/// PUT /api/v1/auth/password
///
/// All sessions of the user are revoked; the response carries a fresh one.
async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .user_service
        .change_password(user.id, &body.current_password, &body.new_password)
        .await?;

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session.id))],
        Json(AuthResponse::new(&session, user)),
    ))
}
