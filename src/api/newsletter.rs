//! Newsletter endpoints
//!
//! - POST /api/v1/newsletter/subscribe
//! - GET|POST /api/v1/newsletter/unsubscribe?email&token
//!
//! Dashboard (superadmin):
//! - GET /api/v1/admin/subscribers (`?status&page&per_page`)
//! - GET /api/v1/admin/subscribers/export (`?status`, CSV)
//! - DELETE /api/v1/admin/subscribers/{id}

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_admin_per_page, default_page};
use crate::api::middleware::{ApiError, AppState};
use crate::models::{ListParams, PagedResult, Subscriber, SubscriberStatus};

#[derive(Debug, Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    /// Where the form was shown, e.g. `footer` or a tool slug
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscribeResponse {
    pub email: String,
    pub status: SubscriberStatus,
}

#[derive(Debug, Deserialize)]
pub struct UnsubscribeQuery {
    pub email: String,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub unsubscribed: bool,
}

#[derive(Debug, Deserialize)]
pub struct SubscriberQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_admin_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
}

impl SubscriberQuery {
    fn status(&self) -> Result<Option<SubscriberStatus>, ApiError> {
        self.status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(str::parse::<SubscriberStatus>)
            .transpose()
            .map_err(|e| ApiError::validation_error(e.to_string()))
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/subscribe", post(subscribe))
        .route("/unsubscribe", get(unsubscribe).post(unsubscribe))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_subscribers))
        .route("/export", get(export_subscribers))
        .route("/{id}", delete(delete_subscriber))
}

/// POST /api/v1/newsletter/subscribe
async fn subscribe(
    State(state): State<AppState>,
    Json(body): Json<SubscribeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscriber = state
        .newsletter_service
        .subscribe(&body.email, body.source.as_deref())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SubscribeResponse {
            email: subscriber.email,
            status: subscriber.status,
        }),
    ))
}

/// GET|POST /api/v1/newsletter/unsubscribe?email&token
async fn unsubscribe(
    State(state): State<AppState>,
    Query(query): Query<UnsubscribeQuery>,
) -> Result<Json<UnsubscribeResponse>, ApiError> {
    state
        .newsletter_service
        .unsubscribe(&query.email, &query.token)
        .await?;
    Ok(Json(UnsubscribeResponse { unsubscribed: true }))
}

/// GET /api/v1/admin/subscribers
async fn list_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberQuery>,
) -> Result<Json<PagedResult<Subscriber>>, ApiError> {
    let status = query.status()?;
    let params = ListParams::new(query.page, query.per_page);
    Ok(Json(state.newsletter_service.list(status, &params).await?))
}

/// GET /api/v1/admin/subscribers/export
async fn export_subscribers(
    State(state): State<AppState>,
    Query(query): Query<SubscriberQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let csv = state.newsletter_service.export_csv(query.status()?).await?;
    let file_name = format!("subscribers-{}.csv", chrono::Utc::now().format("%Y%m%d"));

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    ))
}

/// DELETE /api/v1/admin/subscribers/{id}
async fn delete_subscriber(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.newsletter_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
