//! Tool section endpoints
//!
//! Tool sections are the CMS blocks (how-to, FAQ, ...) shown under a tool.
//!
//! - GET /api/v1/tool-sections/{tool_slug} - Published sections for a tool
//!
//! Dashboard (superadmin):
//! - GET|POST /api/v1/admin/tool-sections (`?tool` narrows to one tool)
//! - GET|PUT|DELETE /api/v1/admin/tool-sections/{id}
//! - PUT /api/v1/admin/tool-sections/{id}/status

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::common::{default_admin_per_page, default_page, StatusRequest};
use crate::api::middleware::{ApiError, AppState};
use crate::db::repositories::ContentFilter;
use crate::models::{
    ContentStatus, CreateToolSectionInput, ListParams, PagedResult, ToolSection, UpdateToolSectionInput,
};
use crate::tools::registry;

#[derive(Debug, Serialize)]
pub struct ToolSectionsResponse {
    pub tool_slug: String,
    pub sections: Vec<ToolSection>,
}

#[derive(Debug, Deserialize)]
pub struct AdminSectionQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_admin_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
    pub tool: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/{tool_slug}", get(list_sections))
}

pub fn admin_router() -> Router<AppState> {
    Router::new()
        .route("/", get(admin_list_sections).post(create_section))
        .route("/{id}", get(admin_get_section).put(update_section).delete(delete_section))
        .route("/{id}/status", put(set_section_status))
}

/// GET /api/v1/tool-sections/{tool_slug}
async fn list_sections(
    State(state): State<AppState>,
    Path(tool_slug): Path<String>,
) -> Result<Json<ToolSectionsResponse>, ApiError> {
    if !registry::is_known(&tool_slug) {
        return Err(ApiError::not_found(format!("Unknown tool: {}", tool_slug)));
    }
    let sections = state.section_service.list_published_for_tool(&tool_slug).await?;
    Ok(Json(ToolSectionsResponse { tool_slug, sections }))
}

/// GET /api/v1/admin/tool-sections
///
/// With `?tool` the whole ordered list of that tool is returned on one page.
async fn admin_list_sections(
    State(state): State<AppState>,
    Query(query): Query<AdminSectionQuery>,
) -> Result<Json<PagedResult<ToolSection>>, ApiError> {
    let params = ListParams::new(query.page, query.per_page);

    if let Some(tool) = query.tool.as_deref().filter(|t| !t.is_empty()) {
        let sections = state.section_service.list_for_tool(tool).await?;
        let total = sections.len() as i64;
        let params = ListParams::new(1, sections.len().max(1) as u32);
        return Ok(Json(PagedResult::new(sections, total, &params)));
    }

    let status = query
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<ContentStatus>)
        .transpose()
        .map_err(|e| ApiError::validation_error(e.to_string()))?;
    let filter = ContentFilter {
        status,
        ..Default::default()
    };
    Ok(Json(state.section_service.list(&filter, &params).await?))
}

async fn create_section(
    State(state): State<AppState>,
    Json(input): Json<CreateToolSectionInput>,
) -> Result<impl IntoResponse, ApiError> {
    let section = state.section_service.create(input).await?;
    Ok((StatusCode::CREATED, Json(section)))
}

async fn admin_get_section(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ToolSection>, ApiError> {
    Ok(Json(state.section_service.get_by_id(id).await?))
}

async fn update_section(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateToolSectionInput>,
) -> Result<Json<ToolSection>, ApiError> {
    Ok(Json(state.section_service.update(id, input).await?))
}

async fn delete_section(State(state): State<AppState>, Path(id): Path<i64>) -> Result<StatusCode, ApiError> {
    state.section_service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn set_section_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> Result<Json<ToolSection>, ApiError> {
    let status = body.content_status()?;
    Ok(Json(state.section_service.set_status(id, status, body.scheduled_at).await?))
}
