//! Tool API endpoints
//!
//! - GET /api/v1/tools - Registry with availability flags
//! - POST /api/v1/tools/{slug} - Run a tool
//!
//! A run accepts either JSON (`{ "files": [data URIs], "options": {..} }`)
//! or multipart form data with `file`/`files` parts and an optional
//! `options` part holding JSON.

use axum::{
    extract::{DefaultBodyLimit, FromRequest, Multipart, Path, Request, State},
    http::header,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;

use crate::api::middleware::{ApiError, AppState};
use crate::tools::registry::{self, Requirement};
use crate::tools::{ToolError, ToolInfo, ToolInput, ToolRequest, ToolResponse};

#[derive(Debug, Serialize)]
pub struct ToolListItem {
    #[serde(flatten)]
    pub info: ToolInfo,
    pub enabled: bool,
    pub featured: bool,
    /// Effective upload limit per file in bytes
    pub max_file_size: u64,
}

#[derive(Debug, Serialize)]
pub struct ToolListResponse {
    pub tools: Vec<ToolListItem>,
    pub ai_available: bool,
    pub max_files: usize,
}

pub fn router(state: &AppState) -> Router<AppState> {
    let body_limit = state
        .config
        .upload
        .max_body_bytes(state.config.tools.max_files);

    Router::new()
        .route("/", get(list_tools))
        .route("/{slug}", post(run_tool))
        .layer(DefaultBodyLimit::max(body_limit))
}

/// GET /api/v1/tools
async fn list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    let settings = state.stores.tools.get().await;
    let ai_available = state.toolbox.ai_enabled();
    let default_limit = state.config.upload.max_file_size;

    let tools = registry::all()
        .iter()
        .map(|info| ToolListItem {
            enabled: !settings.is_disabled(info.slug)
                && (info.requires != Some(Requirement::Ai) || ai_available),
            featured: settings.featured.iter().any(|s| s == info.slug),
            max_file_size: settings.max_size_for(info.slug, default_limit),
            info: info.clone(),
        })
        .collect();

    Json(ToolListResponse {
        tools,
        ai_available,
        max_files: state.toolbox.max_files(),
    })
}

/// POST /api/v1/tools/{slug}
async fn run_tool(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    request: Request,
) -> Result<Json<ToolResponse>, ApiError> {
    let tool = registry::find(&slug).ok_or_else(|| ApiError::not_found(format!("Unknown tool: {}", slug)))?;

    let settings = state.stores.tools.get().await;
    if settings.is_disabled(tool.slug) {
        return Err(ApiError::forbidden(format!("{} is currently disabled", tool.name)));
    }

    let (inputs, options) = read_inputs(&state, request).await?;

    let limit = settings.max_size_for(tool.slug, state.config.upload.max_file_size);
    for input in &inputs {
        let size = input.bytes.len() as u64;
        if size > limit {
            return Err(ToolError::TooLarge { size, limit }.into());
        }
        if !state.config.upload.is_type_allowed(&input.mime) {
            return Err(ToolError::UnsupportedFormat(format!("{} uploads are not allowed", input.mime)).into());
        }
    }

    let response = state.toolbox.run(tool.slug, inputs, &options).await.map_err(|e| {
        if e.is_client_error() {
            tracing::debug!(tool = tool.slug, error = %e, "Tool rejected input");
        } else {
            tracing::warn!(tool = tool.slug, error = %e, "Tool run failed");
        }
        ApiError::from(e)
    })?;

    if let Err(e) = state.stats_service.record_tool_use(tool.slug).await {
        tracing::warn!(tool = tool.slug, "Failed to record tool usage: {:#}", e);
    }

    Ok(Json(response))
}

async fn read_inputs(state: &AppState, request: Request) -> Result<(Vec<ToolInput>, Value), ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    if is_multipart {
        let multipart = Multipart::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?;
        read_multipart(multipart).await
    } else {
        let Json(body) = Json::<ToolRequest>::from_request(request, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e.body_text())))?;
        let inputs = body
            .files
            .iter()
            .enumerate()
            .map(|(i, raw)| ToolInput::from_data_uri(raw, i))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((inputs, body.options))
    }
}

async fn read_multipart(mut multipart: Multipart) -> Result<(Vec<ToolInput>, Value), ApiError> {
    let mut inputs = Vec::new();
    let mut options = Value::Null;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" | "files" | "files[]" => {
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().unwrap_or("").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?;
                let index = inputs.len();
                inputs.push(ToolInput::new(file_name, &content_type, data.to_vec(), index));
            }
            "options" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read options: {}", e)))?;
                if !text.trim().is_empty() {
                    options = serde_json::from_str(&text)
                        .map_err(|e| ApiError::validation_error(format!("Invalid options: {}", e)))?;
                }
            }
            _ => {}
        }
    }

    Ok((inputs, options))
}
