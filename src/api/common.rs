//! Common API utilities and shared types
//!
//! This module contains shared utilities used across multiple API endpoints.

use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::middleware::ApiError;
use crate::db::repositories::ContentFilter;
use crate::models::{ContentStatus, ListParams, SESSION_TTL_DAYS};

// ============================================================================
// Pagination
// ============================================================================

pub fn default_page() -> u32 {
    1
}

pub fn default_per_page() -> u32 {
    10
}

/// `?page&per_page`
#[derive(Debug, Deserialize)]
pub struct PaginationQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl PaginationQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }
}

/// Dashboard listing: `?page&per_page&status&tag&search`
#[derive(Debug, Deserialize)]
pub struct AdminContentQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_admin_per_page")]
    pub per_page: u32,
    pub status: Option<String>,
    pub tag: Option<String>,
    pub search: Option<String>,
}

pub fn default_admin_per_page() -> u32 {
    20
}

impl AdminContentQuery {
    pub fn params(&self) -> ListParams {
        ListParams::new(self.page, self.per_page)
    }

    pub fn filter(&self) -> Result<ContentFilter, ApiError> {
        let status = self
            .status
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<ContentStatus>())
            .transpose()
            .map_err(|e| ApiError::validation_error(e.to_string()))?;
        Ok(ContentFilter {
            status,
            tag: self.tag.clone().filter(|t| !t.trim().is_empty()),
            search: self.search.clone().filter(|s| !s.trim().is_empty()),
        })
    }
}

// ============================================================================
// Status changes
// ============================================================================

/// Body of `PUT .../{id}/status`
#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl StatusRequest {
    pub fn content_status(&self) -> Result<ContentStatus, ApiError> {
        self.status
            .parse()
            .map_err(|e: anyhow::Error| ApiError::validation_error(e.to_string()))
    }
}

// ============================================================================
// Request metadata
// ============================================================================

/// Client address from proxy headers: first `X-Forwarded-For` entry, then
/// `X-Real-IP`
pub fn client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(first) = forwarded.split(',').map(str::trim).find(|s| !s.is_empty()) {
            return Some(first.to_string());
        }
    }
    headers
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|h| h.to_str().ok())
        .map(|s| s.chars().take(500).collect())
}

// ============================================================================
// Session cookie
// ============================================================================

pub fn session_cookie(session_id: &str) -> String {
    format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session_id,
        SESSION_TTL_DAYS * 24 * 3600
    )
}

pub const CLEAR_SESSION_COOKIE: &str = "session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0";
