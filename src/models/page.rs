//! Page model for standalone CMS pages (about, privacy, terms, ...)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentStatus, Lifecycle};

/// Custom page model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Page {
    pub fn new(slug: String, title: String, content: String, content_html: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title,
            content,
            content_html,
            meta_title: None,
            meta_description: None,
            lifecycle: Lifecycle::draft(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> ContentStatus {
        self.lifecycle.status
    }
}

/// Input for creating a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatePageInput {
    #[serde(default)]
    pub slug: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

/// Input for updating a page
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdatePageInput {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}
