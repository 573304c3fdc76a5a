//! Tool section model
//!
//! Editorial blocks (how-to, FAQ, feature copy) rendered beneath a tool's
//! page, ordered by `position`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentStatus, Lifecycle};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSection {
    pub id: i64,
    /// Slug of the tool this section belongs to (`merge-pdf`, ...)
    pub tool_slug: String,
    pub title: String,
    pub content: String,
    pub content_html: String,
    pub position: i32,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ToolSection {
    pub fn new(tool_slug: String, title: String, content: String, content_html: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            tool_slug,
            title,
            content,
            content_html,
            position: 0,
            lifecycle: Lifecycle::draft(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> ContentStatus {
        self.lifecycle.status
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateToolSectionInput {
    pub tool_slug: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub position: Option<i32>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateToolSectionInput {
    pub tool_slug: Option<String>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub position: Option<i32>,
}
