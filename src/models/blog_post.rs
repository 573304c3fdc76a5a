//! Blog post model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::content::{ContentStatus, Lifecycle};

/// Blog post entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlogPost {
    pub id: i64,
    pub slug: String,
    pub title: String,
    /// Short summary for listings; derived from content when absent
    pub excerpt: Option<String>,
    /// Markdown source
    pub content: String,
    /// Rendered HTML
    pub content_html: String,
    pub cover_image: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
    #[serde(default)]
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BlogPost {
    pub fn new(slug: String, title: String, content: String, content_html: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            slug,
            title,
            excerpt: None,
            content,
            content_html,
            cover_image: None,
            author: None,
            tags: Vec::new(),
            meta_title: None,
            meta_description: None,
            lifecycle: Lifecycle::draft(),
            view_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> ContentStatus {
        self.lifecycle.status
    }

    pub fn is_published(&self) -> bool {
        self.lifecycle.is_published()
    }
}

/// Input for creating a blog post
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateBlogPostInput {
    pub title: String,
    /// Generated from the title when empty
    #[serde(default)]
    pub slug: Option<String>,
    pub content: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub meta_title: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub status: Option<ContentStatus>,
    #[serde(default)]
    pub scheduled_at: Option<DateTime<Utc>>,
}

impl CreateBlogPostInput {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_status(mut self, status: ContentStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_schedule(mut self, at: DateTime<Utc>) -> Self {
        self.status = Some(ContentStatus::Scheduled);
        self.scheduled_at = Some(at);
        self
    }
}

/// Input for updating a blog post. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogPostInput {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub author: Option<String>,
    pub tags: Option<Vec<String>>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
}

impl UpdateBlogPostInput {
    pub fn has_changes(&self) -> bool {
        self.title.is_some()
            || self.slug.is_some()
            || self.content.is_some()
            || self.excerpt.is_some()
            || self.cover_image.is_some()
            || self.author.is_some()
            || self.tags.is_some()
            || self.meta_title.is_some()
            || self.meta_description.is_some()
    }
}

/// Normalise a tag list: trimmed, lower-cased, empty and duplicate entries dropped
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_post_is_draft() {
        let post = BlogPost::new("a".into(), "A".into(), "x".into(), "<p>x</p>".into());
        assert_eq!(post.status(), ContentStatus::Draft);
        assert!(!post.is_published());
        assert_eq!(post.view_count, 0);
    }

    #[test]
    fn test_serialized_post_flattens_lifecycle() {
        let post = BlogPost::new("a".into(), "A".into(), "x".into(), "<p>x</p>".into());
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["status"], "draft");
        assert!(json["scheduled_at"].is_null());
    }

    #[test]
    fn test_normalize_tags() {
        let tags = vec![
            " PDF ".to_string(),
            "pdf".to_string(),
            "".to_string(),
            "OCR".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["pdf", "ocr"]);
    }

    #[test]
    fn test_update_has_changes() {
        assert!(!UpdateBlogPostInput::default().has_changes());
        let update = UpdateBlogPostInput {
            tags: Some(vec![]),
            ..Default::default()
        };
        assert!(update.has_changes());
    }
}
