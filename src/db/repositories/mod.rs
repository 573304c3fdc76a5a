//! Database repositories
//!
//! Repository pattern implementations for database access.
//! Each repository handles the operations for a specific entity, with
//! separate SQLite and PostgreSQL query paths.

pub mod blog_post;
pub mod comment;
pub mod page;
pub mod session;
pub mod subscriber;
pub mod tool_section;
pub mod tool_usage;
pub mod user;

pub use blog_post::{BlogPostRepository, SqlxBlogPostRepository};
pub use comment::{CommentRepository, SqlxCommentRepository};
pub use page::{PageRepository, SqlxPageRepository};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use subscriber::{SqlxSubscriberRepository, SubscriberRepository};
pub use tool_section::{SqlxToolSectionRepository, ToolSectionRepository};
pub use tool_usage::{SqlxToolUsageRepository, ToolUsage, ToolUsageRepository};
pub use user::{SqlxUserRepository, UserRepository};

use crate::models::{ContentStatus, Lifecycle};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::str::FromStr;

/// Filters for listing CMS content
#[derive(Debug, Clone, Default)]
pub struct ContentFilter {
    pub status: Option<ContentStatus>,
    /// Blog posts only
    pub tag: Option<String>,
    /// Case-insensitive match on title
    pub search: Option<String>,
}

impl ContentFilter {
    pub fn published() -> Self {
        Self {
            status: Some(ContentStatus::Published),
            ..Default::default()
        }
    }

    /// WHERE clause with `?` placeholders and the values to bind, in order
    pub(crate) fn where_clause(&self, with_tags: bool) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut args = Vec::new();

        if let Some(status) = self.status {
            conditions.push("status = ?");
            args.push(status.to_string());
        }
        if with_tags {
            if let Some(tag) = self.tag.as_deref().map(str::trim).filter(|t| !t.is_empty()) {
                conditions.push("tags LIKE ?");
                args.push(format!("%\"{}\"%", tag.to_lowercase()));
            }
        }
        if let Some(search) = self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            conditions.push("LOWER(title) LIKE ?");
            args.push(format!("%{}%", search.to_lowercase()));
        }

        if conditions.is_empty() {
            (String::new(), args)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), args)
        }
    }
}

/// Rewrite `?` placeholders as `$1, $2, ...` for PostgreSQL
pub(crate) fn pg_placeholders(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len() + 16);
    let mut n = 0;
    for ch in sql.chars() {
        if ch == '?' {
            n += 1;
            out.push('$');
            out.push_str(&n.to_string());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Rebuild a lifecycle from its three columns
pub(crate) fn lifecycle_from_columns(
    status: &str,
    scheduled_at: Option<DateTime<Utc>>,
    published_at: Option<DateTime<Utc>>,
) -> Result<Lifecycle> {
    let status = ContentStatus::from_str(status)
        .with_context(|| format!("Invalid content status in database: {}", status))?;
    Ok(Lifecycle {
        status,
        scheduled_at,
        published_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pg_placeholders() {
        assert_eq!(
            pg_placeholders("SELECT * FROM t WHERE a = ? AND b = ? LIMIT ?"),
            "SELECT * FROM t WHERE a = $1 AND b = $2 LIMIT $3"
        );
        assert_eq!(pg_placeholders("SELECT 1"), "SELECT 1");
    }

    #[test]
    fn test_where_clause() {
        let (sql, args) = ContentFilter::default().where_clause(true);
        assert!(sql.is_empty());
        assert!(args.is_empty());

        let filter = ContentFilter {
            status: Some(ContentStatus::Published),
            tag: Some(" PDF ".into()),
            search: Some("merge".into()),
        };
        let (sql, args) = filter.where_clause(true);
        assert_eq!(sql, "WHERE status = ? AND tags LIKE ? AND LOWER(title) LIKE ?");
        assert_eq!(args, vec!["published", "%\"pdf\"%", "%merge%"]);

        let (sql, args) = filter.where_clause(false);
        assert_eq!(sql, "WHERE status = ? AND LOWER(title) LIKE ?");
        assert_eq!(args.len(), 2);
    }

    #[test]
    fn test_lifecycle_from_columns() {
        let lc = lifecycle_from_columns("scheduled", Some(Utc::now()), None).unwrap();
        assert_eq!(lc.status, ContentStatus::Scheduled);
        assert!(lifecycle_from_columns("archived", None, None).is_err());
    }
}
