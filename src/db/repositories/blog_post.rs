//! Blog post repository
//!
//! Database operations for blog posts. Tags are stored as a JSON array in a
//! TEXT column so both backends can filter them with `LIKE`.

use super::{lifecycle_from_columns, pg_placeholders, ContentFilter};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{BlogPost, ContentStatus, Lifecycle, ListParams};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

const POST_COLUMNS: &str = "id, slug, title, excerpt, content, content_html, cover_image, author, \
     tags, meta_title, meta_description, status, scheduled_at, published_at, view_count, \
     created_at, updated_at";

/// Blog post repository trait
#[async_trait]
pub trait BlogPostRepository: Send + Sync {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost>;

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>>;

    /// Whether another post already uses `slug`
    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    /// Persist all editable fields and the lifecycle
    async fn update(&self, post: &BlogPost) -> Result<BlogPost>;

    /// Returns false when no row matched
    async fn delete(&self, id: i64) -> Result<bool>;

    /// Newest first; returns the page and the total match count
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<BlogPost>, i64)>;

    /// Scheduled posts whose time has come
    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<BlogPost>>;

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()>;

    /// Count one view; returns the new total, `None` when the post is gone
    async fn increment_views(&self, id: i64) -> Result<Option<i64>>;

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, i64)>>;
}

/// SQLx-based blog post repository for SQLite and PostgreSQL
pub struct SqlxBlogPostRepository {
    pool: DynDatabasePool,
}

impl SqlxBlogPostRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn BlogPostRepository> {
        Arc::new(Self::new(pool))
    }
}

fn tags_to_json(tags: &[String]) -> Result<String> {
    serde_json::to_string(tags).context("Failed to encode tags")
}

fn tags_from_json(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[async_trait]
impl BlogPostRepository for SqlxBlogPostRepository {
    async fn create(&self, post: &BlogPost) -> Result<BlogPost> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_post_sqlite(self.pool.sqlite()?, post).await,
            DatabaseDriver::Postgres => create_post_postgres(self.pool.postgres()?, post).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<BlogPost>> {
        let sql = format!("SELECT {} FROM blog_posts WHERE id = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get blog post by ID")?;
                row.map(|r| row_to_post_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let row = sqlx::query(&pg_placeholders(&sql))
                    .bind(id)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get blog post by ID")?;
                row.map(|r| row_to_post_postgres(&r)).transpose()
            }
        }
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<BlogPost>> {
        let sql = format!("SELECT {} FROM blog_posts WHERE slug = ?", POST_COLUMNS);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query(&sql)
                    .bind(slug)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get blog post by slug")?;
                row.map(|r| row_to_post_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let row = sqlx::query(&pg_placeholders(&sql))
                    .bind(slug)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get blog post by slug")?;
                row.map(|r| row_to_post_postgres(&r)).transpose()
            }
        }
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM blog_posts WHERE slug = ? AND id != ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check slug")?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query(&pg_placeholders(sql))
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.postgres()?)
                .await
                .context("Failed to check slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, post: &BlogPost) -> Result<BlogPost> {
        let sql = r#"
            UPDATE blog_posts
            SET slug = ?, title = ?, excerpt = ?, content = ?, content_html = ?, cover_image = ?,
                author = ?, tags = ?, meta_title = ?, meta_description = ?, status = ?,
                scheduled_at = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let tags = tags_to_json(&post.tags)?;
        let now = Utc::now();
        let lc = &post.lifecycle;

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&post.slug)
                    .bind(&post.title)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(&post.cover_image)
                    .bind(&post.author)
                    .bind(&tags)
                    .bind(&post.meta_title)
                    .bind(&post.meta_description)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(post.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update blog post")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(&post.slug)
                    .bind(&post.title)
                    .bind(&post.excerpt)
                    .bind(&post.content)
                    .bind(&post.content_html)
                    .bind(&post.cover_image)
                    .bind(&post.author)
                    .bind(&tags)
                    .bind(&post.meta_title)
                    .bind(&post.meta_description)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(post.id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update blog post")?;
            }
        }

        self.get_by_id(post.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Blog post not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM blog_posts WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete blog post")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM blog_posts WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete blog post")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<BlogPost>, i64)> {
        let (where_sql, args) = filter.where_clause(true);
        let list_sql = format!(
            "SELECT {} FROM blog_posts {} ORDER BY COALESCE(published_at, created_at) DESC, id DESC LIMIT ? OFFSET ?",
            POST_COLUMNS, where_sql
        );
        let count_sql = format!("SELECT COUNT(*) as count FROM blog_posts {}", where_sql);

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let pool = self.pool.sqlite()?;
                let mut query = sqlx::query(&list_sql);
                let mut count_query = sqlx::query(&count_sql);
                for arg in &args {
                    query = query.bind(arg);
                    count_query = count_query.bind(arg);
                }
                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list blog posts")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count blog posts")?
                    .get("count");
                let posts = rows.iter().map(row_to_post_sqlite).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
            DatabaseDriver::Postgres => {
                let pool = self.pool.postgres()?;
                let list_sql = pg_placeholders(&list_sql);
                let count_sql = pg_placeholders(&count_sql);
                let mut query = sqlx::query(&list_sql);
                let mut count_query = sqlx::query(&count_sql);
                for arg in &args {
                    query = query.bind(arg);
                    count_query = count_query.bind(arg);
                }
                let rows = query
                    .bind(params.limit())
                    .bind(params.offset())
                    .fetch_all(pool)
                    .await
                    .context("Failed to list blog posts")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count blog posts")?
                    .get("count");
                let posts = rows.iter().map(row_to_post_postgres).collect::<Result<Vec<_>>>()?;
                Ok((posts, total))
            }
        }
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<BlogPost>> {
        let sql = format!(
            "SELECT {} FROM blog_posts WHERE status = 'scheduled' AND scheduled_at <= ? ORDER BY scheduled_at",
            POST_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let rows = sqlx::query(&sql)
                    .bind(now)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list due blog posts")?;
                rows.iter().map(row_to_post_sqlite).collect()
            }
            DatabaseDriver::Postgres => {
                let rows = sqlx::query(&pg_placeholders(&sql))
                    .bind(now)
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to list due blog posts")?;
                rows.iter().map(row_to_post_postgres).collect()
            }
        }
    }

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()> {
        let sql = "UPDATE blog_posts SET status = ?, scheduled_at = ?, published_at = ?, updated_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(lifecycle.status.as_str())
                    .bind(lifecycle.scheduled_at)
                    .bind(lifecycle.published_at)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update blog post status")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(lifecycle.status.as_str())
                    .bind(lifecycle.scheduled_at)
                    .bind(lifecycle.published_at)
                    .bind(Utc::now())
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update blog post status")?;
            }
        }
        Ok(())
    }

    async fn increment_views(&self, id: i64) -> Result<Option<i64>> {
        let count = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query_scalar::<_, i64>(
                "UPDATE blog_posts SET view_count = view_count + 1 WHERE id = ? RETURNING view_count",
            )
            .bind(id)
            .fetch_optional(self.pool.sqlite()?)
            .await
            .context("Failed to increment view count")?,
            DatabaseDriver::Postgres => sqlx::query_scalar::<_, i64>(
                "UPDATE blog_posts SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
            )
            .bind(id)
            .fetch_optional(self.pool.postgres()?)
            .await
            .context("Failed to increment view count")?,
        };
        Ok(count)
    }

    async fn count_by_status(&self) -> Result<Vec<(ContentStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) as count FROM blog_posts GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count blog posts by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(sql)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to count blog posts by status")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
        };
        Ok(pairs
            .into_iter()
            .filter_map(|(status, count)| status.parse().ok().map(|s| (s, count)))
            .collect())
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_post_sqlite(pool: &SqlitePool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let lc = &post.lifecycle;

    let result = sqlx::query(
        r#"
        INSERT INTO blog_posts (slug, title, excerpt, content, content_html, cover_image, author, tags,
                                meta_title, meta_description, status, scheduled_at, published_at,
                                view_count, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(&post.author)
    .bind(tags_to_json(&post.tags)?)
    .bind(&post.meta_title)
    .bind(&post.meta_description)
    .bind(lc.status.as_str())
    .bind(lc.scheduled_at)
    .bind(lc.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: result.last_insert_rowid(),
        view_count: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

fn row_to_post_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<BlogPost> {
    let status: String = row.get("status");
    let tags: String = row.get("tags");

    Ok(BlogPost {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        author: row.get("author"),
        tags: tags_from_json(&tags),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        view_count: row.try_get("view_count").unwrap_or(0),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

async fn create_post_postgres(pool: &PgPool, post: &BlogPost) -> Result<BlogPost> {
    let now = Utc::now();
    let lc = &post.lifecycle;

    let row = sqlx::query(
        r#"
        INSERT INTO blog_posts (slug, title, excerpt, content, content_html, cover_image, author, tags,
                                meta_title, meta_description, status, scheduled_at, published_at,
                                view_count, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, 0, $14, $15)
        RETURNING id
        "#,
    )
    .bind(&post.slug)
    .bind(&post.title)
    .bind(&post.excerpt)
    .bind(&post.content)
    .bind(&post.content_html)
    .bind(&post.cover_image)
    .bind(&post.author)
    .bind(tags_to_json(&post.tags)?)
    .bind(&post.meta_title)
    .bind(&post.meta_description)
    .bind(lc.status.as_str())
    .bind(lc.scheduled_at)
    .bind(lc.published_at)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create blog post")?;

    Ok(BlogPost {
        id: row.get("id"),
        view_count: 0,
        created_at: now,
        updated_at: now,
        ..post.clone()
    })
}

fn row_to_post_postgres(row: &sqlx::postgres::PgRow) -> Result<BlogPost> {
    let status: String = row.get("status");
    let tags: String = row.get("tags");

    Ok(BlogPost {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        excerpt: row.get("excerpt"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        cover_image: row.get("cover_image"),
        author: row.get("author"),
        tags: tags_from_json(&tags),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        view_count: row.try_get("view_count").unwrap_or(0),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;

    async fn setup_test_repo() -> SqlxBlogPostRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxBlogPostRepository::new(pool)
    }

    fn post(slug: &str, title: &str) -> BlogPost {
        BlogPost::new(slug.into(), title.into(), "body".into(), "<p>body</p>".into())
    }

    #[tokio::test]
    async fn test_create_and_get_post() {
        let repo = setup_test_repo().await;
        let mut input = post("hello-world", "Hello World");
        input.tags = vec!["pdf".into(), "tips".into()];

        let created = repo.create(&input).await.expect("Failed to create post");
        assert!(created.id > 0);

        let found = repo.get_by_slug("hello-world").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.tags, vec!["pdf", "tips"]);
        assert_eq!(found.status(), ContentStatus::Draft);

        assert!(repo.get_by_id(9999).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exists_by_slug_excluding_self() {
        let repo = setup_test_repo().await;
        let created = repo.create(&post("taken", "Taken")).await.unwrap();

        assert!(repo.exists_by_slug("taken", None).await.unwrap());
        assert!(!repo.exists_by_slug("taken", Some(created.id)).await.unwrap());
        assert!(!repo.exists_by_slug("free", None).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_filters_by_status_and_tag() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let mut published = post("a", "Merge PDFs quickly");
        published.tags = vec!["pdf".into()];
        published.lifecycle = published.lifecycle.transition(ContentStatus::Published, None, now).unwrap();
        repo.create(&published).await.unwrap();

        let mut other = post("b", "Image tricks");
        other.tags = vec!["image".into()];
        other.lifecycle = other.lifecycle.transition(ContentStatus::Published, None, now).unwrap();
        repo.create(&other).await.unwrap();

        repo.create(&post("c", "Draft")).await.unwrap();

        let params = ListParams::new(1, 10);
        let (all, total) = repo.list(&ContentFilter::default(), &params).await.unwrap();
        assert_eq!((all.len(), total), (3, 3));

        let (live, total) = repo.list(&ContentFilter::published(), &params).await.unwrap();
        assert_eq!(total, 2);
        assert!(live.iter().all(|p| p.is_published()));

        let filter = ContentFilter {
            tag: Some("PDF".into()),
            ..ContentFilter::published()
        };
        let (tagged, total) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(tagged[0].slug, "a");

        let filter = ContentFilter {
            search: Some("image".into()),
            ..Default::default()
        };
        let (found, _) = repo.list(&filter, &params).await.unwrap();
        assert_eq!(found[0].slug, "b");
    }

    #[tokio::test]
    async fn test_list_due_and_set_lifecycle() {
        let repo = setup_test_repo().await;
        let now = Utc::now();

        let mut soon = post("soon", "Soon");
        soon.lifecycle = soon
            .lifecycle
            .transition(ContentStatus::Scheduled, Some(now + Duration::minutes(5)), now)
            .unwrap();
        let soon = repo.create(&soon).await.unwrap();

        let mut later = post("later", "Later");
        later.lifecycle = later
            .lifecycle
            .transition(ContentStatus::Scheduled, Some(now + Duration::days(2)), now)
            .unwrap();
        repo.create(&later).await.unwrap();

        assert!(repo.list_due(now).await.unwrap().is_empty());

        let due = repo.list_due(now + Duration::minutes(10)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, soon.id);

        repo.set_lifecycle(soon.id, &due[0].lifecycle.publish_scheduled()).await.unwrap();
        let published = repo.get_by_id(soon.id).await.unwrap().unwrap();
        assert!(published.is_published());
        assert!(published.lifecycle.published_at.is_some());
        assert!(published.lifecycle.scheduled_at.is_none());
    }

    #[tokio::test]
    async fn test_update_views_delete_and_counts() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&post("x", "X")).await.unwrap();

        created.title = "X2".into();
        created.tags = vec!["new".into()];
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "X2");
        assert_eq!(updated.tags, vec!["new"]);

        assert_eq!(repo.increment_views(created.id).await.unwrap(), Some(1));
        assert_eq!(repo.increment_views(created.id).await.unwrap(), Some(2));
        assert_eq!(repo.get_by_id(created.id).await.unwrap().unwrap().view_count, 2);
        assert_eq!(repo.increment_views(created.id + 100).await.unwrap(), None);

        let counts = repo.count_by_status().await.unwrap();
        assert_eq!(counts, vec![(ContentStatus::Draft, 1)]);

        assert!(repo.delete(created.id).await.unwrap());
        assert!(!repo.delete(created.id).await.unwrap());
    }
}
