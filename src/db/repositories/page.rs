//! Page repository
//!
//! Database operations for standalone CMS pages.

use super::{lifecycle_from_columns, pg_placeholders, ContentFilter};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Lifecycle, ListParams, Page};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

const PAGE_COLUMNS: &str = "id, slug, title, content, content_html, meta_title, meta_description, \
     status, scheduled_at, published_at, created_at, updated_at";

/// Page repository trait
#[async_trait]
pub trait PageRepository: Send + Sync {
    async fn create(&self, page: &Page) -> Result<Page>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>>;

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn update(&self, page: &Page) -> Result<Page>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Ordered by title
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Page>, i64)>;

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Page>>;

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based page repository for SQLite and PostgreSQL
pub struct SqlxPageRepository {
    pool: DynDatabasePool,
}

impl SqlxPageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PageRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, condition: &str, value: PageKey<'_>) -> Result<Option<Page>> {
        let sql = format!("SELECT {} FROM pages WHERE {}", PAGE_COLUMNS, condition);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let query = sqlx::query(&sql);
                let query = match value {
                    PageKey::Id(id) => query.bind(id),
                    PageKey::Slug(slug) => query.bind(slug),
                };
                let row = query
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get page")?;
                row.map(|r| row_to_page_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = pg_placeholders(&sql);
                let query = sqlx::query(&sql);
                let query = match value {
                    PageKey::Id(id) => query.bind(id),
                    PageKey::Slug(slug) => query.bind(slug),
                };
                let row = query
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get page")?;
                row.map(|r| row_to_page_postgres(&r)).transpose()
            }
        }
    }
}

enum PageKey<'a> {
    Id(i64),
    Slug(&'a str),
}

#[async_trait]
impl PageRepository for SqlxPageRepository {
    async fn create(&self, page: &Page) -> Result<Page> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_page_sqlite(self.pool.sqlite()?, page).await,
            DatabaseDriver::Postgres => create_page_postgres(self.pool.postgres()?, page).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Page>> {
        self.fetch_one_where("id = ?", PageKey::Id(id)).await
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Page>> {
        self.fetch_one_where("slug = ?", PageKey::Slug(slug)).await
    }

    async fn exists_by_slug(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let sql = "SELECT COUNT(*) as count FROM pages WHERE slug = ? AND id != ?";
        let exclude = exclude_id.unwrap_or(0);
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to check page slug")?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query(&pg_placeholders(sql))
                .bind(slug)
                .bind(exclude)
                .fetch_one(self.pool.postgres()?)
                .await
                .context("Failed to check page slug")?
                .get("count"),
        };
        Ok(count > 0)
    }

    async fn update(&self, page: &Page) -> Result<Page> {
        let sql = r#"
            UPDATE pages
            SET slug = ?, title = ?, content = ?, content_html = ?, meta_title = ?, meta_description = ?,
                status = ?, scheduled_at = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let lc = &page.lifecycle;
        let now = Utc::now();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&page.slug)
                    .bind(&page.title)
                    .bind(&page.content)
                    .bind(&page.content_html)
                    .bind(&page.meta_title)
                    .bind(&page.meta_description)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(page.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update page")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(&page.slug)
                    .bind(&page.title)
                    .bind(&page.content)
                    .bind(&page.content_html)
                    .bind(&page.meta_title)
                    .bind(&page.meta_description)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(page.id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update page")?;
            }
        }

        self.get_by_id(page.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Page not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM pages WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM pages WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete page")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<Page>, i64)> {
        let (where_sql, args) = filter.where_clause(false);
        let list_sql = format!(
            "SELECT {} FROM pages {} ORDER BY title, id LIMIT ? OFFSET ?",
            PAGE_COLUMNS, where_sql
        );
        let count_sql = format!("SELECT COUNT(*) as count FROM pages {}", where_sql);

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
                    .context("Failed to list pages")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count pages")?
                    .get("count");
                Ok((rows.iter().map(row_to_page_sqlite).collect::<Result<_>>()?, total))
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
                    .context("Failed to list pages")?;
                let total: i64 = count_query
                    .fetch_one(pool)
                    .await
                    .context("Failed to count pages")?
                    .get("count");
                Ok((rows.iter().map(row_to_page_postgres).collect::<Result<_>>()?, total))
            }
        }
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<Page>> {
        let sql = format!(
            "SELECT {} FROM pages WHERE status = 'scheduled' AND scheduled_at <= ?",
            PAGE_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(now)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list due pages")?
                .iter()
                .map(row_to_page_sqlite)
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(&pg_placeholders(&sql))
                .bind(now)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to list due pages")?
                .iter()
                .map(row_to_page_postgres)
                .collect(),
        }
    }

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()> {
        let sql = "UPDATE pages SET status = ?, scheduled_at = ?, published_at = ?, updated_at = ? WHERE id = ?";
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
                    .context("Failed to update page status")?;
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
                    .context("Failed to update page status")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let count: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("SELECT COUNT(*) as count FROM pages")
                .fetch_one(self.pool.sqlite()?)
                .await
                .context("Failed to count pages")?
                .get("count"),
            DatabaseDriver::Postgres => sqlx::query("SELECT COUNT(*) as count FROM pages")
                .fetch_one(self.pool.postgres()?)
                .await
                .context("Failed to count pages")?
                .get("count"),
        };
        Ok(count)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_page_sqlite(pool: &SqlitePool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let lc = &page.lifecycle;

    let result = sqlx::query(
        r#"
        INSERT INTO pages (slug, title, content, content_html, meta_title, meta_description,
                           status, scheduled_at, published_at, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&page.slug)
    .bind(&page.title)
    .bind(&page.content)
    .bind(&page.content_html)
    .bind(&page.meta_title)
    .bind(&page.meta_description)
    .bind(lc.status.as_str())
    .bind(lc.scheduled_at)
    .bind(lc.published_at)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..page.clone()
    })
}

fn row_to_page_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Page> {
    let status: String = row.get("status");
    Ok(Page {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

async fn create_page_postgres(pool: &PgPool, page: &Page) -> Result<Page> {
    let now = Utc::now();
    let lc = &page.lifecycle;

    let row = sqlx::query(
        r#"
        INSERT INTO pages (slug, title, content, content_html, meta_title, meta_description,
                           status, scheduled_at, published_at, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        RETURNING id
        "#,
    )
    .bind(&page.slug)
    .bind(&page.title)
    .bind(&page.content)
    .bind(&page.content_html)
    .bind(&page.meta_title)
    .bind(&page.meta_description)
    .bind(lc.status.as_str())
    .bind(lc.scheduled_at)
    .bind(lc.published_at)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create page")?;

    Ok(Page {
        id: row.get("id"),
        created_at: now,
        updated_at: now,
        ..page.clone()
    })
}

fn row_to_page_postgres(row: &sqlx::postgres::PgRow) -> Result<Page> {
    let status: String = row.get("status");
    Ok(Page {
        id: row.get("id"),
        slug: row.get("slug"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        meta_title: row.get("meta_title"),
        meta_description: row.get("meta_description"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use crate::models::ContentStatus;

    async fn setup_test_repo() -> SqlxPageRepository {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        SqlxPageRepository::new(pool)
    }

    fn page(slug: &str, title: &str) -> Page {
        Page::new(slug.into(), title.into(), "text".into(), "<p>text</p>".into())
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let repo = setup_test_repo().await;
        let mut created = repo.create(&page("about", "About")).await.unwrap();
        assert!(created.id > 0);

        assert!(repo.get_by_slug("about").await.unwrap().is_some());
        assert!(repo.exists_by_slug("about", None).await.unwrap());
        assert!(!repo.exists_by_slug("about", Some(created.id)).await.unwrap());

        created.title = "About us".into();
        created.meta_title = Some("About PaperDesk".into());
        let updated = repo.update(&created).await.unwrap();
        assert_eq!(updated.title, "About us");
        assert_eq!(updated.meta_title.as_deref(), Some("About PaperDesk"));

        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_sorted_by_title_and_filtered() {
        let repo = setup_test_repo().await;
        let now = Utc::now();
        repo.create(&page("terms", "Terms")).await.unwrap();
        let about = repo.create(&page("about", "About")).await.unwrap();
        let published = about.lifecycle.transition(ContentStatus::Published, None, now).unwrap();
        repo.set_lifecycle(about.id, &published).await.unwrap();

        let params = ListParams::default();
        let (all, total) = repo.list(&ContentFilter::default(), &params).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(all[0].slug, "about");

        let (live, total) = repo.list(&ContentFilter::published(), &params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(live[0].slug, "about");
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_slug_fails() {
        let repo = setup_test_repo().await;
        repo.create(&page("privacy", "Privacy")).await.unwrap();
        assert!(repo.create(&page("privacy", "Privacy 2")).await.is_err());
    }
}
