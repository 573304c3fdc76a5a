//! Tool section repository

use super::{lifecycle_from_columns, pg_placeholders, ContentFilter};
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{Lifecycle, ListParams, ToolSection};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::sync::Arc;

const SECTION_COLUMNS: &str = "id, tool_slug, title, content, content_html, position, status, \
     scheduled_at, published_at, created_at, updated_at";

#[async_trait]
pub trait ToolSectionRepository: Send + Sync {
    async fn create(&self, section: &ToolSection) -> Result<ToolSection>;

    async fn get_by_id(&self, id: i64) -> Result<Option<ToolSection>>;

    async fn update(&self, section: &ToolSection) -> Result<ToolSection>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Sections of one tool in display order
    async fn list_for_tool(&self, tool_slug: &str, published_only: bool) -> Result<Vec<ToolSection>>;

    /// Back-office listing across tools
    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<ToolSection>, i64)>;

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ToolSection>>;

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()>;

    /// One past the highest position used by the tool
    async fn next_position(&self, tool_slug: &str) -> Result<i32>;

    async fn count(&self) -> Result<i64>;
}

pub struct SqlxToolSectionRepository {
    pool: DynDatabasePool,
}

impl SqlxToolSectionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ToolSectionRepository> {
        Arc::new(Self::new(pool))
    }

    /// Run a SELECT returning section rows, binding string args then integers
    async fn select(&self, sql: &str, text_args: &[String], int_args: &[i64]) -> Result<Vec<ToolSection>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                for arg in text_args {
                    query = query.bind(arg);
                }
                for arg in int_args {
                    query = query.bind(*arg);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to query tool sections")?
                    .iter()
                    .map(row_to_section_sqlite)
                    .collect()
            }
            DatabaseDriver::Postgres => {
                let sql = pg_placeholders(sql);
                let mut query = sqlx::query(&sql);
                for arg in text_args {
                    query = query.bind(arg);
                }
                for arg in int_args {
                    query = query.bind(*arg);
                }
                query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to query tool sections")?
                    .iter()
                    .map(row_to_section_postgres)
                    .collect()
            }
        }
    }

    async fn scalar(&self, sql: &str, text_args: &[String]) -> Result<i64> {
        let value: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                for arg in text_args {
                    query = query.bind(arg);
                }
                query
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to query tool sections")?
                    .get("value")
            }
            DatabaseDriver::Postgres => {
                let sql = pg_placeholders(sql);
                let mut query = sqlx::query(&sql);
                for arg in text_args {
                    query = query.bind(arg);
                }
                query
                    .fetch_one(self.pool.postgres()?)
                    .await
                    .context("Failed to query tool sections")?
                    .get("value")
            }
        };
        Ok(value)
    }
}

#[async_trait]
impl ToolSectionRepository for SqlxToolSectionRepository {
    async fn create(&self, section: &ToolSection) -> Result<ToolSection> {
        let now = Utc::now();
        let lc = &section.lifecycle;
        let sql = r#"
            INSERT INTO tool_sections (tool_slug, title, content, content_html, position, status,
                                       scheduled_at, published_at, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#;

        let id: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&section.tool_slug)
                .bind(&section.title)
                .bind(&section.content)
                .bind(&section.content_html)
                .bind(section.position)
                .bind(lc.status.as_str())
                .bind(lc.scheduled_at)
                .bind(lc.published_at)
                .bind(now)
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to create tool section")?
                .last_insert_rowid(),
            DatabaseDriver::Postgres => {
                let sql = format!("{} RETURNING id", pg_placeholders(sql.trim_end()));
                sqlx::query(&sql)
                    .bind(&section.tool_slug)
                    .bind(&section.title)
                    .bind(&section.content)
                    .bind(&section.content_html)
                    .bind(section.position)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(now)
                    .fetch_one(self.pool.postgres()?)
                    .await
                    .context("Failed to create tool section")?
                    .get("id")
            }
        };

        Ok(ToolSection {
            id,
            created_at: now,
            updated_at: now,
            ..section.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<ToolSection>> {
        let sql = format!("SELECT {} FROM tool_sections WHERE id = ?", SECTION_COLUMNS);
        Ok(self.select(&sql, &[], &[id]).await?.into_iter().next())
    }

    async fn update(&self, section: &ToolSection) -> Result<ToolSection> {
        let sql = r#"
            UPDATE tool_sections
            SET tool_slug = ?, title = ?, content = ?, content_html = ?, position = ?,
                status = ?, scheduled_at = ?, published_at = ?, updated_at = ?
            WHERE id = ?
        "#;
        let lc = &section.lifecycle;
        let now = Utc::now();

        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(&section.tool_slug)
                    .bind(&section.title)
                    .bind(&section.content)
                    .bind(&section.content_html)
                    .bind(section.position)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(section.id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update tool section")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(&section.tool_slug)
                    .bind(&section.title)
                    .bind(&section.content)
                    .bind(&section.content_html)
                    .bind(section.position)
                    .bind(lc.status.as_str())
                    .bind(lc.scheduled_at)
                    .bind(lc.published_at)
                    .bind(now)
                    .bind(section.id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update tool section")?;
            }
        }

        self.get_by_id(section.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Tool section not found after update"))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM tool_sections WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete tool section")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM tool_sections WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete tool section")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn list_for_tool(&self, tool_slug: &str, published_only: bool) -> Result<Vec<ToolSection>> {
        let sql = format!(
            "SELECT {} FROM tool_sections WHERE tool_slug = ?{} ORDER BY position, id",
            SECTION_COLUMNS,
            if published_only { " AND status = 'published'" } else { "" }
        );
        self.select(&sql, &[tool_slug.to_string()], &[]).await
    }

    async fn list(&self, filter: &ContentFilter, params: &ListParams) -> Result<(Vec<ToolSection>, i64)> {
        let (where_sql, args) = filter.where_clause(false);
        let list_sql = format!(
            "SELECT {} FROM tool_sections {} ORDER BY tool_slug, position, id LIMIT ? OFFSET ?",
            SECTION_COLUMNS, where_sql
        );
        let count_sql = format!("SELECT COUNT(*) as value FROM tool_sections {}", where_sql);

        let items = self
            .select(&list_sql, &args, &[params.limit(), params.offset()])
            .await?;
        let total = self.scalar(&count_sql, &args).await?;
        Ok((items, total))
    }

    async fn list_due(&self, now: DateTime<Utc>) -> Result<Vec<ToolSection>> {
        let sql = format!(
            "SELECT {} FROM tool_sections WHERE status = 'scheduled' AND scheduled_at <= ?",
            SECTION_COLUMNS
        );
        match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(&sql)
                .bind(now)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to list due tool sections")?
                .iter()
                .map(row_to_section_sqlite)
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(&pg_placeholders(&sql))
                .bind(now)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to list due tool sections")?
                .iter()
                .map(row_to_section_postgres)
                .collect(),
        }
    }

    async fn set_lifecycle(&self, id: i64, lifecycle: &Lifecycle) -> Result<()> {
        let sql = "UPDATE tool_sections SET status = ?, scheduled_at = ?, published_at = ?, updated_at = ? WHERE id = ?";
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
                    .context("Failed to update tool section status")?;
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
                    .context("Failed to update tool section status")?;
            }
        }
        Ok(())
    }

    async fn next_position(&self, tool_slug: &str) -> Result<i32> {
        let max = self
            .scalar(
                "SELECT CAST(COALESCE(MAX(position), -1) AS BIGINT) as value FROM tool_sections WHERE tool_slug = ?",
                &[tool_slug.to_string()],
            )
            .await?;
        Ok(max as i32 + 1)
    }

    async fn count(&self) -> Result<i64> {
        self.scalar("SELECT COUNT(*) as value FROM tool_sections", &[]).await
    }
}

fn row_to_section_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<ToolSection> {
    let status: String = row.get("status");
    Ok(ToolSection {
        id: row.get("id"),
        tool_slug: row.get("tool_slug"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        position: row.get("position"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

fn row_to_section_postgres(row: &sqlx::postgres::PgRow) -> Result<ToolSection> {
    let status: String = row.get("status");
    Ok(ToolSection {
        id: row.get("id"),
        tool_slug: row.get("tool_slug"),
        title: row.get("title"),
        content: row.get("content"),
        content_html: row.get("content_html"),
        position: row.get("position"),
        lifecycle: lifecycle_from_columns(&status, row.get("scheduled_at"), row.get("published_at"))?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}
