//! Per-day tool usage counters

use super::pg_placeholders;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Serialize;
use sqlx::Row;
use std::sync::Arc;

/// Total runs of one tool over a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolUsage {
    pub tool_slug: String,
    pub count: i64,
}

#[async_trait]
pub trait ToolUsageRepository: Send + Sync {
    /// Bump the counter for `tool_slug` on `day`
    async fn increment(&self, tool_slug: &str, day: NaiveDate) -> Result<()>;

    /// Totals per tool from `since` (inclusive), busiest first
    async fn totals_since(&self, since: NaiveDate) -> Result<Vec<ToolUsage>>;

    /// Runs across all tools per day from `since` (inclusive), oldest first
    async fn daily_since(&self, since: NaiveDate) -> Result<Vec<(String, i64)>>;
}

pub struct SqlxToolUsageRepository {
    pool: DynDatabasePool,
}

impl SqlxToolUsageRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ToolUsageRepository> {
        Arc::new(Self::new(pool))
    }

    async fn pairs(&self, sql: &str, since: NaiveDate, key: &str) -> Result<Vec<(String, i64)>> {
        let since = day_key(since);
        let rows: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .bind(&since)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to query tool usage")?
                .iter()
                .map(|r| (r.get(key), r.get("total")))
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(&pg_placeholders(sql))
                .bind(&since)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to query tool usage")?
                .iter()
                .map(|r| (r.get(key), r.get("total")))
                .collect(),
        };
        Ok(rows)
    }
}

fn day_key(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

#[async_trait]
impl ToolUsageRepository for SqlxToolUsageRepository {
    async fn increment(&self, tool_slug: &str, day: NaiveDate) -> Result<()> {
        let sql = r#"
            INSERT INTO tool_usage (tool_slug, day, count) VALUES (?, ?, 1)
            ON CONFLICT (tool_slug, day) DO UPDATE SET count = tool_usage.count + 1
        "#;
        let day = day_key(day);
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(tool_slug)
                    .bind(&day)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to record tool usage")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(tool_slug)
                    .bind(&day)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to record tool usage")?;
            }
        }
        Ok(())
    }

    async fn totals_since(&self, since: NaiveDate) -> Result<Vec<ToolUsage>> {
        let sql = "SELECT tool_slug, CAST(SUM(count) AS BIGINT) as total FROM tool_usage \
                   WHERE day >= ? GROUP BY tool_slug ORDER BY total DESC, tool_slug";
        Ok(self
            .pairs(sql, since, "tool_slug")
            .await?
            .into_iter()
            .map(|(tool_slug, count)| ToolUsage { tool_slug, count })
            .collect())
    }

    async fn daily_since(&self, since: NaiveDate) -> Result<Vec<(String, i64)>> {
        let sql = "SELECT day, CAST(SUM(count) AS BIGINT) as total FROM tool_usage \
                   WHERE day >= ? GROUP BY day ORDER BY day";
        self.pairs(sql, since, "day").await
    }
}
