//! Newsletter subscriber repository

use super::pg_placeholders;
use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{ListParams, Subscriber, SubscriberStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use std::str::FromStr;
use std::sync::Arc;

const SUBSCRIBER_COLUMNS: &str = "id, email, status, source, created_at, unsubscribed_at";

#[async_trait]
pub trait SubscriberRepository: Send + Sync {
    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscriber>>;

    /// Insert a new, subscribed address
    async fn create(&self, email: &str, source: Option<&str>) -> Result<Subscriber>;

    /// `unsubscribed_at` is stored as given (None when re-subscribing)
    async fn set_status(
        &self,
        id: i64,
        status: SubscriberStatus,
        unsubscribed_at: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// Newest first; `params = None` returns every row (CSV export)
    async fn list(
        &self,
        status: Option<SubscriberStatus>,
        params: Option<&ListParams>,
    ) -> Result<(Vec<Subscriber>, i64)>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn count_by_status(&self) -> Result<Vec<(SubscriberStatus, i64)>>;
}

pub struct SqlxSubscriberRepository {
    pool: DynDatabasePool,
}

impl SqlxSubscriberRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SubscriberRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch(&self, sql: &str, arg: Option<String>) -> Result<Vec<Subscriber>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let mut query = sqlx::query(sql);
                if let Some(arg) = arg {
                    query = query.bind(arg);
                }
                query
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to query subscribers")?
                    .iter()
                    .map(row_to_subscriber_sqlite)
                    .collect()
            }
            DatabaseDriver::Postgres => {
                let sql = pg_placeholders(sql);
                let mut query = sqlx::query(&sql);
                if let Some(arg) = arg {
                    query = query.bind(arg);
                }
                query
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to query subscribers")?
                    .iter()
                    .map(row_to_subscriber_postgres)
                    .collect()
            }
        }
    }
}

#[async_trait]
impl SubscriberRepository for SqlxSubscriberRepository {
    async fn get_by_email(&self, email: &str) -> Result<Option<Subscriber>> {
        let sql = format!("SELECT {} FROM newsletter_subscribers WHERE email = ?", SUBSCRIBER_COLUMNS);
        Ok(self.fetch(&sql, Some(email.to_string())).await?.into_iter().next())
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Subscriber>> {
        let sql = format!(
            "SELECT {} FROM newsletter_subscribers WHERE id = {}",
            SUBSCRIBER_COLUMNS, id
        );
        Ok(self.fetch(&sql, None).await?.into_iter().next())
    }

    async fn create(&self, email: &str, source: Option<&str>) -> Result<Subscriber> {
        let now = Utc::now();
        let status = SubscriberStatus::Subscribed;

        let id: i64 = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(
                "INSERT INTO newsletter_subscribers (email, status, source, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(email)
            .bind(status.to_string())
            .bind(source)
            .bind(now)
            .execute(self.pool.sqlite()?)
            .await
            .context("Failed to create subscriber")?
            .last_insert_rowid(),
            DatabaseDriver::Postgres => sqlx::query(
                "INSERT INTO newsletter_subscribers (email, status, source, created_at) VALUES ($1, $2, $3, $4) RETURNING id",
            )
            .bind(email)
            .bind(status.to_string())
            .bind(source)
            .bind(now)
            .fetch_one(self.pool.postgres()?)
            .await
            .context("Failed to create subscriber")?
            .get("id"),
        };

        Ok(Subscriber {
            id,
            email: email.to_string(),
            status,
            source: source.map(str::to_string),
            created_at: now,
            unsubscribed_at: None,
        })
    }

    async fn set_status(
        &self,
        id: i64,
        status: SubscriberStatus,
        unsubscribed_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let sql = "UPDATE newsletter_subscribers SET status = ?, unsubscribed_at = ? WHERE id = ?";
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query(sql)
                    .bind(status.to_string())
                    .bind(unsubscribed_at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to update subscriber")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query(&pg_placeholders(sql))
                    .bind(status.to_string())
                    .bind(unsubscribed_at)
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to update subscriber")?;
            }
        }
        Ok(())
    }

    async fn list(
        &self,
        status: Option<SubscriberStatus>,
        params: Option<&ListParams>,
    ) -> Result<(Vec<Subscriber>, i64)> {
        let (where_sql, arg) = match status {
            Some(s) => ("WHERE status = ?", Some(s.to_string())),
            None => ("", None),
        };
        let page_sql = params
            .map(|p| format!(" LIMIT {} OFFSET {}", p.limit(), p.offset()))
            .unwrap_or_default();
        let sql = format!(
            "SELECT {} FROM newsletter_subscribers {} ORDER BY created_at DESC, id DESC{}",
            SUBSCRIBER_COLUMNS, where_sql, page_sql
        );
        let items = self.fetch(&sql, arg.clone()).await?;

        let total = match params {
            None => items.len() as i64,
            Some(_) => {
                let count_sql = format!("SELECT COUNT(*) as count FROM newsletter_subscribers {}", where_sql);
                match self.pool.driver() {
                    DatabaseDriver::Sqlite => {
                        let mut query = sqlx::query(&count_sql);
                        if let Some(arg) = &arg {
                            query = query.bind(arg);
                        }
                        query
                            .fetch_one(self.pool.sqlite()?)
                            .await
                            .context("Failed to count subscribers")?
                            .get::<i64, _>("count")
                    }
                    DatabaseDriver::Postgres => {
                        let count_sql = pg_placeholders(&count_sql);
                        let mut query = sqlx::query(&count_sql);
                        if let Some(arg) = &arg {
                            query = query.bind(arg);
                        }
                        query
                            .fetch_one(self.pool.postgres()?)
                            .await
                            .context("Failed to count subscribers")?
                            .get::<i64, _>("count")
                    }
                }
            }
        };

        Ok((items, total))
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM newsletter_subscribers WHERE id = ?")
                .bind(id)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete subscriber")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM newsletter_subscribers WHERE id = $1")
                .bind(id)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete subscriber")?
                .rows_affected(),
        };
        Ok(affected > 0)
    }

    async fn count_by_status(&self) -> Result<Vec<(SubscriberStatus, i64)>> {
        let sql = "SELECT status, COUNT(*) as count FROM newsletter_subscribers GROUP BY status";
        let pairs: Vec<(String, i64)> = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query(sql)
                .fetch_all(self.pool.sqlite()?)
                .await
                .context("Failed to count subscribers")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
            DatabaseDriver::Postgres => sqlx::query(sql)
                .fetch_all(self.pool.postgres()?)
                .await
                .context("Failed to count subscribers")?
                .iter()
                .map(|r| (r.get("status"), r.get("count")))
                .collect(),
        };
        Ok(pairs
            .into_iter()
            .filter_map(|(s, n)| SubscriberStatus::from_str(&s).ok().map(|s| (s, n)))
            .collect())
    }
}

fn row_to_subscriber_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<Subscriber> {
    let status: String = row.get("status");
    Ok(Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        status: SubscriberStatus::from_str(&status)?,
        source: row.get("source"),
        created_at: row.get("created_at"),
        unsubscribed_at: row.get("unsubscribed_at"),
    })
}

fn row_to_subscriber_postgres(row: &sqlx::postgres::PgRow) -> Result<Subscriber> {
    let status: String = row.get("status");
    Ok(Subscriber {
        id: row.get("id"),
        email: row.get("email"),
        status: SubscriberStatus::from_str(&status)?,
        source: row.get("source"),
        created_at: row.get("created_at"),
        unsubscribed_at: row.get("unsubscribed_at"),
    })
}
