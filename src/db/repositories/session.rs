//! Session repository
//!
//! Database operations for login sessions.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::Session;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row, SqlitePool};
use std::sync::Arc;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by ID (token)
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete all sessions for a user
    async fn delete_by_user(&self, user_id: i64) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<i64>;
}

/// SQLx-based session repository for SQLite and PostgreSQL
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_session_sqlite(self.pool.sqlite()?, session).await,
            DatabaseDriver::Postgres => {
                create_session_postgres(self.pool.postgres()?, session).await
            }
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => get_session_by_id_sqlite(self.pool.sqlite()?, id).await,
            DatabaseDriver::Postgres => {
                get_session_by_id_postgres(self.pool.postgres()?, id).await
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM sessions WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete session")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM sessions WHERE id = $1")
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete session")?;
            }
        }
        Ok(())
    }

    async fn delete_by_user(&self, user_id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM sessions WHERE user_id = ?")
                    .bind(user_id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete sessions by user")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM sessions WHERE user_id = $1")
                    .bind(user_id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete sessions by user")?;
            }
        }
        Ok(())
    }

    async fn delete_expired(&self) -> Result<i64> {
        let now = Utc::now();
        let affected = match self.pool.driver() {
            DatabaseDriver::Sqlite => sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
                .bind(now)
                .execute(self.pool.sqlite()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
            DatabaseDriver::Postgres => sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
                .bind(now)
                .execute(self.pool.postgres()?)
                .await
                .context("Failed to delete expired sessions")?
                .rows_affected(),
        };
        Ok(affected as i64)
    }
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_session_sqlite(pool: &SqlitePool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_sqlite(pool: &SqlitePool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

async fn create_session_postgres(pool: &PgPool, session: &Session) -> Result<Session> {
    sqlx::query(
        r#"
        INSERT INTO sessions (id, user_id, expires_at, created_at)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(&session.id)
    .bind(session.user_id)
    .bind(session.expires_at)
    .bind(session.created_at)
    .execute(pool)
    .await
    .context("Failed to create session")?;

    Ok(session.clone())
}

async fn get_session_by_id_postgres(pool: &PgPool, id: &str) -> Result<Option<Session>> {
    let row = sqlx::query(
        "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("Failed to get session by ID")?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};
    use chrono::Duration;
    use uuid::Uuid;

    async fn setup_test_repo() -> (DynDatabasePool, SqlxSessionRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxSessionRepository::new(pool.clone());
        (pool, repo)
    }

    async fn create_test_user(pool: &DynDatabasePool, id: i64) {
        sqlx::query(
            "INSERT INTO users (id, username, email, password_hash) VALUES (?, ?, ?, 'hash')",
        )
        .bind(id)
        .bind(format!("user{}", id))
        .bind(format!("user{}@example.com", id))
        .execute(pool.sqlite().unwrap())
        .await
        .expect("Failed to create test user");
    }

    #[tokio::test]
    async fn test_create_get_delete_session() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let session = Session::new(Uuid::new_v4().to_string(), 1);
        repo.create(&session).await.expect("Failed to create session");

        let found = repo.get_by_id(&session.id).await.unwrap().unwrap();
        assert_eq!(found.user_id, 1);
        assert!(!found.is_expired());

        repo.delete(&session.id).await.unwrap();
        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_sessions_by_user() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;
        create_test_user(&pool, 2).await;

        let s1 = Session::new(Uuid::new_v4().to_string(), 1);
        let s2 = Session::new(Uuid::new_v4().to_string(), 1);
        let s3 = Session::new(Uuid::new_v4().to_string(), 2);
        for s in [&s1, &s2, &s3] {
            repo.create(s).await.unwrap();
        }

        repo.delete_by_user(1).await.unwrap();

        assert!(repo.get_by_id(&s1.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s2.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&s3.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_expired_sessions() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 1).await;

        let now = Utc::now();
        let expired = Session {
            id: Uuid::new_v4().to_string(),
            user_id: 1,
            expires_at: now - Duration::days(1),
            created_at: now - Duration::days(8),
        };
        let valid = Session::new(Uuid::new_v4().to_string(), 1);

        repo.create(&expired).await.unwrap();
        repo.create(&valid).await.unwrap();

        assert_eq!(repo.delete_expired().await.unwrap(), 1);
        assert!(repo.get_by_id(&expired.id).await.unwrap().is_none());
        assert!(repo.get_by_id(&valid.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_sessions_removed_with_user() {
        let (pool, repo) = setup_test_repo().await;
        create_test_user(&pool, 7).await;
        let session = Session::new(Uuid::new_v4().to_string(), 7);
        repo.create(&session).await.unwrap();

        pool.execute("DELETE FROM users WHERE id = 7").await.unwrap();
        assert!(repo.get_by_id(&session.id).await.unwrap().is_none());
    }
}
