//! User repository
//!
//! Database operations for back-office users.

use crate::config::DatabaseDriver;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole, UserStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, status, display_name, \
     last_login_at, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn get_by_email(&self, email: &str) -> Result<Option<User>>;

    /// Persist username, email, password hash, role, status and display name
    async fn update(&self, user: &User) -> Result<User>;

    /// Stamp `last_login_at`
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()>;

    async fn delete(&self, id: i64) -> Result<()>;

    async fn count(&self) -> Result<i64>;

    /// Newest first
    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)>;
}

/// SQLx-based user repository for SQLite and PostgreSQL
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => create_user_sqlite(self.pool.sqlite()?, user).await,
            DatabaseDriver::Postgres => create_user_postgres(self.pool.postgres()?, user).await,
        }
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.sqlite()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_sqlite(&r)).transpose()
            }
            DatabaseDriver::Postgres => {
                let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(id)
                    .fetch_optional(self.pool.postgres()?)
                    .await
                    .context("Failed to get user by ID")?;
                row.map(|r| row_to_user_postgres(&r)).transpose()
            }
        }
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_field_sqlite(self.pool.sqlite()?, "username", username).await
            }
            DatabaseDriver::Postgres => {
                get_user_by_field_postgres(self.pool.postgres()?, "username", username).await
            }
        }
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                get_user_by_field_sqlite(self.pool.sqlite()?, "email", email).await
            }
            DatabaseDriver::Postgres => {
                get_user_by_field_postgres(self.pool.postgres()?, "email", email).await
            }
        }
    }

    async fn update(&self, user: &User) -> Result<User> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => update_user_sqlite(self.pool.sqlite()?, user).await?,
            DatabaseDriver::Postgres => update_user_postgres(self.pool.postgres()?, user).await?,
        }
        self.get_by_id(user.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found after update"))
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to record login")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("UPDATE users SET last_login_at = $1 WHERE id = $2")
                    .bind(at)
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to record login")?;
            }
        }
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(id)
                    .execute(self.pool.sqlite()?)
                    .await
                    .context("Failed to delete user")?;
            }
            DatabaseDriver::Postgres => {
                sqlx::query("DELETE FROM users WHERE id = $1")
                    .bind(id)
                    .execute(self.pool.postgres()?)
                    .await
                    .context("Failed to delete user")?;
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<i64> {
        let row = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM users")
                    .fetch_one(self.pool.sqlite()?)
                    .await
                    .context("Failed to count users")?;
                row.get::<i64, _>("count")
            }
            DatabaseDriver::Postgres => {
                let row = sqlx::query("SELECT COUNT(*) as count FROM users")
                    .fetch_one(self.pool.postgres()?)
                    .await
                    .context("Failed to count users")?;
                row.get::<i64, _>("count")
            }
        };
        Ok(row)
    }

    async fn list(&self, page: i64, per_page: i64) -> Result<(Vec<User>, i64)> {
        let offset = (page.max(1) - 1) * per_page;
        let users = match self.pool.driver() {
            DatabaseDriver::Sqlite => {
                let sql = format!(
                    "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
                    USER_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(self.pool.sqlite()?)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_sqlite).collect::<Result<Vec<_>>>()?
            }
            DatabaseDriver::Postgres => {
                let sql = format!(
                    "SELECT {} FROM users ORDER BY created_at DESC, id DESC LIMIT $1 OFFSET $2",
                    USER_COLUMNS
                );
                let rows = sqlx::query(&sql)
                    .bind(per_page)
                    .bind(offset)
                    .fetch_all(self.pool.postgres()?)
                    .await
                    .context("Failed to list users")?;
                rows.iter().map(row_to_user_postgres).collect::<Result<Vec<_>>>()?
            }
        };
        let total = self.count().await?;
        Ok((users, total))
    }
}

fn parse_role_and_status(role: &str, status: Option<String>) -> Result<(UserRole, UserStatus)> {
    let role = UserRole::from_str(role)
        .with_context(|| format!("Invalid role in database: {}", role))?;
    let status = status
        .and_then(|s| UserStatus::from_str(&s).ok())
        .unwrap_or_default();
    Ok((role, status))
}

// ============================================================================
// SQLite implementations
// ============================================================================

async fn create_user_sqlite(pool: &SqlitePool, user: &User) -> Result<User> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, status, display_name, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(&user.display_name)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: result.last_insert_rowid(),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_field_sqlite(pool: &SqlitePool, field: &str, value: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = ?", USER_COLUMNS, field);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", field))?;

    row.map(|r| row_to_user_sqlite(&r)).transpose()
}

async fn update_user_sqlite(pool: &SqlitePool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = ?, email = ?, password_hash = ?, role = ?, status = ?, display_name = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(&user.display_name)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(())
}

fn row_to_user_sqlite(row: &sqlx::sqlite::SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    let (role, status) = parse_role_and_status(&role, row.try_get("status").ok())?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        status,
        display_name: row.get("display_name"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

// ============================================================================
// PostgreSQL implementations
// ============================================================================

async fn create_user_postgres(pool: &PgPool, user: &User) -> Result<User> {
    let now = Utc::now();

    let row = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, role, status, display_name, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING id
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(&user.display_name)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
    .context("Failed to create user")?;

    Ok(User {
        id: row.get("id"),
        created_at: now,
        updated_at: now,
        ..user.clone()
    })
}

async fn get_user_by_field_postgres(pool: &PgPool, field: &str, value: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE {} = $1", USER_COLUMNS, field);
    let row = sqlx::query(&sql)
        .bind(value)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to get user by {}", field))?;

    row.map(|r| row_to_user_postgres(&r)).transpose()
}

async fn update_user_postgres(pool: &PgPool, user: &User) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE users
        SET username = $1, email = $2, password_hash = $3, role = $4, status = $5, display_name = $6, updated_at = $7
        WHERE id = $8
        "#,
    )
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.password_hash)
    .bind(user.role.to_string())
    .bind(user.status.to_string())
    .bind(&user.display_name)
    .bind(Utc::now())
    .bind(user.id)
    .execute(pool)
    .await
    .context("Failed to update user")?;

    Ok(())
}

fn row_to_user_postgres(row: &sqlx::postgres::PgRow) -> Result<User> {
    let role: String = row.get("role");
    let (role, status) = parse_role_and_status(&role, row.try_get("status").ok())?;

    Ok(User {
        id: row.get("id"),
        username: row.get("username"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        role,
        status,
        display_name: row.get("display_name"),
        last_login_at: row.get("last_login_at"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_test_pool, migrations};

    async fn setup_test_repo() -> (DynDatabasePool, SqlxUserRepository) {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        let repo = SqlxUserRepository::new(pool.clone());
        (pool, repo)
    }

    fn test_user(username: &str, email: &str) -> User {
        User::new(
            username.to_string(),
            email.to_string(),
            "$argon2id$fake".to_string(),
            UserRole::Editor,
        )
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let (_pool, repo) = setup_test_repo().await;
        let created = repo
            .create(&test_user("editor", "editor@example.com"))
            .await
            .expect("Failed to create user");

        assert!(created.id > 0);
        let found = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(found.username, "editor");
        assert_eq!(found.role, UserRole::Editor);
        assert_eq!(found.status, UserStatus::Active);
        assert!(found.last_login_at.is_none());

        assert!(repo.get_by_username("editor").await.unwrap().is_some());
        assert!(repo.get_by_email("editor@example.com").await.unwrap().is_some());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let (_pool, repo) = setup_test_repo().await;
        repo.create(&test_user("dup", "a@example.com")).await.unwrap();
        assert!(repo.create(&test_user("dup", "b@example.com")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_record_login() {
        let (_pool, repo) = setup_test_repo().await;
        let mut user = repo.create(&test_user("u", "u@example.com")).await.unwrap();

        user.role = UserRole::SuperAdmin;
        user.display_name = Some("Owner".to_string());
        let updated = repo.update(&user).await.unwrap();
        assert!(updated.is_superadmin());
        assert_eq!(updated.display_name.as_deref(), Some("Owner"));

        let at = Utc::now();
        repo.record_login(user.id, at).await.unwrap();
        let found = repo.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(found.last_login_at.map(|t| t.timestamp()), Some(at.timestamp()));
    }

    #[tokio::test]
    async fn test_count_list_delete() {
        let (_pool, repo) = setup_test_repo().await;
        assert_eq!(repo.count().await.unwrap(), 0);

        for i in 0..3 {
            repo.create(&test_user(&format!("user{}", i), &format!("u{}@example.com", i)))
                .await
                .unwrap();
        }

        let (page, total) = repo.list(1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.len(), 2);

        let (page2, _) = repo.list(2, 2).await.unwrap();
        assert_eq!(page2.len(), 1);

        repo.delete(page2[0].id).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
