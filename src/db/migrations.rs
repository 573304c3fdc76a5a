//! Database migrations
//!
//! Migrations are embedded as SQL strings, one variant per backend, and
//! tracked in the `_migrations` table.
//!
//! ```ignore
//! use paperdesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&config).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use sqlx::{PgPool, Row, SqlitePool};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and PostgreSQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (unique, ascending)
    pub version: i32,
    pub name: &'static str,
    pub up_sqlite: &'static str,
    pub up_postgres: &'static str,
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'editor',
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                display_name VARCHAR(100),
                last_login_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGSERIAL PRIMARY KEY,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'editor',
                status VARCHAR(20) NOT NULL DEFAULT 'active',
                display_name VARCHAR(100),
                last_login_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
            CREATE INDEX IF NOT EXISTS idx_sessions_expires_at ON sessions(expires_at);
        "#,
    },
    Migration {
        version: 3,
        name: "create_blog_posts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(300) NOT NULL,
                excerpt TEXT,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                cover_image TEXT,
                author VARCHAR(100),
                tags TEXT NOT NULL DEFAULT '[]',
                meta_title VARCHAR(300),
                meta_description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMP,
                published_at TIMESTAMP,
                view_count INTEGER NOT NULL DEFAULT 0,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_blog_posts_status ON blog_posts(status);
            CREATE INDEX IF NOT EXISTS idx_blog_posts_published_at ON blog_posts(published_at);
            CREATE INDEX IF NOT EXISTS idx_blog_posts_scheduled_at ON blog_posts(scheduled_at);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS blog_posts (
                id BIGSERIAL PRIMARY KEY,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(300) NOT NULL,
                excerpt TEXT,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                cover_image TEXT,
                author VARCHAR(100),
                tags TEXT NOT NULL DEFAULT '[]',
                meta_title VARCHAR(300),
                meta_description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMPTZ,
                published_at TIMESTAMPTZ,
                view_count BIGINT NOT NULL DEFAULT 0,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_blog_posts_status ON blog_posts(status);
            CREATE INDEX IF NOT EXISTS idx_blog_posts_published_at ON blog_posts(published_at);
            CREATE INDEX IF NOT EXISTS idx_blog_posts_scheduled_at ON blog_posts(scheduled_at);
        "#,
    },
    Migration {
        version: 4,
        name: "create_pages",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(300) NOT NULL,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                meta_title VARCHAR(300),
                meta_description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMP,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS pages (
                id BIGSERIAL PRIMARY KEY,
                slug VARCHAR(200) NOT NULL UNIQUE,
                title VARCHAR(300) NOT NULL,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                meta_title VARCHAR(300),
                meta_description TEXT,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMPTZ,
                published_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_pages_status ON pages(status);
        "#,
    },
    Migration {
        version: 5,
        name: "create_tool_sections",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tool_sections (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                tool_slug VARCHAR(100) NOT NULL,
                title VARCHAR(300) NOT NULL,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMP,
                published_at TIMESTAMP,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            CREATE INDEX IF NOT EXISTS idx_tool_sections_tool ON tool_sections(tool_slug, position);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS tool_sections (
                id BIGSERIAL PRIMARY KEY,
                tool_slug VARCHAR(100) NOT NULL,
                title VARCHAR(300) NOT NULL,
                content TEXT NOT NULL,
                content_html TEXT NOT NULL,
                position INTEGER NOT NULL DEFAULT 0,
                status VARCHAR(20) NOT NULL DEFAULT 'draft',
                scheduled_at TIMESTAMPTZ,
                published_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_tool_sections_tool ON tool_sections(tool_slug, position);
        "#,
    },
    Migration {
        version: 6,
        name: "create_comments",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                post_id INTEGER NOT NULL,
                parent_id INTEGER,
                author_name VARCHAR(100) NOT NULL,
                author_email VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                ip_address VARCHAR(64),
                user_agent TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (post_id) REFERENCES blog_posts(id) ON DELETE CASCADE,
                FOREIGN KEY (parent_id) REFERENCES comments(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, status);
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS comments (
                id BIGSERIAL PRIMARY KEY,
                post_id BIGINT NOT NULL REFERENCES blog_posts(id) ON DELETE CASCADE,
                parent_id BIGINT REFERENCES comments(id) ON DELETE CASCADE,
                author_name VARCHAR(100) NOT NULL,
                author_email VARCHAR(255) NOT NULL,
                content TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'pending',
                ip_address VARCHAR(64),
                user_agent TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id, status);
        "#,
    },
    Migration {
        version: 7,
        name: "create_newsletter_subscribers",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS newsletter_subscribers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email VARCHAR(255) NOT NULL UNIQUE,
                status VARCHAR(20) NOT NULL DEFAULT 'subscribed',
                source VARCHAR(100),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                unsubscribed_at TIMESTAMP
            );
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS newsletter_subscribers (
                id BIGSERIAL PRIMARY KEY,
                email VARCHAR(255) NOT NULL UNIQUE,
                status VARCHAR(20) NOT NULL DEFAULT 'subscribed',
                source VARCHAR(100),
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                unsubscribed_at TIMESTAMPTZ
            );
        "#,
    },
    Migration {
        version: 8,
        name: "create_tool_usage",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS tool_usage (
                tool_slug VARCHAR(100) NOT NULL,
                day VARCHAR(10) NOT NULL,
                count INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (tool_slug, day)
            );
        "#,
        up_postgres: r#"
            CREATE TABLE IF NOT EXISTS tool_usage (
                tool_slug VARCHAR(100) NOT NULL,
                day VARCHAR(10) NOT NULL,
                count BIGINT NOT NULL DEFAULT 0,
                PRIMARY KEY (tool_slug, day)
            );
        "#,
    },
];

/// Run all pending migrations
///
/// Returns the number of migrations applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied_versions = get_applied_versions(pool).await?;

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                "Applying migration {}: {}",
                migration.version,
                migration.name
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Postgres => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_versions(pool: &DynDatabasePool) -> Result<Vec<i32>> {
    match pool.driver() {
        DatabaseDriver::Sqlite => get_applied_versions_sqlite(pool.sqlite()?).await,
        DatabaseDriver::Postgres => get_applied_versions_postgres(pool.postgres()?).await,
    }
}

async fn get_applied_versions_sqlite(pool: &SqlitePool) -> Result<Vec<i32>> {
    let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<i32, _>("version")).collect())
}

async fn get_applied_versions_postgres(pool: &PgPool) -> Result<Vec<i32>> {
    let rows = sqlx::query("SELECT version FROM _migrations ORDER BY version")
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(|row| row.get::<i32, _>("version")).collect())
}

async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    match pool.driver() {
        DatabaseDriver::Sqlite => apply_migration_sqlite(pool.sqlite()?, migration).await,
        DatabaseDriver::Postgres => apply_migration_postgres(pool.postgres()?, migration).await,
    }
}

async fn apply_migration_sqlite(pool: &SqlitePool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_sqlite) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES (?, ?)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

async fn apply_migration_postgres(pool: &PgPool, migration: &Migration) -> Result<()> {
    let mut tx = pool.begin().await?;
    for statement in split_sql_statements(migration.up_postgres) {
        sqlx::query(statement)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }

    sqlx::query("INSERT INTO _migrations (version, name) VALUES ($1, $2)")
        .bind(migration.version)
        .bind(migration.name)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Check if migrations are up to date
pub async fn is_up_to_date(pool: &DynDatabasePool) -> Result<bool> {
    Ok(pending_count(pool).await? == 0)
}

/// Number of migrations not yet applied
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_versions(pool).await?;
    Ok(MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(&m.version))
        .count())
}

pub fn total_migrations() -> usize {
    MIGRATIONS.len()
}

pub fn get_migration(version: i32) -> Option<&'static Migration> {
    MIGRATIONS.iter().find(|m| m.version == version)
}
