//! Database layer
//!
//! Supports:
//! - SQLite (default, single-binary deployment)
//! - PostgreSQL (hosted deployments such as Supabase)
//!
//! Repositories hold a `DynDatabasePool` and dispatch on `driver()` to
//! backend-specific queries.
//!
//! ```ignore
//! use paperdesk::config::DatabaseConfig;
//! use paperdesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, PostgresDatabase,
    SqliteDatabase,
};
