//! Cache layer
//!
//! In-process cache (moka) for rendered CMS content and the public tool
//! registry. Entries are stored as JSON so any serializable value fits.
//!
//! ```rust,ignore
//! use paperdesk::cache::{create_cache, CacheLayer};
//!
//! let cache = create_cache(&config.cache);
//! cache.set("blog:slug:hello", &post, Duration::from_secs(60)).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache operations used by the services.
///
/// The generic methods make this trait unusable as `dyn CacheLayer`;
/// services hold the concrete [`Cache`] instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store `value` for at most `ttl`
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all keys matching a glob (`*`, `?`)
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;
}

/// The cache implementation shared across services
pub type Cache = MemoryCache;

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}
