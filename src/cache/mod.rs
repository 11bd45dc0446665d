//! Cache layer
//!
//! Public read models (visible content, package listings, the active popup)
//! are cached in-process with moka. The database stays the source of truth:
//! cache failures are logged and ignored by callers.
//!
//! # Usage
//!
//! ```rust,ignore
//! use tripdesk::cache::{create_cache, keys, CacheLayer};
//! use tripdesk::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set(&keys::active_popup(), &None::<i64>).await?;
//! ```

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Cache layer trait
///
/// Generic over the stored type, so it is implemented by concrete caches
/// and shared as `Arc<MemoryCache>` rather than as a trait object.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value; it expires after the cache's TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;

    /// Clear all cache entries
    async fn clear(&self) -> Result<()>;
}

/// Shared handle used by services
pub type SharedCache = Arc<MemoryCache>;

/// Cache key builders
pub mod keys {
    use crate::models::{ContentKind, ListingTarget};

    pub fn visible_content(kind: ContentKind) -> String {
        format!("content:{}:visible", kind)
    }

    pub fn listing(target: ListingTarget) -> String {
        format!("listing:{}", target)
    }

    pub fn active_popup() -> String {
        "popup:active".to_string()
    }

    pub const ALL_LISTINGS: &str = "listing:*";
}

/// Create the cache from configuration
pub fn create_cache(config: &CacheConfig) -> SharedCache {
    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(MemoryCache::with_capacity_and_ttl(config.max_capacity, ttl))
}
