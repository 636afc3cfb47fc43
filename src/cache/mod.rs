//! Cache layer
//!
//! In-process caching of hot rows (articles looked up by slug) backed by moka.
//! Entries expire after `cache.ttl_seconds` and are invalidated explicitly
//! whenever the underlying row changes.
//!
//! # Usage
//!
//! ```rust,ignore
//! use authors_haven::cache::{create_cache, CacheLayer};
//! use authors_haven::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value").await?;
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
/// Not object safe; services hold an `Arc<MemoryCache>` directly.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Store a value; it expires after the cache TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T) -> Result<()>;

    /// Delete a value from cache
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Cache key of an article row
pub fn article_key(slug: &str) -> String {
    format!("article:{}", slug)
}

/// Create the shared cache from configuration
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    let ttl = Duration::from_secs(config.ttl_seconds.max(1));
    Arc::new(MemoryCache::with_capacity_and_ttl(10_000, ttl))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_cache_from_config() {
        let config = CacheConfig { ttl_seconds: 1800 };
        let cache = create_cache(&config);
        assert_eq!(cache.default_ttl(), Duration::from_secs(1800));

        cache.set(&article_key("hello"), &"value".to_string()).await.unwrap();
        let result: Option<String> = cache.get("article:hello").await.unwrap();
        assert_eq!(result, Some("value".to_string()));
    }

    #[test]
    fn test_article_key() {
        assert_eq!(article_key("rust-ownership"), "article:rust-ownership");
    }
}
