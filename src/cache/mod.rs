//! Cache layer
//!
//! Read-through caching for the filter taxonomy:
//! - In-memory cache (moka) for single-instance deployment
//! - Disabled, when `cache.enabled` is false
//!
//! # Usage
//!
//! ```rust,ignore
//! use folio::cache::{create_cache, CacheLayer};
//! use folio::config::CacheConfig;
//!
//! let cache = create_cache(&CacheConfig::default());
//! cache.set("key", &"value", Duration::from_secs(60)).await?;
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
/// The generic methods make this trait unusable as `dyn CacheLayer`; the
/// `Cache` enum provides runtime selection instead.
#[async_trait]
pub trait CacheLayer: Send + Sync {
    /// Get a value from cache
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>>;

    /// Set a value in cache with TTL
    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()>;

    /// Delete all values matching a glob pattern
    async fn delete_pattern(&self, pattern: &str) -> Result<()>;
}

/// Runtime-selected cache implementation
#[derive(Debug)]
pub enum Cache {
    /// In-memory cache using moka
    Memory(MemoryCache),
    /// Caching turned off; every read misses and writes are dropped
    Disabled,
}

impl Cache {
    /// TTL applied to entries written by services
    pub fn ttl(&self) -> Duration {
        match self {
            Cache::Memory(cache) => cache.default_ttl(),
            Cache::Disabled => Duration::ZERO,
        }
    }
}

#[async_trait]
impl CacheLayer for Cache {
    async fn get<T: DeserializeOwned + Send>(&self, key: &str) -> Result<Option<T>> {
        match self {
            Cache::Memory(cache) => cache.get(key).await,
            Cache::Disabled => Ok(None),
        }
    }

    async fn set<T: Serialize + Send + Sync>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.set(key, value, ttl).await,
            Cache::Disabled => Ok(()),
        }
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<()> {
        match self {
            Cache::Memory(cache) => cache.delete_pattern(pattern).await,
            Cache::Disabled => Ok(()),
        }
    }
}

/// Create a cache instance based on configuration
pub fn create_cache(config: &CacheConfig) -> Arc<Cache> {
    if !config.enabled || config.ttl_seconds == 0 {
        tracing::info!("Cache disabled");
        return Arc::new(Cache::Disabled);
    }

    let ttl = Duration::from_secs(config.ttl_seconds);
    Arc::new(Cache::Memory(MemoryCache::with_capacity_and_ttl(
        config.max_capacity,
        ttl,
    )))
}
