//! Cache store port and its adapters.
//!
//! The gateway only issues independent `get`/`set` calls; expiry is the
//! store's job.

use std::time::Duration;

use async_trait::async_trait;

pub mod keys;
mod memory;
mod redis_store;

pub use memory::MemoryCacheStore;
pub use redis_store::RedisCacheStore;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// `Ok(None)` means "not found"; errors are transport or service failures.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
}
