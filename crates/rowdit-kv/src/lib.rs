//! Key-value storage for sessions and password-reset tokens.
//!
//! `RedisStore` is used in production; `MemoryStore` backs development runs
//! without Redis and the test suites.

mod memory;
mod redis_store;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

#[derive(Debug, Error)]
pub enum KvError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("KV lock poisoned")]
    Poisoned,
}

#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Store `value` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), KvError>;

    async fn get(&self, key: &str) -> Result<Option<String>, KvError>;

    /// Returns whether the key existed.
    async fn del(&self, key: &str) -> Result<bool, KvError>;
}
