//! Cache Backend Module
//!
//! The interface every store variant implements, so the facade can hold an
//! in-memory data store and an in-memory or flat-file view store behind the
//! same shape.

use async_trait::async_trait;

use crate::cache::{CacheStats, InvalidationQuery};
use crate::error::Result;

// == Cache Backend ==
/// Async store interface.
///
/// Every operation reports faults through its `Result`; a backend never
/// panics past this boundary.
#[async_trait]
pub trait CacheBackend<V: Send + 'static>: Send + Sync {
    /// Backend kind, also used as the namespace for generated keys.
    fn cache_type(&self) -> &str;

    /// Token every key of this store contains; pattern purges require it.
    fn prefix(&self) -> &str;

    /// Returns the live value for `key`, or `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<V>>;

    /// Stores `value`, replacing any previous entry and resetting its TTL.
    ///
    /// Returns the TTL actually applied, in milliseconds.
    async fn set(&self, key: &str, value: V, ttl_ms: Option<u64>) -> Result<u64>;

    /// Deletes one key or every key matching a pattern; returns how many went.
    async fn del(&self, query: &InvalidationQuery) -> Result<usize>;

    /// Removes every entry.
    async fn clear_cache(&self) -> Result<()>;

    /// Drops entries whose TTL has elapsed; returns how many went.
    async fn purge_expired(&self) -> Result<usize>;

    async fn stats(&self) -> Result<CacheStats>;

    /// Changes the TTL used when `set` gets no override.
    async fn set_expires(&self, ttl_ms: u64) -> Result<()>;
}
