//! Storage Module
//!
//! Key-value persistence behind the response cache. Two interchangeable
//! backends implement [`StorageBackend`]:
//! - [`InMemoryStorage`] - process-local table, lost on restart
//! - [`RedisStorage`] - Redis hashes, survives restarts
//!
//! Backends know nothing about expiry or admission limits; that lives in
//! [`crate::cache::Cache`].

mod memory;
mod redis_store;

use async_trait::async_trait;

use crate::cache::CacheRecord;
use crate::error::Result;

pub use self::memory::InMemoryStorage;
pub use self::redis_store::{open_connection, RedisStorage};

/// Capability set every cache backend provides.
#[async_trait]
pub trait StorageBackend: Send + Sync + std::fmt::Debug {
    /// Upserts `record` under `key`.
    async fn insert(&self, key: &str, record: CacheRecord) -> Result<()>;

    /// Looks up `key`. A missing key is `Ok(None)`, never an error.
    async fn find(&self, key: &str) -> Result<Option<CacheRecord>>;

    /// Deletes `key` if present. Removing an absent key succeeds.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Calls `visit` once per stored entry, or once with the error if the
    /// backend could not be enumerated.
    ///
    /// Enumeration is not required to be atomic with respect to concurrent
    /// writes.
    async fn each(&self, visit: &mut (dyn FnMut(Result<(String, CacheRecord)>) + Send));

    /// Backend name for log lines.
    fn name(&self) -> &'static str;
}
