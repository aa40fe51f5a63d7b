//! Redis Storage
//!
//! Each cache entry is a Redis hash keyed by request path:
//! - `body` - raw body bytes
//! - `kind` - `text` or `binary`
//! - `exp`  - expiry as Unix milliseconds
//!
//! `each` lists keys and then fetches them one by one, so it is not atomic:
//! entries removed in between are skipped and entries inserted after the
//! listing are not visited.

use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, IntoConnectionInfo};
use tracing::info;

use super::StorageBackend;
use crate::cache::{CacheRecord, CachedBody};
use crate::config::MAX_REDIS_DB;
use crate::error::{ProxyError, Result};

const FIELD_BODY: &str = "body";
const FIELD_KIND: &str = "kind";
const FIELD_EXP: &str = "exp";

/// Opens a reconnecting connection to `url`, selecting database `db` when given.
///
/// The returned handle is cheap to clone; share it between backends explicitly.
pub async fn open_connection(url: &str, db: Option<u8>) -> Result<ConnectionManager> {
    let mut conn_info = url.into_connection_info()?;
    if let Some(db) = db {
        if db > MAX_REDIS_DB {
            return Err(ProxyError::Config(format!(
                "Redis database index {} is out of range 0-{}",
                db, MAX_REDIS_DB
            )));
        }
        conn_info.redis.db = i64::from(db);
    }

    let selected_db = conn_info.redis.db;
    let client = redis::Client::open(conn_info)?;
    let conn = ConnectionManager::new(client).await?;
    info!("Redis client is ready (db {})", selected_db);
    Ok(conn)
}

// == Redis Storage ==
/// Storage backend persisting entries in Redis.
#[derive(Clone)]
pub struct RedisStorage {
    conn: ConnectionManager,
}

impl RedisStorage {
    /// Wraps an already opened connection handle.
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }
}

impl fmt::Debug for RedisStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStorage").finish_non_exhaustive()
    }
}

#[async_trait]
impl StorageBackend for RedisStorage {
    async fn insert(&self, key: &str, record: CacheRecord) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = redis::cmd("HSET")
            .arg(key)
            .arg(FIELD_BODY)
            .arg(record.body.as_bytes())
            .arg(FIELD_KIND)
            .arg(record.body.kind())
            .arg(FIELD_EXP)
            .arg(record.expires_at)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn find(&self, key: &str) -> Result<Option<CacheRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, Vec<u8>> = conn.hgetall(key).await?;
        decode_record(key, fields)
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let () = conn.del(key).await?;
        Ok(())
    }

    async fn each(&self, visit: &mut (dyn FnMut(Result<(String, CacheRecord)>) + Send)) {
        let mut conn = self.conn.clone();

        // Step 1: list every key in the selected database
        let keys: Vec<String> = match conn.keys("*").await {
            Ok(keys) => keys,
            Err(e) => {
                visit(Err(e.into()));
                return;
            }
        };

        // Step 2: fetch each key individually
        for key in keys {
            match self.find(&key).await {
                Ok(Some(record)) => visit(Ok((key, record))),
                // Removed since the listing
                Ok(None) => {}
                Err(e) => visit(Err(e)),
            }
        }
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Rebuilds a record from `HGETALL` output. An empty hash means the key is absent.
fn decode_record(key: &str, mut fields: HashMap<String, Vec<u8>>) -> Result<Option<CacheRecord>> {
    if fields.is_empty() {
        return Ok(None);
    }

    let corrupt = |reason: &str| ProxyError::CorruptRecord {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    let raw_body = fields
        .remove(FIELD_BODY)
        .ok_or_else(|| corrupt("missing body"))?;

    let expires_at = fields
        .get(FIELD_EXP)
        .and_then(|raw| std::str::from_utf8(raw).ok())
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| corrupt("missing or invalid exp"))?;

    let body = match fields.get(FIELD_KIND).map(Vec::as_slice) {
        Some(b"binary") => CachedBody::Binary(raw_body),
        _ => {
            let text = String::from_utf8(raw_body).map_err(|_| corrupt("body is not UTF-8"))?;
            CachedBody::Text(text)
        }
    };

    Ok(Some(CacheRecord { body, expires_at }))
}
