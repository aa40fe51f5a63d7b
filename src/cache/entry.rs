//! Cache Entry Module
//!
//! Defines the record stored per request path: the response body and its expiry.

use chrono::Utc;

// == Cached Body ==
/// Response body as it was decoded from the upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedBody {
    /// Textual response (HTML, CSS, JS, JSON...)
    Text(String),
    /// Raw bytes (images)
    Binary(Vec<u8>),
}

impl CachedBody {
    /// Byte size of the body (UTF-8 length for text).
    pub fn len(&self) -> usize {
        match self {
            CachedBody::Text(text) => text.len(),
            CachedBody::Binary(bytes) => bytes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            CachedBody::Text(text) => text.as_bytes(),
            CachedBody::Binary(bytes) => bytes,
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            CachedBody::Text(text) => text.into_bytes(),
            CachedBody::Binary(bytes) => bytes,
        }
    }

    /// Short tag used when a backend persists the body variant.
    pub fn kind(&self) -> &'static str {
        match self {
            CachedBody::Text(_) => "text",
            CachedBody::Binary(_) => "binary",
        }
    }
}

impl From<&str> for CachedBody {
    fn from(text: &str) -> Self {
        CachedBody::Text(text.to_string())
    }
}

impl From<String> for CachedBody {
    fn from(text: String) -> Self {
        CachedBody::Text(text)
    }
}

impl From<Vec<u8>> for CachedBody {
    fn from(bytes: Vec<u8>) -> Self {
        CachedBody::Binary(bytes)
    }
}

// == Cache Record ==
/// A single cache entry as handed to a storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// The stored body
    pub body: CachedBody,
    /// Expiration timestamp (Unix milliseconds)
    pub expires_at: i64,
}

impl CacheRecord {
    // == Constructor ==
    /// Creates a record that expires `duration_ms` from now.
    pub fn new(body: CachedBody, duration_ms: u64) -> Self {
        let duration_ms = i64::try_from(duration_ms).unwrap_or(i64::MAX);
        Self {
            body,
            expires_at: current_timestamp_ms().saturating_add(duration_ms),
        }
    }

    // == Freshness ==
    /// A record is fresh while `now < expires_at`.
    pub fn is_fresh_at(&self, now_ms: i64) -> bool {
        now_ms < self.expires_at
    }

    /// Stale means the expiry has strictly passed; this is what the sweep removes.
    pub fn is_stale_at(&self, now_ms: i64) -> bool {
        self.expires_at < now_ms
    }
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> i64 {
    Utc::now().timestamp_millis()
}
