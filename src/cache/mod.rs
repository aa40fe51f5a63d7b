//! Cache Module
//!
//! Response caching with TTL expiry and hard admission limits over a
//! pluggable storage backend.

mod entry;
mod policy;


// Re-export public types
pub use entry::{current_timestamp_ms, CacheRecord, CachedBody};
pub use policy::{
    Cache, CacheSettings, DEFAULT_CACHE_DURATION_MS, DEFAULT_CACHE_SIZE_BYTES,
    DEFAULT_CACHE_SIZE_ELEMENTS,
};
