//! Caching Proxy - A development-time reverse proxy
//!
//! Forwards GET requests to a fixed upstream host and caches successful
//! responses in memory or Redis, with TTL expiry and hard size limits.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod proxy;
pub mod storage;
pub mod tasks;

pub use api::AppState;
pub use cache::Cache;
pub use config::Config;
pub use error::{ProxyError, Result};
pub use proxy::Proxy;
pub use tasks::spawn_sweep_task;
