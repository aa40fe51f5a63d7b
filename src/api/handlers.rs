//! API Handlers
//!
//! Bridges axum requests into the proxy.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, Method, Uri},
    response::Response,
};

use crate::cache::Cache;
use crate::config::Config;
use crate::error::Result;
use crate::proxy::{Proxy, ProxySettings};

/// Header set by a TLS-terminating front end.
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Proxy shared by every request
    pub proxy: Arc<Proxy>,
}

impl AppState {
    /// Creates a new AppState around the given proxy.
    pub fn new(proxy: Proxy) -> Self {
        Self {
            proxy: Arc::new(proxy),
        }
    }

    /// Creates a new AppState from configuration and an already started cache.
    pub fn from_config(config: &Config, cache: Arc<Cache>) -> Result<Self> {
        let proxy = Proxy::new(cache, ProxySettings::from(config))?;
        Ok(Self::new(proxy))
    }
}

/// Whether the inbound connection was secure, as reported by the TLS front end.
pub fn is_secure(headers: &HeaderMap) -> bool {
    headers
        .get(FORWARDED_PROTO)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .is_some_and(|proto| proto.trim().eq_ignore_ascii_case("https"))
}

/// Handler for GET on any path
///
/// The cache key is the path plus query string.
pub async fn proxy_handler(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Result<Response> {
    let path = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let secure = is_secure(&headers);

    state.proxy.handle(method, path, headers, secure).await
}
