//! Proxy Module
//!
//! Per-request control flow: serve from cache, otherwise forward upstream,
//! localize same-host redirects, and offer successful responses to the cache.

mod forward;
mod redirect;

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::Response;
use reqwest::redirect::Policy;
use tracing::{debug, info};

use crate::cache::{Cache, CachedBody};
use crate::config::Config;
use crate::error::{ProxyError, Result};

pub use forward::{
    content_type_for, outbound_headers, relabel_utf8, send_upstream, strip_transfer_headers,
    upstream_url, DecodeMode, UpstreamResponse,
};
pub use redirect::localize_location;

// == Proxy Settings ==
/// Upstream and local endpoint addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Upstream authority
    pub host: String,
    /// Local host redirects are rewritten to
    pub dev_host: String,
    /// Local plain HTTP port
    pub port: u16,
    /// Local HTTPS port
    pub ssl_port: u16,
}

impl From<&Config> for ProxySettings {
    fn from(config: &Config) -> Self {
        Self {
            host: config.host.clone(),
            dev_host: config.dev_host.clone(),
            port: config.port,
            ssl_port: config.ssl_port,
        }
    }
}

// == Proxy ==
/// Caching reverse proxy for a single upstream host.
#[derive(Debug)]
pub struct Proxy {
    cache: Arc<Cache>,
    client: reqwest::Client,
    settings: ProxySettings,
    host_header: HeaderValue,
}

impl Proxy {
    /// Creates a proxy with its own HTTP client.
    ///
    /// The client never follows redirects and decodes gzip, brotli and
    /// deflate bodies transparently.
    pub fn new(cache: Arc<Cache>, settings: ProxySettings) -> Result<Self> {
        let host_header = HeaderValue::from_str(&settings.host).map_err(|_| {
            ProxyError::Config(format!("Invalid upstream host: {:?}", settings.host))
        })?;

        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| ProxyError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cache,
            client,
            settings,
            host_header,
        })
    }

    pub fn cache(&self) -> &Arc<Cache> {
        &self.cache
    }

    // == Handle ==
    /// Answers one request, from cache when possible.
    ///
    /// Upstream transport failures are returned as errors, never turned into
    /// a cache miss or a synthetic response.
    pub async fn handle(
        &self,
        method: Method,
        path: &str,
        headers: HeaderMap,
        secure: bool,
    ) -> Result<Response> {
        if let Some(body) = self.cache.get(path).await {
            let content_type = content_type_for(path, &body);
            return Ok(build_response(
                StatusCode::OK,
                content_type_headers(content_type),
                body,
            ));
        }

        let url = upstream_url(secure, &self.settings.host, path);
        let upstream = send_upstream(
            &self.client,
            &url,
            method,
            outbound_headers(headers, &self.host_header),
            DecodeMode::for_path(path),
        )
        .await?;

        if upstream.is_redirect() {
            return Ok(self.redirect_response(upstream));
        }

        let cacheable = upstream.is_cacheable_status();
        let UpstreamResponse {
            status,
            mut headers,
            body,
        } = upstream;

        let size = body.len();
        debug!("{} returned {} bytes", path, size);
        strip_transfer_headers(&mut headers);

        if cacheable && size > 0 {
            self.cache.store(path, body.clone(), size).await;
        }

        Ok(build_response(status, headers, body))
    }

    /// Relays a 3xx response, localizing `Location` when it points at the upstream host.
    fn redirect_response(&self, upstream: UpstreamResponse) -> Response {
        let UpstreamResponse {
            status,
            mut headers,
            body,
        } = upstream;
        strip_transfer_headers(&mut headers);

        let localized = headers
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|location| localize_location(location, &self.settings))
            .and_then(|location| HeaderValue::from_str(&location).ok());

        match localized {
            Some(location) => {
                info!("Redirecting to {:?}", location);
                headers.insert(LOCATION, location);
                build_response(status, headers, CachedBody::Binary(Vec::new()))
            }
            None => build_response(status, headers, body),
        }
    }
}

fn content_type_headers(content_type: &'static str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers
}

fn build_response(status: StatusCode, headers: HeaderMap, body: CachedBody) -> Response {
    let mut response = Response::new(Body::from(body.into_bytes()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
