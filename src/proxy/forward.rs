//! Upstream Forwarding
//!
//! Builds and sends the upstream request for a cache miss and decodes the
//! response body as text or raw bytes depending on the requested path.

use axum::http::header::{
    ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, HOST,
    TRANSFER_ENCODING, UPGRADE,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use tracing::{debug, error, info};

use crate::cache::CachedBody;
use crate::error::Result;

/// Path extensions fetched and cached as raw bytes.
const BINARY_EXTENSIONS: &[&str] = &["jpg", "jpeg", "gif", "png", "ico", "bmp", "tiff"];

/// Hop-by-hop request headers that must not be forwarded.
const HOP_BY_HOP: &[&str] = &["keep-alive", "proxy-connection", "te"];

// == Decode Mode ==
/// How the upstream body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    Text,
    Binary,
}

impl DecodeMode {
    /// Picks the mode from the extension of the path, ignoring any query string.
    pub fn for_path(path: &str) -> Self {
        match extension(path) {
            Some(ext) if BINARY_EXTENSIONS.contains(&ext.as_str()) => DecodeMode::Binary,
            _ => DecodeMode::Text,
        }
    }
}

/// Content type reported for a cached body served without upstream headers.
pub fn content_type_for(path: &str, body: &CachedBody) -> &'static str {
    if let CachedBody::Text(_) = body {
        return match extension(path).as_deref() {
            Some("css") => "text/css; charset=utf-8",
            Some("js") | Some("mjs") => "text/javascript; charset=utf-8",
            Some("json") => "application/json; charset=utf-8",
            Some("svg") => "image/svg+xml; charset=utf-8",
            Some("xml") => "application/xml; charset=utf-8",
            Some("txt") => "text/plain; charset=utf-8",
            _ => "text/html; charset=utf-8",
        };
    }

    match extension(path).as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("png") => "image/png",
        Some("ico") => "image/x-icon",
        Some("bmp") => "image/bmp",
        Some("tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

fn extension(path: &str) -> Option<String> {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase())
}

/// Builds the upstream URL from the inbound security flag, host and path.
pub fn upstream_url(secure: bool, host: &str, path: &str) -> String {
    let scheme = if secure { "https://" } else { "http://" };
    format!("{}{}{}", scheme, host, path)
}

// == Upstream Response ==
/// Decoded upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: CachedBody,
}

impl UpstreamResponse {
    pub fn is_redirect(&self) -> bool {
        self.status.is_redirection()
    }

    /// Cacheable statuses: 200 up to but excluding 299.
    pub fn is_cacheable_status(&self) -> bool {
        (200..299).contains(&self.status.as_u16())
    }
}

/// Prepares inbound headers for the upstream: rewrites `Host`, drops
/// hop-by-hop headers, and drops `Accept-Encoding` so the client only
/// negotiates encodings it can decode.
pub fn outbound_headers(mut headers: HeaderMap, host: &HeaderValue) -> HeaderMap {
    for name in [ACCEPT_ENCODING, CONNECTION, TRANSFER_ENCODING, UPGRADE, CONTENT_LENGTH] {
        headers.remove(name);
    }
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers.insert(HOST, host.clone());
    headers
}

/// Removes headers describing the upstream encoding and framing; the body has
/// already been decoded and is re-framed when sent to the caller.
pub fn strip_transfer_headers(headers: &mut HeaderMap) {
    headers.remove(CONTENT_ENCODING);
    headers.remove(CONTENT_LENGTH);
    headers.remove(TRANSFER_ENCODING);
}

/// Relabels `Content-Type` as UTF-8 once a text body has been transcoded,
/// keeping the media type and any other parameters.
pub fn relabel_utf8(headers: &mut HeaderMap) {
    let Some(value) = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return;
    };

    let mut parts = value.split(';').map(str::trim).filter(|p| !p.is_empty());
    let Some(media_type) = parts.next() else {
        return;
    };

    let mut relabeled = media_type.to_string();
    for param in parts {
        let is_charset = param
            .split_once('=')
            .is_some_and(|(name, _)| name.trim().eq_ignore_ascii_case("charset"));
        if !is_charset {
            relabeled.push_str("; ");
            relabeled.push_str(param);
        }
    }
    relabeled.push_str("; charset=utf-8");

    if let Ok(value) = HeaderValue::from_str(&relabeled) {
        headers.insert(CONTENT_TYPE, value);
    }
}

/// Sends the request upstream. Transport failures are returned as errors.
pub async fn send_upstream(
    client: &reqwest::Client,
    url: &str,
    method: Method,
    headers: HeaderMap,
    mode: DecodeMode,
) -> Result<UpstreamResponse> {
    info!("Requesting {}", url);

    let response = client
        .request(method, url)
        .headers(headers)
        .send()
        .await
        .inspect_err(|e| error!("Request to {} failed: {}", url, e))?;

    let status = response.status();
    let mut headers = response.headers().clone();
    let body = match mode {
        DecodeMode::Text => {
            // text() transcodes from the declared charset
            let text = response.text().await?;
            relabel_utf8(&mut headers);
            CachedBody::Text(text)
        }
        DecodeMode::Binary => CachedBody::Binary(response.bytes().await?.to_vec()),
    };

    debug!("{} answered {} with {} bytes", url, status, body.len());
    Ok(UpstreamResponse {
        status,
        headers,
        body,
    })
}
