//! API Routes
//!
//! Configures the Axum router that sends every GET request through the proxy.

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;

use super::handlers::{proxy_handler, AppState};

/// Creates the main router.
///
/// # Routes
/// - `GET /` and `GET /*path` - proxied
///
/// # Middleware
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(proxy_handler))
        .route("/*path", get(proxy_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
