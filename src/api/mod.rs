//! API Module
//!
//! HTTP handler and routing for the caching proxy.
//!
//! # Endpoints
//! - `GET /*` - Any path, served from cache or forwarded upstream
//!
//! Other methods are answered with 405 by the router.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
