//! Defines routes for the media gateway.
//!
//! ## Structure
//! - **Operational endpoints** (no credential, reserved `/_/` prefix)
//!   - `GET /_/healthz` - liveness
//!   - `GET /_/readyz`  - readiness (pings the object store)
//!
//! - **Media endpoints**
//!   - `GET /`         - resolves the empty key (always a miss on well-formed stores)
//!   - `GET /{*path}`  - authorize, then stream the object at `path`
//!
//! The wildcard `*path` allows nested keys like `videos/2025/intro.mp4`.
//! Other methods on media paths are answered with 405 by the router.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        media_handlers::serve_object,
    },
    services::gateway::MediaGateway,
};
use axum::{Router, routing::get};

/// Build the router for all gateway routes, carrying `MediaGateway` as state.
pub fn routes() -> Router<MediaGateway> {
    Router::new()
        .route("/_/healthz", get(healthz))
        .route("/_/readyz", get(readyz))
        .route("/", get(serve_object))
        .route("/{*path}", get(serve_object))
}
