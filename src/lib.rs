//! Edge gateway for paid media.
//!
//! A request is admitted only when it carries a valid bearer credential
//! whose claims grant paid access; the object named by the request path is
//! then streamed from the backing store.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use axum::Router;

use crate::services::gateway::MediaGateway;

/// The complete application: routes, state and HTTP middleware.
pub fn build_app(gateway: MediaGateway) -> Router {
    middleware::apply(routes::routes().with_state(gateway))
}
