//! HTTP-level middleware applied to every route.
//!
//! - Request-Id generation + propagation (`x-request-id`)
//! - Access logging / request tracing (`TraceLayer`)
//!
//! The request span records the path only. Query strings may carry a
//! credential and never reach the logs.

use axum::{Router, extract::Request, http::header::HeaderName};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn apply(router: Router) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    // Last layer added runs first: the id is set before tracing sees the request.
    router
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request| {
            tracing::info_span!("request", method = %req.method(), path = req.uri().path())
        }))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
