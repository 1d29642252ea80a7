//! HTTP handler for protected media objects.
//! Runs the authorization pipeline and streams the object body back without
//! buffering it in memory.

use crate::{
    models::{
        decision::AuthorizationDecision,
        object::{ObjectMeta, ObjectPayload},
    },
    services::gateway::MediaGateway,
};
use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";
pub const CACHE_CONTROL_PUBLIC: &str = "public, max-age=3600";

/// `GET /{*path}` - authorize, then stream the object at `path`.
pub async fn serve_object(
    State(gateway): State<MediaGateway>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    gateway.authorize(&headers, &uri).await.into_response()
}

impl IntoResponse for AuthorizationDecision {
    fn into_response(self) -> Response {
        match self {
            AuthorizationDecision::Authorized(payload) => assemble(payload),
            AuthorizationDecision::Denied(denial) => denial.into_response(),
        }
    }
}

fn assemble(payload: ObjectPayload) -> Response {
    let ObjectPayload { meta, body } = payload;

    let mut response = Response::new(Body::from_stream(body));
    *response.status_mut() = StatusCode::OK;
    set_object_headers(response.headers_mut(), &meta);
    response
}

fn set_object_headers(headers: &mut HeaderMap, meta: &ObjectMeta) {
    let content_type = meta
        .content_type
        .as_deref()
        .filter(|ct| !ct.trim().is_empty())
        .and_then(|ct| HeaderValue::from_str(ct).ok())
        .unwrap_or_else(|| HeaderValue::from_static(DEFAULT_CONTENT_TYPE));
    headers.insert(header::CONTENT_TYPE, content_type);

    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(CACHE_CONTROL_PUBLIC),
    );

    if let Some(length) = meta.size_bytes {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
    }

    if let Some(etag) = meta.etag.as_ref() {
        let quoted = format!("\"{}\"", etag);
        if let Ok(value) = HeaderValue::from_str(&quoted) {
            headers.insert(header::ETAG, value);
        }
    }

    if let Some(modified) = meta.last_modified {
        let http_date = modified.format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        if let Ok(value) = HeaderValue::from_str(&http_date) {
            headers.insert(header::LAST_MODIFIED, value);
        }
    }
}
