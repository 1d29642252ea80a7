//! Bearer credential extraction.
//!
//! Programmatic clients send `Authorization: Bearer <token>`. Browsers that
//! navigate to a media URL directly (e.g. `<video src>`) cannot attach
//! headers, so the token may also travel as the `token` query parameter.
//! The header always wins when both are present.

use axum::http::{HeaderMap, Uri, header};

const BEARER_PREFIX: &str = "Bearer ";
const TOKEN_QUERY_PARAM: &str = "token";

/// Pull the raw credential out of a request, header first, then query.
pub fn extract_credential(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    from_authorization_header(headers).or_else(|| from_query(uri))
}

fn from_authorization_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn from_query(uri: &Uri) -> Option<String> {
    let query = uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(name, _)| name == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|token| !token.is_empty())
}
