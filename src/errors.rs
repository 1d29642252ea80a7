use axum::{
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::services::{object_store::StoreError, verifier::VerifyFailure};

/// Why a request did not end in an authorized object response.
///
/// Every variant is an expected outcome, not a defect. The internal reason
/// is kept for logging; the wire only ever sees `status()` and `message()`.
#[derive(Debug, Error)]
pub enum Denial {
    #[error("no credential presented")]
    MissingCredential,
    #[error("credential rejected: {0}")]
    InvalidCredential(VerifyFailure),
    #[error("credential lacks paid entitlement")]
    InsufficientEntitlement,
    #[error("object not found")]
    ObjectAbsent,
    #[error("object store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

impl Denial {
    pub fn status(&self) -> StatusCode {
        match self {
            Denial::MissingCredential => StatusCode::UNAUTHORIZED,
            Denial::InvalidCredential(_) | Denial::InsufficientEntitlement => StatusCode::FORBIDDEN,
            Denial::ObjectAbsent => StatusCode::NOT_FOUND,
            Denial::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Short diagnostic sent as the response body. The two 403 causes share
    /// one body; only the logs tell them apart.
    pub fn message(&self) -> &'static str {
        match self {
            Denial::MissingCredential => "no credential",
            Denial::InvalidCredential(_) | Denial::InsufficientEntitlement => "forbidden",
            Denial::ObjectAbsent => "object not found",
            Denial::StoreUnavailable(_) => "object store unavailable",
        }
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        let mut response = (self.status(), self.message()).into_response();
        response
            .headers_mut()
            .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
        response
    }
}
