//! The terminal outcome of one request's authorization pipeline.

use crate::{errors::Denial, models::object::ObjectPayload};

/// Exactly one of these is produced per request. Only `Authorized` carries a
/// payload; every denial maps to a fixed status with no object bytes.
#[derive(Debug)]
pub enum AuthorizationDecision {
    Authorized(ObjectPayload),
    Denied(Denial),
}

impl From<Result<ObjectPayload, Denial>> for AuthorizationDecision {
    fn from(result: Result<ObjectPayload, Denial>) -> Self {
        match result {
            Ok(payload) => Self::Authorized(payload),
            Err(denial) => Self::Denied(denial),
        }
    }
}
