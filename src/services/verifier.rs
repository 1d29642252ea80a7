//! Credential verification (HS256 signed tokens).
//!
//! The secret is handed in once at construction and never changes; the
//! verifier is shared read-only across all concurrent requests.

use jsonwebtoken::{Algorithm, DecodingKey, Validation, errors::ErrorKind};
use std::fmt;
use thiserror::Error;

use crate::models::claims::Claims;

/// Internal reason a credential was rejected. All of them surface as the
/// same status; they only differ in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyFailure {
    #[error("malformed")]
    Malformed,
    #[error("signature-mismatch")]
    SignatureMismatch,
    #[error("expired")]
    Expired,
}

impl From<&jsonwebtoken::errors::Error> for VerifyFailure {
    fn from(err: &jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            ErrorKind::InvalidSignature => VerifyFailure::SignatureMismatch,
            ErrorKind::ExpiredSignature => VerifyFailure::Expired,
            _ => VerifyFailure::Malformed,
        }
    }
}

/// Outcome of verifying one credential.
#[derive(Debug, Clone)]
pub enum Verification {
    Verified(Claims),
    Failed(VerifyFailure),
}

/// HMAC-SHA256 token verifier.
///
/// Signature comparison is delegated to `jsonwebtoken`, which checks the
/// MAC in constant time.
#[derive(Clone)]
pub struct CredentialVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("CredentialVerifier")
            .field("validation", &self.validation)
            .finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    /// `leeway_secs` is the clock skew tolerated on `exp`.
    pub fn new(secret: &[u8], leeway_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = leeway_secs;
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret),
            validation,
        }
    }

    pub fn verify(&self, token: &str) -> Verification {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Verification::Verified(data.claims),
            Err(err) => {
                tracing::debug!(error = %err, "jwt decode failed");
                Verification::Failed(VerifyFailure::from(&err))
            }
        }
    }
}
