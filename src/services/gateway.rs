//! The authorization pipeline: extract, verify, gate, resolve.
//!
//! Every request runs the stages in order and stops at the first failure.
//! Nothing is remembered between requests; the gateway itself is immutable
//! after construction and shared by all of them.

use axum::http::{HeaderMap, Uri};
use std::{sync::Arc, time::Duration};

use crate::{
    errors::Denial,
    models::{decision::AuthorizationDecision, object::ObjectPayload},
    services::{
        credentials, entitlement,
        object_store::{ObjectStore, StoreError},
        verifier::{CredentialVerifier, Verification},
    },
};

#[derive(Clone)]
pub struct MediaGateway {
    verifier: Arc<CredentialVerifier>,
    store: Arc<dyn ObjectStore>,
    store_timeout: Duration,
}

impl MediaGateway {
    pub fn new(
        verifier: CredentialVerifier,
        store: Arc<dyn ObjectStore>,
        store_timeout: Duration,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            store,
            store_timeout,
        }
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    /// Run the whole pipeline for one request and return its single
    /// terminal decision.
    pub async fn authorize(&self, headers: &HeaderMap, uri: &Uri) -> AuthorizationDecision {
        self.run(headers, uri).await.into()
    }

    async fn run(&self, headers: &HeaderMap, uri: &Uri) -> Result<ObjectPayload, Denial> {
        let token = credentials::extract_credential(headers, uri).ok_or_else(|| {
            tracing::info!(path = uri.path(), "request without credential");
            Denial::MissingCredential
        })?;

        let claims = match self.verifier.verify(&token) {
            Verification::Verified(claims) => claims,
            Verification::Failed(reason) => {
                tracing::warn!(%reason, path = uri.path(), "credential verification failed");
                return Err(Denial::InvalidCredential(reason));
            }
        };

        if let Err(denial) = entitlement::check(&claims) {
            tracing::info!(
                sub = claims.sub.as_deref().unwrap_or("-"),
                path = uri.path(),
                "credential lacks paid entitlement"
            );
            return Err(denial);
        }

        let key = object_key(uri);
        self.resolve(key).await
    }

    async fn resolve(&self, key: &str) -> Result<ObjectPayload, Denial> {
        let lookup = tokio::time::timeout(self.store_timeout, self.store.get(key)).await;

        match lookup {
            Ok(Ok(Some(payload))) => {
                tracing::debug!(key, "object resolved");
                Ok(payload)
            }
            Ok(Ok(None)) => {
                tracing::debug!(key, "object absent");
                Err(Denial::ObjectAbsent)
            }
            Ok(Err(err)) => {
                tracing::error!(key, error = %err, "object store lookup failed");
                Err(Denial::StoreUnavailable(err))
            }
            Err(_) => {
                tracing::error!(
                    key,
                    timeout_ms = self.store_timeout.as_millis() as u64,
                    "object store lookup timed out"
                );
                Err(Denial::StoreUnavailable(StoreError::Timeout))
            }
        }
    }
}

/// The object key is the request path without its leading separator.
pub fn object_key(uri: &Uri) -> &str {
    let path = uri.path();
    path.strip_prefix('/').unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::{memory_store::MemoryStore, verifier::VerifyFailure};
    use axum::http::{HeaderValue, header};
    use chrono::Utc;
    use jsonwebtoken::{Algorithm, EncodingKey, Header};
    use serde_json::{Value, json};

    const SECRET: &[u8] = b"gateway-unit-secret";

    fn gateway() -> MediaGateway {
        let store = MemoryStore::new().with_object("clip.webm", "clip", Some("video/webm"));
        MediaGateway::new(
            CredentialVerifier::new(SECRET, 0),
            Arc::new(store),
            Duration::from_secs(1),
        )
    }

    fn bearer(is_paid: Value) -> HeaderMap {
        let exp = Utc::now().timestamp() + 300;
        let token = jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            &json!({"sub": "u-7", "isPaid": is_paid, "exp": exp}),
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    async fn decide(headers: &HeaderMap, uri: &str) -> AuthorizationDecision {
        gateway().authorize(headers, &uri.parse::<Uri>().unwrap()).await
    }

    #[tokio::test]
    async fn each_stage_has_its_own_denial() {
        assert!(matches!(
            decide(&HeaderMap::new(), "/clip.webm").await,
            AuthorizationDecision::Denied(Denial::MissingCredential)
        ));
        assert!(matches!(
            decide(&HeaderMap::new(), "/clip.webm?token=a.b.c").await,
            AuthorizationDecision::Denied(Denial::InvalidCredential(VerifyFailure::Malformed))
        ));
        assert!(matches!(
            decide(&bearer(json!(false)), "/clip.webm").await,
            AuthorizationDecision::Denied(Denial::InsufficientEntitlement)
        ));
        assert!(matches!(
            decide(&bearer(json!(true)), "/other.webm").await,
            AuthorizationDecision::Denied(Denial::ObjectAbsent)
        ));
    }

    #[tokio::test]
    async fn entitled_request_is_authorized() {
        match decide(&bearer(json!(true)), "/clip.webm").await {
            AuthorizationDecision::Authorized(payload) => {
                assert_eq!(payload.meta.content_type.as_deref(), Some("video/webm"));
            }
            AuthorizationDecision::Denied(denial) => panic!("unexpected denial: {denial}"),
        }
    }

    #[test]
    fn key_strips_one_leading_slash() {
        let cases = [
            ("/", ""),
            ("/intro.mp4", "intro.mp4"),
            ("/videos/2025/intro.mp4?token=x", "videos/2025/intro.mp4"),
        ];
        for (uri, key) in cases {
            let uri: Uri = uri.parse().unwrap();
            assert_eq!(object_key(&uri), key);
        }
    }
}
