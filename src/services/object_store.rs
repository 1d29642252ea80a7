//! The seam between the gateway and whatever holds the media bytes.

use async_trait::async_trait;
use std::io;
use thiserror::Error;

use crate::models::object::ObjectPayload;

/// Failures other than absence. These never mean "the object does not exist".
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("object store call timed out")]
    Timeout,
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Key-based read access to a backing object store.
///
/// `get` returns `Ok(None)` for any key the store does not hold, including
/// keys it would never accept. Errors are reserved for the store itself
/// misbehaving.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn get(&self, key: &str) -> StoreResult<Option<ObjectPayload>>;

    /// Cheap readiness probe.
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
