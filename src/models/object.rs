//! Objects as the gateway sees them: a metadata row in the disk backend and
//! the transient payload handed to the response assembler.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::{fmt, io};
use uuid::Uuid;

/// Metadata row for a single object (blob) within a bucket.
///
/// The row stores metadata only; payload bytes live on disk.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Object {
    /// Internal UUID for DB indexing.
    pub id: Uuid,

    /// Foreign key linking to the parent bucket.
    pub bucket_id: Uuid,

    /// Object key (path-like identifier within the bucket).
    pub key: String,

    /// Content type (MIME type) recorded at ingest.
    pub content_type: Option<String>,

    /// Size in bytes.
    pub size_bytes: i64,

    /// MD5 checksum of the payload.
    pub etag: Option<String>,

    /// Timestamp when object was last written.
    pub last_modified: DateTime<Utc>,

    /// Whether the object is marked as deleted.
    pub is_deleted: bool,
}

/// Lazy, single-use byte stream of an object's payload.
pub type ObjectBody = BoxStream<'static, io::Result<Bytes>>;

/// Response-relevant metadata of a fetched object. Every field is optional
/// because backends differ in what they record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ObjectMeta {
    pub content_type: Option<String>,
    pub size_bytes: Option<u64>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl From<&Object> for ObjectMeta {
    fn from(obj: &Object) -> Self {
        Self {
            content_type: obj.content_type.clone(),
            size_bytes: u64::try_from(obj.size_bytes).ok(),
            etag: obj.etag.clone(),
            last_modified: Some(obj.last_modified),
        }
    }
}

/// An object fetched from the backing store, owned only for the duration of
/// one response.
pub struct ObjectPayload {
    pub meta: ObjectMeta,
    pub body: ObjectBody,
}

impl ObjectPayload {
    pub fn new(meta: ObjectMeta, body: ObjectBody) -> Self {
        Self { meta, body }
    }
}

impl fmt::Debug for ObjectPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The body is an opaque stream.
        f.debug_struct("ObjectPayload")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}
