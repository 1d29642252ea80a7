//! In-memory `ObjectStore`, immutable once built.

use async_trait::async_trait;
use bytes::Bytes;
use futures::{StreamExt, stream};
use std::{collections::HashMap, io};

use crate::{
    models::object::{ObjectMeta, ObjectPayload},
    services::object_store::{ObjectStore, StoreResult},
};

/// Bodies are yielded in slices of this size so consumers see a real stream.
const CHUNK_SIZE: usize = 16 * 1024;

#[derive(Clone, Debug)]
struct StoredObject {
    bytes: Bytes,
    content_type: Option<String>,
    etag: String,
}

#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    objects: HashMap<String, StoredObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(
        mut self,
        key: impl Into<String>,
        bytes: impl Into<Bytes>,
        content_type: Option<&str>,
    ) -> Self {
        let bytes = bytes.into();
        let etag = format!("{:x}", md5::compute(&bytes));
        self.objects.insert(
            key.into(),
            StoredObject {
                bytes,
                content_type: content_type.map(str::to_string),
                etag,
            },
        );
        self
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<ObjectPayload>> {
        let Some(obj) = self.objects.get(key) else {
            return Ok(None);
        };

        let meta = ObjectMeta {
            content_type: obj.content_type.clone(),
            size_bytes: Some(obj.bytes.len() as u64),
            etag: Some(obj.etag.clone()),
            last_modified: None,
        };

        let bytes = obj.bytes.clone();
        let chunks = (0..bytes.len())
            .step_by(CHUNK_SIZE)
            .map(move |start| {
                let end = (start + CHUNK_SIZE).min(bytes.len());
                Ok::<_, io::Error>(bytes.slice(start..end))
            })
            .collect::<Vec<_>>();

        Ok(Some(ObjectPayload::new(meta, stream::iter(chunks).boxed())))
    }
}
