//! src/services/disk_store.rs
//!
//! DiskStore: the gateway's durable backend. Metadata lives in SQLite, object
//! payloads on local disk sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`. The store is bound to one
//! bucket; the gateway only ever reads from it, `put_object` exists for the
//! operator's `put` command.

use crate::{
    models::{
        bucket::Bucket,
        object::{Object, ObjectMeta, ObjectPayload},
    },
    services::object_store::{ObjectStore, StoreError, StoreResult},
};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;
const DEFAULT_REGION: &str = "local";

const INIT_SCHEMA: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Clone)]
pub struct DiskStore {
    /// Shared SQLite connection pool used for metadata lookups.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// The single bucket every key is resolved in.
    pub bucket: String,
}

impl DiskStore {
    /// Create a store over `db` and `base_path`, serving keys from `bucket`.
    ///
    /// Fails if the bucket name could never exist on disk.
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        bucket: impl Into<String>,
    ) -> io::Result<Self> {
        let bucket = bucket.into();
        ensure_bucket_name_safe(&bucket)?;
        Ok(Self {
            db,
            base_path: base_path.into(),
            bucket,
        })
    }

    /// Compute the physical base folder path for the bucket.
    fn bucket_root(&self) -> PathBuf {
        self.base_path.join(&self.bucket)
    }

    /// Two-level shard identifiers: the first two bytes of MD5(bucket/key)
    /// as lowercase hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(&self.bucket, key);
        let mut path = self.bucket_root();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Fetch the bound bucket's metadata row, if it exists.
    async fn fetch_bucket(&self) -> StoreResult<Option<Bucket>> {
        let bucket = sqlx::query_as::<sqlx::sqlite::Sqlite, Bucket>(
            "SELECT id, name, region, created_at FROM buckets WHERE name = ?",
        )
        .bind(&self.bucket)
        .fetch_optional(&*self.db)
        .await?;
        Ok(bucket)
    }

    async fn require_bucket(&self) -> StoreResult<Bucket> {
        self.fetch_bucket()
            .await?
            .ok_or_else(|| StoreError::BucketNotFound(self.bucket.clone()))
    }

    /// Fetch a non-deleted object metadata record.
    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> StoreResult<Option<Object>> {
        let object = sqlx::query_as::<_, Object>(
            "SELECT id, bucket_id, key, content_type, size_bytes, etag,
                    last_modified, is_deleted
             FROM objects
             WHERE key = ? AND bucket_id = ? AND is_deleted = 0",
        )
        .bind(key)
        .bind(bucket.id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(object)
    }

    /// Create the bound bucket's row and directory if missing.
    pub async fn ensure_bucket(&self) -> StoreResult<Bucket> {
        if let Some(bucket) = self.fetch_bucket().await? {
            return Ok(bucket);
        }

        fs::create_dir_all(self.bucket_root()).await?;
        let bucket = Bucket {
            id: Uuid::new_v4(),
            name: self.bucket.clone(),
            region: DEFAULT_REGION.to_string(),
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO buckets (id, name, region, created_at) VALUES (?, ?, ?, ?)")
            .bind(bucket.id)
            .bind(&bucket.name)
            .bind(&bucket.region)
            .bind(bucket.created_at)
            .execute(&*self.db)
            .await?;

        debug!("created bucket {}", bucket.name);
        Ok(bucket)
    }

    /// Stream an object onto disk and upsert its metadata.
    ///
    /// Bytes go to a temporary file first (size and MD5 computed on the way),
    /// are fsynced, then renamed into place. Overwrites an existing key; if
    /// the metadata write fails the previous payload is put back.
    pub async fn put_object<S>(
        &self,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StoreResult<Object>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        if !is_key_safe(key) {
            return Err(StoreError::Io(io::Error::new(
                ErrorKind::InvalidInput,
                format!("invalid object key `{key}`"),
            )));
        }
        let bucket = self.ensure_bucket().await?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let (size_bytes, etag) = match write_stream(&tmp_path, stream).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        };

        // An overwrite keeps the previous payload reachable until the new row
        // is committed.
        let backup_path = parent.join(format!(".bak-{}", Uuid::new_v4()));
        let backup = match fs::hard_link(&file_path, &backup_path).await {
            Ok(()) => Some(backup_path),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StoreError::Io(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            discard_backup(backup.as_deref()).await;
            return Err(StoreError::Io(err));
        }

        let insert_result = sqlx::query_as::<_, Object>(
            r#"
            INSERT INTO objects (
                id, bucket_id, key, content_type, size_bytes,
                etag, last_modified, is_deleted
            ) VALUES (?, ?, ?, ?, ?, ?, ?, 0)
            ON CONFLICT(bucket_id, key) DO UPDATE SET
                content_type = excluded.content_type,
                size_bytes = excluded.size_bytes,
                etag = excluded.etag,
                last_modified = excluded.last_modified,
                is_deleted = 0
            RETURNING id, bucket_id, key, content_type, size_bytes,
                      etag, last_modified, is_deleted
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(bucket.id)
        .bind(key)
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        match insert_result {
            Ok(obj) => {
                discard_backup(backup.as_deref()).await;
                Ok(obj)
            }
            Err(err) => {
                let restored = match &backup {
                    Some(backup_path) => fs::rename(backup_path, &file_path).await,
                    None => fs::remove_file(&file_path).await,
                };
                if let Err(io_err) = restored {
                    tracing::error!(key, error = %io_err, "failed to roll back payload after metadata error");
                }
                Err(StoreError::Sqlx(err))
            }
        }
    }
}

#[async_trait]
impl ObjectStore for DiskStore {
    /// Look up `key` and open its payload for streaming.
    ///
    /// Keys the store would never accept, rows without a file behind them,
    /// and soft-deleted rows all read as absent.
    async fn get(&self, key: &str) -> StoreResult<Option<ObjectPayload>> {
        if !is_key_safe(key) {
            debug!(key, "rejected unsafe key as absent");
            return Ok(None);
        }

        let bucket = self.require_bucket().await?;
        let Some(object) = self.fetch_object(&bucket, key).await? else {
            return Ok(None);
        };

        let file = match File::open(self.object_path(key)).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(key, "metadata present but payload missing");
                return Ok(None);
            }
            Err(err) => return Err(StoreError::Io(err)),
        };

        // Content-Length follows the opened file, not the row.
        let mut meta = ObjectMeta::from(&object);
        meta.size_bytes = Some(file.metadata().await?.len());
        Ok(Some(ObjectPayload::new(meta, ReaderStream::new(file).boxed())))
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        self.require_bucket().await?;
        Ok(())
    }
}

/// Apply the embedded schema. Safe to run repeatedly.
pub async fn run_migrations(db: &SqlitePool) -> StoreResult<()> {
    let statements = INIT_SCHEMA
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }

    Ok(())
}

async fn discard_backup(backup: Option<&Path>) {
    if let Some(path) = backup {
        if let Err(err) = fs::remove_file(path).await {
            debug!(path = %path.display(), error = %err, "could not remove payload backup");
        }
    }
}

async fn write_stream<S>(path: &Path, stream: S) -> io::Result<(i64, String)>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: i64 = 0;
    let mut digest = Context::new();

    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as i64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok((size_bytes, format!("{:x}", digest.compute())))
}

/// Basic key validation against path traversal. Empty, oversized, absolute,
/// `..`-bearing and control-character keys are refused.
fn is_key_safe(key: &str) -> bool {
    !key.is_empty()
        && key.len() <= MAX_OBJECT_KEY_LEN
        && !key.starts_with('/')
        && !key.contains("..")
        && !key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
}

/// S3-like bucket naming: 3-63 chars of lowercase letters, digits, dots and
/// hyphens, alphanumeric at both ends.
fn ensure_bucket_name_safe(name: &str) -> io::Result<()> {
    let invalid = |reason: &str| {
        Err(io::Error::new(
            ErrorKind::InvalidInput,
            format!("bucket `{name}` invalid: {reason}"),
        ))
    };

    if name.len() < BUCKET_NAME_MIN_LEN || name.len() > BUCKET_NAME_MAX_LEN {
        return invalid("must be between 3 and 63 characters");
    }
    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
    {
        return invalid("allowed characters are lowercase letters, digits, dots, and hyphens");
    }
    if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
        return invalid("must start and end with a lowercase letter or digit");
    }
    if name.contains("..") {
        return invalid("cannot contain consecutive dots");
    }
    Ok(())
}
