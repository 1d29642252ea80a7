use bytes::Bytes;
use futures::{TryStreamExt, stream};
use media_gateway::services::{
    disk_store::{DiskStore, run_migrations},
    object_store::{ObjectStore, StoreError},
};
use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use std::{io, path::PathBuf, sync::Arc};
use uuid::Uuid;

struct Fixture {
    store: DiskStore,
    db: Arc<SqlitePool>,
    root: PathBuf,
}

impl Fixture {
    async fn new() -> Self {
        // A single connection keeps the in-memory database alive and shared.
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory sqlite");
        run_migrations(&db).await.expect("migrations");

        let db = Arc::new(db);
        let root = std::env::temp_dir().join(format!("media-gateway-test-{}", Uuid::new_v4()));
        let store = DiskStore::new(db.clone(), root.clone(), "media").expect("valid bucket");
        Self { store, db, root }
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.root);
    }
}

fn chunks(parts: &[&'static str]) -> impl futures::Stream<Item = io::Result<Bytes>> + Send {
    stream::iter(
        parts
            .iter()
            .map(|&p| Ok(Bytes::from_static(p.as_bytes())))
            .collect::<Vec<_>>(),
    )
}

async fn read_all(store: &DiskStore, key: &str) -> Option<Vec<u8>> {
    let payload = store.get(key).await.expect("store call")?;
    let parts: Vec<Bytes> = payload.body.try_collect().await.expect("body");
    Some(parts.concat())
}

/// Temporary and backup files left behind under `dir`.
fn staging_files(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).into_iter().flatten().flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if path.is_dir() {
            found.extend(staging_files(&path));
        } else if name.starts_with(".tmp-") || name.starts_with(".bak-") {
            found.push(path);
        }
    }
    found
}

#[tokio::test]
async fn put_then_get_round_trips_bytes_and_metadata() {
    let fx = Fixture::new().await;

    let object = fx
        .store
        .put_object(
            "videos/intro.mp4",
            Some("video/mp4".into()),
            chunks(&["hello ", "media ", "world"]),
        )
        .await
        .expect("put");
    assert_eq!(object.size_bytes, 17);
    assert_eq!(
        object.etag.as_deref(),
        Some(format!("{:x}", md5::compute(b"hello media world")).as_str())
    );

    let payload = fx.store.get("videos/intro.mp4").await.unwrap().expect("present");
    assert_eq!(payload.meta.content_type.as_deref(), Some("video/mp4"));
    assert_eq!(payload.meta.size_bytes, Some(17));
    assert!(payload.meta.last_modified.is_some());

    let body: Vec<Bytes> = payload.body.try_collect().await.unwrap();
    assert_eq!(body.concat(), b"hello media world");
}

#[tokio::test]
async fn overwrite_replaces_payload() {
    let fx = Fixture::new().await;

    fx.store
        .put_object("a.txt", None, chunks(&["first"]))
        .await
        .unwrap();
    fx.store
        .put_object("a.txt", Some("text/plain".into()), chunks(&["second"]))
        .await
        .unwrap();

    assert_eq!(read_all(&fx.store, "a.txt").await.unwrap(), b"second");
    assert!(staging_files(&fx.root).is_empty());
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM objects")
        .fetch_one(&*fx.db)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn absent_and_unsafe_keys_read_as_none() {
    let fx = Fixture::new().await;
    fx.store.ensure_bucket().await.unwrap();

    for key in ["", "missing.mp4", "/abs", "../escape", "a\\b"] {
        assert!(fx.store.get(key).await.unwrap().is_none(), "key {key:?}");
    }
}

#[tokio::test]
async fn soft_deleted_rows_are_absent() {
    let fx = Fixture::new().await;
    fx.store
        .put_object("gone.bin", None, chunks(&["x"]))
        .await
        .unwrap();

    sqlx::query("UPDATE objects SET is_deleted = 1 WHERE key = ?")
        .bind("gone.bin")
        .execute(&*fx.db)
        .await
        .unwrap();

    assert!(fx.store.get("gone.bin").await.unwrap().is_none());
}

#[tokio::test]
async fn row_without_payload_file_is_absent() {
    let fx = Fixture::new().await;
    fx.store
        .put_object("orphan.bin", None, chunks(&["x"]))
        .await
        .unwrap();
    std::fs::remove_dir_all(fx.root.join("media")).unwrap();

    assert!(fx.store.get("orphan.bin").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_bucket_is_a_store_error_not_absence() {
    let fx = Fixture::new().await;

    let err = fx.store.get("anything.mp4").await.unwrap_err();
    assert!(matches!(err, StoreError::BucketNotFound(ref b) if b == "media"));
    assert!(fx.store.ping().await.is_err());

    fx.store.ensure_bucket().await.unwrap();
    assert!(fx.store.ping().await.is_ok());
}

#[tokio::test]
async fn unsafe_keys_are_refused_on_put() {
    let fx = Fixture::new().await;
    assert!(fx.store.put_object("../x", None, chunks(&["x"])).await.is_err());
    assert!(fx.store.put_object("", None, chunks(&["x"])).await.is_err());
}

#[tokio::test]
async fn failed_upload_leaves_nothing_behind() {
    let fx = Fixture::new().await;
    let failing = stream::iter(vec![
        Ok(Bytes::from_static(b"partial")),
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "client went away")),
    ]);

    assert!(fx.store.put_object("broken.bin", None, failing).await.is_err());
    assert!(fx.store.get("broken.bin").await.unwrap().is_none());
    assert!(staging_files(&fx.root).is_empty());
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let fx = Fixture::new().await;
    run_migrations(&fx.db).await.expect("second run");
}

#[tokio::test]
async fn invalid_bucket_names_are_rejected() {
    let db = SqlitePoolOptions::new().connect_lazy("sqlite::memory:").unwrap();
    assert!(DiskStore::new(Arc::new(db), "/tmp", "No_Such").is_err());
}

#[tokio::test]
async fn failed_overwrite_keeps_the_previous_payload() {
    let fx = Fixture::new().await;
    fx.store
        .put_object("keep.bin", Some("video/mp4".into()), chunks(&["original"]))
        .await
        .unwrap();

    sqlx::query(
        "CREATE TRIGGER reject_updates BEFORE UPDATE ON objects
         BEGIN SELECT RAISE(ABORT, 'metadata write refused'); END",
    )
    .execute(&*fx.db)
    .await
    .unwrap();

    let err = fx
        .store
        .put_object("keep.bin", None, chunks(&["replacement"]))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Sqlx(_)));

    sqlx::query("DROP TRIGGER reject_updates")
        .execute(&*fx.db)
        .await
        .unwrap();

    let payload = fx.store.get("keep.bin").await.unwrap().expect("still present");
    assert_eq!(payload.meta.size_bytes, Some(8));
    assert_eq!(payload.meta.content_type.as_deref(), Some("video/mp4"));
    assert_eq!(read_all(&fx.store, "keep.bin").await.unwrap(), b"original");
    assert!(staging_files(&fx.root).is_empty());
}
