use anyhow::{Context, Result};
use media_gateway::{
    build_app,
    config::{AppConfig, Command},
    services::{
        disk_store::{self, DiskStore},
        gateway::MediaGateway,
        verifier::CredentialVerifier,
    },
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::{fs::File, net::TcpListener};
use tokio_util::io::ReaderStream;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;
    tracing::info!("Starting media-gateway with config: {:?}", cfg);

    // --- Ensure storage directory exists ---
    if !Path::new(&cfg.storage_dir).exists() {
        std::fs::create_dir_all(&cfg.storage_dir)?;
        tracing::info!("Created storage directory at {}", cfg.storage_dir);
    }

    // --- Initialize SQLite connection ---
    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    if let Some(parent) = connect_options.get_filename().parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .context("connecting to metadata database")?,
    );

    let store = DiskStore::new(db.clone(), cfg.storage_dir.clone(), cfg.bucket.clone())?;

    match command {
        Command::Migrate => {
            disk_store::run_migrations(&db).await?;
            tracing::info!("Database migration complete.");
            Ok(())
        }
        Command::Put {
            key,
            file,
            content_type,
        } => {
            let reader = File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;
            let object = store
                .put_object(&key, content_type, ReaderStream::new(reader))
                .await?;
            tracing::info!(
                key = %object.key,
                size_bytes = object.size_bytes,
                etag = object.etag.as_deref().unwrap_or("-"),
                "object stored in bucket {}",
                cfg.bucket
            );
            Ok(())
        }
        Command::Serve => serve(&cfg, store).await,
    }
}

async fn serve(cfg: &AppConfig, store: DiskStore) -> Result<()> {
    // --- Build the gateway: secret + store handle, fixed for the process ---
    let verifier = CredentialVerifier::new(cfg.jwt_secret()?, cfg.token_leeway_secs);
    let gateway = MediaGateway::new(verifier, Arc::new(store), cfg.store_timeout);
    if let Err(err) = gateway.store().ping().await {
        tracing::warn!(error = %err, "object store not ready yet; serving anyway");
    }

    let app = build_app(gateway);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
