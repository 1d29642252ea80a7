use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};

const ENV_PREFIX: &str = "MEDIA_GATEWAY_";

/// Centralized application configuration.
/// Combines environment variables and CLI arguments; CLI wins.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub bucket: String,
    pub store_timeout: Duration,
    pub token_leeway_secs: u64,
    /// Shared verification secret. Environment only, never a CLI flag.
    jwt_secret: Option<String>,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("bucket", &self.bucket)
            .field("store_timeout", &self.store_timeout)
            .field("token_leeway_secs", &self.token_leeway_secs)
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Authorizing edge gateway for paid media objects")]
pub struct Args {
    /// Host to bind to (overrides MEDIA_GATEWAY_HOST)
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Port to bind to (overrides MEDIA_GATEWAY_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// Directory where object payloads are stored (overrides MEDIA_GATEWAY_STORAGE_DIR)
    #[arg(long, global = true)]
    pub storage_dir: Option<String>,

    /// Metadata database URL (overrides MEDIA_GATEWAY_DATABASE_URL)
    #[arg(long, global = true)]
    pub database_url: Option<String>,

    /// Bucket objects are served from (overrides MEDIA_GATEWAY_BUCKET)
    #[arg(long, global = true)]
    pub bucket: Option<String>,

    /// Object store call timeout in milliseconds (overrides MEDIA_GATEWAY_STORE_TIMEOUT_MS)
    #[arg(long, global = true)]
    pub store_timeout_ms: Option<u64>,

    /// Clock skew tolerated on token expiry (overrides MEDIA_GATEWAY_TOKEN_LEEWAY_SECS)
    #[arg(long, global = true)]
    pub token_leeway_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve media (default)
    Serve,
    /// Apply the metadata schema and exit
    Migrate,
    /// Ingest a local file into the configured bucket
    Put {
        /// Object key, e.g. `videos/intro.mp4`
        #[arg(long)]
        key: String,
        /// Path of the file to upload
        #[arg(long)]
        file: PathBuf,
        /// Stored content type; served as application/octet-stream when omitted
        #[arg(long)]
        content_type: Option<String>,
    },
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and the command to run.
    pub fn from_env_and_args() -> Result<(Self, Command)> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed args over an environment lookup.
    pub fn resolve(args: Args, env: impl Fn(&str) -> Option<String>) -> Result<(Self, Command)> {
        let var = |name: &str| env(&format!("{ENV_PREFIX}{name}"));

        let cfg = Self {
            host: args
                .host
                .or_else(|| var("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port: pick(args.port, var("PORT"), "PORT", 8787)?,
            storage_dir: args
                .storage_dir
                .or_else(|| var("STORAGE_DIR"))
                .unwrap_or_else(|| "./data/objects".into()),
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/meta/media_gateway.db".into()),
            bucket: args
                .bucket
                .or_else(|| var("BUCKET"))
                .unwrap_or_else(|| "media".into()),
            store_timeout: Duration::from_millis(pick(
                args.store_timeout_ms,
                var("STORE_TIMEOUT_MS"),
                "STORE_TIMEOUT_MS",
                5000,
            )?),
            token_leeway_secs: pick(
                args.token_leeway_secs,
                var("TOKEN_LEEWAY_SECS"),
                "TOKEN_LEEWAY_SECS",
                0,
            )?,
            jwt_secret: var("JWT_SECRET"),
        };

        if cfg.store_timeout.is_zero() {
            bail!("{ENV_PREFIX}STORE_TIMEOUT_MS must be greater than zero");
        }

        Ok((cfg, args.command.unwrap_or(Command::Serve)))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The verification secret, required only when serving.
    pub fn jwt_secret(&self) -> Result<&[u8]> {
        match self.jwt_secret.as_deref() {
            Some(secret) if !secret.is_empty() => Ok(secret.as_bytes()),
            Some(_) => bail!("{ENV_PREFIX}JWT_SECRET is empty"),
            None => bail!("{ENV_PREFIX}JWT_SECRET is not set"),
        }
    }
}

/// CLI value, else parsed environment value, else default.
fn pick<T>(cli: Option<T>, env_value: Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    if let Some(value) = cli {
        return Ok(value);
    }
    match env_value {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("parsing {ENV_PREFIX}{name} value `{raw}`")),
        None => Ok(default),
    }
}
