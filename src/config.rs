use axum::http::HeaderValue;
use clap::{Parser, ValueEnum};
use std::{env, fmt, net::SocketAddr, str::FromStr, time::Duration};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingVar(String),
    #[error("Invalid environment variable format for {0}: {1}")]
    InvalidVar(String, String),
}

/// Which store backs the post repository.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// Relational tables in SQLite.
    Sql,
    /// Normalized keys in Redis.
    Kv,
}

impl Backend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::Sql => "sql",
            Backend::Kv => "kv",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sql" | "sqlite" | "relational" => Ok(Backend::Sql),
            "kv" | "redis" => Ok(Backend::Kv),
            other => Err(format!("unknown backend `{}` (expected `sql` or `kv`)", other)),
        }
    }
}

/// Command-line overrides; anything left unset falls back to the environment.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Social feed API")]
pub struct Args {
    /// Address to bind to (overrides BIND_ADDRESS)
    #[arg(long)]
    pub bind: Option<String>,

    /// Storage backend (overrides FEED_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// SQLite database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Redis URL (overrides REDIS_URL)
    #[arg(long)]
    pub redis_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct MediaConfig {
    pub bucket_name: String,
    pub aws_region: String,
    // Optional endpoint for LocalStack
    pub localstack_endpoint: Option<String>,
    pub public_base_url: String,
    pub upload_url_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub backend: Backend,
    pub database_url: String,
    pub redis_url: String,
    pub feed_limit: usize,
    pub cors_allowed_origin: HeaderValue,
    pub media: MediaConfig,
}

impl Config {
    /// Loads configuration from CLI arguments and environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignores errors, relies on env vars otherwise)
        dotenvy::dotenv().ok();

        Self::from_sources(Args::parse(), |key| env::var(key).ok())
    }

    /// Builds the configuration from parsed arguments and a variable lookup.
    pub fn from_sources<F>(args: Args, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_address_str = args
            .bind
            .or_else(|| lookup("BIND_ADDRESS"))
            .unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = SocketAddr::from_str(&bind_address_str)
            .map_err(|e| ConfigError::InvalidVar("BIND_ADDRESS".into(), e.to_string()))?;

        let backend = match args.backend {
            Some(backend) => backend,
            None => parse_or("FEED_BACKEND", &lookup, Backend::Sql)?,
        };

        let database_url = args
            .database_url
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| "sqlite://./data/feed.db".to_string());
        let redis_url = args
            .redis_url
            .or_else(|| lookup("REDIS_URL"))
            .unwrap_or_else(|| "redis://127.0.0.1:6379".to_string());

        let feed_limit: usize = parse_or("FEED_LIMIT", &lookup, 50)?;
        if feed_limit == 0 {
            return Err(ConfigError::InvalidVar("FEED_LIMIT".into(), "must be positive".into()));
        }

        let origin = lookup("CORS_ALLOWED_ORIGIN")
            .unwrap_or_else(|| "https://stenoip.github.io".to_string());
        let cors_allowed_origin = HeaderValue::from_str(&origin)
            .map_err(|e| ConfigError::InvalidVar("CORS_ALLOWED_ORIGIN".into(), e.to_string()))?;

        let bucket_name = lookup("MEDIA_BUCKET_NAME")
            .ok_or_else(|| ConfigError::MissingVar("MEDIA_BUCKET_NAME".into()))?;
        let aws_region = lookup("AWS_DEFAULT_REGION").unwrap_or_else(|| "ca-central-1".to_string());
        let localstack_endpoint = lookup("AWS_ENDPOINT_URL");
        let public_base_url = lookup("MEDIA_PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("https://{}.s3.{}.amazonaws.com", bucket_name, aws_region));
        let ttl_secs: u64 = parse_or("UPLOAD_URL_TTL_SECS", &lookup, 900)?;

        Ok(Config {
            bind_address,
            backend,
            database_url,
            redis_url,
            feed_limit,
            cors_allowed_origin,
            media: MediaConfig {
                bucket_name,
                aws_region,
                localstack_endpoint,
                public_base_url,
                upload_url_ttl: Duration::from_secs(ttl_secs),
            },
        })
    }
}

fn parse_or<T, F>(key: &str, lookup: &F, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| ConfigError::InvalidVar(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}
