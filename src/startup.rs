use crate::{
    config::{Backend, Config},
    domain::PostRepository,
    errors::AppError,
    repositories::{RedisPostRepository, SqlPostRepository},
};
use aws_sdk_s3::{
    error::SdkError as S3SdkError,
    types::{BucketLocationConstraint, CreateBucketConfiguration},
    Client as S3Client,
};
use backoff::ExponentialBackoffBuilder;
use redis::aio::ConnectionManager;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::{path::Path, str::FromStr, sync::Arc, time::Duration};
use tracing;

const STARTUP_RETRY_WINDOW: Duration = Duration::from_secs(30);

/// Opens (creating if needed) the SQLite database behind `database_url`.
pub async fn connect_sqlite(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| AppError::ConfigError(format!("Invalid DATABASE_URL '{}': {}", database_url, e)))?
        .create_if_missing(true);

    if let Some(parent) = Path::new(options.get_filename()).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).map_err(|e| {
                AppError::InitError(format!("Failed to create database directory {:?}: {}", parent, e))
            })?;
            tracing::info!("Startup: Created database directory {:?}", parent);
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .map_err(|e| AppError::InitError(format!("Failed to open SQLite database: {}", e)))?;

    tracing::info!("Startup: Connected to SQLite database");
    Ok(pool)
}

/// Connects to Redis, retrying with exponential backoff while the server comes up.
pub async fn connect_redis(redis_url: &str) -> Result<ConnectionManager, AppError> {
    let client = redis::Client::open(redis_url)
        .map_err(|e| AppError::ConfigError(format!("Invalid REDIS_URL: {}", e)))?;

    let policy = ExponentialBackoffBuilder::new()
        .with_max_elapsed_time(Some(STARTUP_RETRY_WINDOW))
        .build();

    let manager = backoff::future::retry(policy, || {
        let client = client.clone();
        async move {
            let mut manager = ConnectionManager::new(client).await.map_err(|e| {
                tracing::warn!(error = %e, "Startup: Redis not reachable yet, retrying");
                backoff::Error::transient(e)
            })?;
            redis::cmd("PING")
                .query_async::<_, String>(&mut manager)
                .await
                .map_err(backoff::Error::transient)?;
            Ok::<_, backoff::Error<redis::RedisError>>(manager)
        }
    })
    .await
    .map_err(|e| AppError::InitError(format!("Failed to connect to Redis: {}", e)))?;

    tracing::info!("Startup: Connected to Redis");
    Ok(manager)
}

/// Builds the post repository for the configured backend, preparing its storage.
pub async fn build_post_repository(config: &Config) -> Result<Arc<dyn PostRepository>, AppError> {
    tracing::info!(backend = %config.backend, "Startup: Initializing post repository");
    match config.backend {
        Backend::Sql => {
            let pool = connect_sqlite(&config.database_url).await?;
            let repo = SqlPostRepository::new(pool);
            repo.init_schema()
                .await
                .map_err(|e| AppError::InitError(format!("{:#}", e)))?;
            Ok(Arc::new(repo))
        }
        Backend::Kv => {
            let manager = connect_redis(&config.redis_url).await?;
            Ok(Arc::new(RedisPostRepository::new(manager)))
        }
    }
}

/// Ensures the S3 bucket exists, creating it with the correct location constraint if needed.
pub async fn ensure_s3_bucket_exists(
    client: &S3Client,
    bucket_name: &str,
    region_str: &str,
) -> Result<(), AppError> {
    let bucket_config = if region_str != "us-east-1" {
        Some(
            CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(region_str))
                .build(),
        )
    } else {
        None
    };

    let mut create_bucket_req_builder = client.create_bucket().bucket(bucket_name);
    if let Some(config) = bucket_config {
        create_bucket_req_builder = create_bucket_req_builder.create_bucket_configuration(config);
    }

    match create_bucket_req_builder.send().await {
        Ok(_) => {
            tracing::info!("Startup: S3 bucket '{}' created.", bucket_name);
            Ok(())
        }
        Err(sdk_err) => {
            if let S3SdkError::ServiceError(service_err) = &sdk_err {
                let code = service_err.err().meta().code();
                if code == Some("BucketAlreadyOwnedByYou") || code == Some("BucketAlreadyExists") {
                    tracing::info!("Startup: S3 bucket '{}' already exists.", bucket_name);
                    return Ok(());
                }
            }
            let context = format!("Startup: Failed to create S3 bucket '{}'", bucket_name);
            tracing::error!("{}: {}", context, sdk_err);
            Err(AppError::InitError(format!("{}: {}", context, sdk_err)))
        }
    }
}
