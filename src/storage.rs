use crate::{
    config::MediaConfig,
    domain::MediaStorage,
    errors::StorageError,
    models::UploadUrls,
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_s3::{presigning::PresigningConfig, Client as S3Client};
use chrono::Utc;
use std::time::Duration;
use tracing;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct S3MediaStorage {
    client: S3Client,
    bucket_name: String,
    public_base_url: String,
    upload_url_ttl: Duration,
}

impl S3MediaStorage {
    pub fn new(client: S3Client, media: &MediaConfig) -> Self {
        Self {
            client,
            bucket_name: media.bucket_name.clone(),
            public_base_url: media.public_base_url.trim_end_matches('/').to_string(),
            upload_url_ttl: media.upload_url_ttl,
        }
    }
}

#[async_trait]
impl MediaStorage for S3MediaStorage {
    /// Presigns a PutObject for a fresh key under `media/`.
    async fn create_upload_url(
        &self,
        filename: &str,
        content_type: &str,
    ) -> Result<UploadUrls, StorageError> {
        let suffix = Uuid::new_v4().simple().to_string();
        let key = media_key(Utc::now().timestamp_millis(), &suffix[..12], filename);
        tracing::debug!(s3_key = %key, bucket = %self.bucket_name, %content_type, "S3: Presigning upload");

        let presigning = PresigningConfig::expires_in(self.upload_url_ttl)
            .map_err(|e| StorageError::PresignFailed(e.to_string()))?;

        let request = self
            .client
            .put_object()
            .bucket(&self.bucket_name)
            .key(&key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .context(format!("S3: Failed to presign upload for key '{}'", key))
            .map_err(StorageError::BackendError)?;

        Ok(UploadUrls {
            upload_url: request.uri().to_string(),
            blob_url: format!("{}/{}", self.public_base_url, key),
        })
    }
}

/// Object key for an uploaded file: `media/{millis}-{random}-{name}`.
/// Only the last path segment of `filename` is kept.
pub fn media_key(unix_millis: i64, random: &str, filename: &str) -> String {
    let name = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|n| !n.is_empty())
        .unwrap_or("upload");
    format!("media/{}-{}-{}", unix_millis, random, name)
}
