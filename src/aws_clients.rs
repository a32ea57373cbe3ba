use crate::config::MediaConfig;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_s3::Client as S3Client;
use tracing;

// Builds the shared AWS SDK configuration for the media bucket's region.
// Credentials come from the default provider chain (env vars, profiles, etc.).
pub async fn create_sdk_config(media: &MediaConfig) -> SdkConfig {
    let region = Region::new(media.aws_region.clone());
    tracing::info!(sdk_region = %media.aws_region, "Setting SDK region");

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region);

    if let Some(endpoint_url) = &media.localstack_endpoint {
        tracing::info!("Using localstack endpoint override: {}", endpoint_url);
        config_loader = config_loader.endpoint_url(endpoint_url);
    } else {
        tracing::info!("Using default AWS endpoints and credential resolution.");
    }

    config_loader.load().await
}

// Path-style addressing keeps presigned URLs valid against LocalStack.
pub fn create_s3_client(sdk_config: &SdkConfig) -> S3Client {
    let s3_config = aws_sdk_s3::config::Builder::from(sdk_config)
        .force_path_style(true)
        .build();
    S3Client::from_conf(s3_config)
}
