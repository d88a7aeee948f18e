use super::ObjectStore;
use crate::config::ArchiveConfig;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use ::s3::bucket::Bucket;
use ::s3::creds::Credentials;
use ::s3::region::Region;
use tracing::{debug, info};

/// Amazon S3 (or S3-compatible) archive destination.
pub struct S3Store {
    bucket: Box<Bucket>,
}

impl S3Store {
    /// Connect to the configured bucket. Credentials come from the environment
    /// (`AWS_ACCESS_KEY_ID`, profiles, ...).
    pub fn new(config: &ArchiveConfig) -> Result<Self> {
        let credentials = Credentials::default().context("Failed to resolve S3 credentials")?;
        Self::with_credentials(config, credentials)
    }

    pub fn with_credentials(config: &ArchiveConfig, credentials: Credentials) -> Result<Self> {
        if config.bucket.trim().is_empty() {
            bail!("archive bucket name must not be empty");
        }

        let region = match &config.endpoint {
            Some(endpoint) => Region::Custom {
                region: config.region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .region
                .parse::<Region>()
                .context(format!("Invalid S3 region: {}", config.region))?,
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .context(format!("Failed to open bucket {}", config.bucket))?;

        // Custom endpoints are mostly MinIO/LocalStack, which want path-style URLs.
        let bucket = if config.endpoint.is_some() {
            bucket.with_path_style()
        } else {
            bucket
        };

        info!(bucket = %config.bucket, region = %config.region, endpoint = ?config.endpoint, "S3 archive store ready");
        Ok(Self { bucket })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket.name
    }

    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        let response = self
            .bucket
            .put_object_with_content_type(key, &body, content_type)
            .await
            .context(format!("PUT s3://{}/{} failed", self.bucket.name, key))?;

        let status = response.status_code();
        if !(200..300).contains(&status) {
            bail!(
                "PUT s3://{}/{} returned status {}: {}",
                self.bucket.name,
                key,
                status,
                String::from_utf8_lossy(response.as_slice())
            );
        }

        debug!(key = %key, status, "Object written");
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        let response = self
            .bucket
            .delete_object(key)
            .await
            .context(format!("DELETE s3://{}/{} failed", self.bucket.name, key))?;

        // S3 answers 204 whether or not the key existed
        let status = response.status_code();
        if !(200..300).contains(&status) {
            bail!(
                "DELETE s3://{}/{} returned status {}: {}",
                self.bucket.name,
                key,
                status,
                String::from_utf8_lossy(response.as_slice())
            );
        }

        debug!(key = %key, status, "Object deleted");
        Ok(())
    }
}
