use anyhow::{bail, Result};

pub const DEFAULT_REGION: &str = "us-east-1";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Destination of archived records. Built once at startup and handed to the transform.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArchiveConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores (MinIO, LocalStack, ...).
    pub endpoint: Option<String>,
    pub content_type: String,
}

impl ArchiveConfig {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            content_type: JSON_CONTENT_TYPE.to_string(),
        }
    }

    /// Read `CDC_ARCHIVE_BUCKET`, `CDC_ARCHIVE_REGION` and `CDC_ARCHIVE_ENDPOINT`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an explicit variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bucket = lookup("CDC_ARCHIVE_BUCKET").unwrap_or_default();
        if bucket.trim().is_empty() {
            bail!("CDC_ARCHIVE_BUCKET is not set - no archive destination configured");
        }

        let mut config = Self::new(bucket);
        if let Some(region) = lookup("CDC_ARCHIVE_REGION").filter(|r| !r.is_empty()) {
            config.region = region;
        }
        config.endpoint = lookup("CDC_ARCHIVE_ENDPOINT").filter(|e| !e.is_empty());

        Ok(config)
    }
}
