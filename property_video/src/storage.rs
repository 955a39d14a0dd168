//! Optional upload of finished videos to S3 or an S3-compatible store such
//! as Supabase Storage.

use std::path::{Path, PathBuf};

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::{ByteStream, ByteStreamError};
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: ByteStreamError,
    },

    #[error("upload of {key} failed: {message}")]
    Upload { key: String, message: String },
}

/// Storage settings read from the environment. Uploads are disabled unless
/// `STORAGE_BUCKET` is set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub storage_endpoint_url: Option<String>,
    #[serde(default)]
    pub storage_public_base_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl ObjectStorage {
    pub fn new(
        client: aws_sdk_s3::Client,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url: public_base_url
                .map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// `None` when no bucket is configured.
    pub fn from_config(
        aws_config: &aws_config::SdkConfig,
        config: &StorageConfig,
    ) -> Option<Self> {
        let Some(bucket) = config.storage_bucket.as_deref() else {
            tracing::debug!("Storage bucket not configured; uploads disabled.");
            return None;
        };

        let mut builder = aws_sdk_s3::config::Builder::from(aws_config);
        if let Some(endpoint) = config.storage_endpoint_url.as_deref() {
            // S3-compatible services generally need path-style addressing
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        tracing::info!("Object storage enabled for bucket {}", bucket);

        Some(Self::new(
            aws_sdk_s3::Client::from_conf(builder.build()),
            bucket,
            config.storage_public_base_url.clone(),
        ))
    }

    pub fn public_url(&self, key: &str) -> String {
        let key = key.trim_start_matches('/');
        self.public_base_url.as_ref().map_or_else(
            || format!("https://{}.s3.amazonaws.com/{key}", self.bucket),
            |base| format!("{base}/{key}"),
        )
    }

    /// Upload a local file and return its public URL.
    ///
    /// # Errors
    /// `FileNotFound` if `path` does not exist, otherwise read or upload
    /// failures.
    #[tracing::instrument(skip(self))]
    pub async fn upload_file(
        &self,
        key: &str,
        path: &Path,
        content_type: &str,
        cache_control: Option<&str>,
    ) -> Result<String, StorageError> {
        if !path.exists() {
            return Err(StorageError::FileNotFound(path.to_path_buf()));
        }

        let body = ByteStream::from_path(path)
            .await
            .map_err(|source| StorageError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .set_cache_control(cache_control.map(ToString::to_string))
            .body(body)
            .send()
            .await
            .map_err(|e| {
                let message = DisplayErrorContext(&e).to_string();
                tracing::warn!("Upload failed for {}: {}", key, message);
                StorageError::Upload {
                    key: key.to_string(),
                    message,
                }
            })?;

        let url = self.public_url(key);
        tracing::info!("Uploaded {} to {}", path.display(), url);

        Ok(url)
    }
}
