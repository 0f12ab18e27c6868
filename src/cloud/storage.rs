//! Object storage publisher.
//!
//! Photos are uploaded with the storage JSON API's simple media upload and made
//! publicly readable in the same request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::DEFAULT_REQUEST_TIMEOUT;
use super::auth::TokenSource;
use crate::error::PublishError;
use crate::model::{CapturedArtifact, PublishedArtifact};

/// Base URL for upload requests.
const STORAGE_API_BASE: &str = "https://storage.googleapis.com";

/// Base URL for public object links.
const PUBLIC_BASE: &str = "https://storage.googleapis.com";

/// Uploads an artifact and returns a publicly resolvable reference.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    async fn publish(&self, artifact: &CapturedArtifact) -> Result<PublishedArtifact, PublishError>;
}

/// Publisher for a storage bucket.
#[derive(Clone)]
pub struct CloudStoragePublisher {
    client: reqwest::Client,
    api_base: String,
    public_base: String,
    bucket: String,
    tokens: Arc<dyn TokenSource>,
    timeout: Duration,
}

impl CloudStoragePublisher {
    pub fn new(bucket: &str, tokens: Arc<dyn TokenSource>) -> Self {
        Self::with_base_url(STORAGE_API_BASE, PUBLIC_BASE, bucket, tokens)
    }

    /// Create a publisher with custom endpoints (for emulators and testing).
    pub fn with_base_url(
        api_base: &str,
        public_base: &str,
        bucket: &str,
        tokens: Arc<dyn TokenSource>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            public_base: public_base.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            tokens,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Bound each upload request by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn upload_url(&self, remote_key: &str) -> String {
        format!(
            "{}/upload/storage/v1/b/{}/o?uploadType=media&name={}&predefinedAcl=publicRead",
            self.api_base,
            urlencoding::encode(&self.bucket),
            urlencoding::encode(remote_key)
        )
    }

    /// Public link for an object key. Path separators are kept.
    pub fn public_url(&self, remote_key: &str) -> String {
        let encoded: Vec<_> = remote_key
            .split('/')
            .map(urlencoding::encode)
            .collect();
        format!("{}/{}/{}", self.public_base, self.bucket, encoded.join("/"))
    }
}

#[async_trait]
impl ArtifactPublisher for CloudStoragePublisher {
    async fn publish(&self, artifact: &CapturedArtifact) -> Result<PublishedArtifact, PublishError> {
        let remote_key = artifact.remote_key();
        let bytes = tokio::fs::read(&artifact.path).await?;
        let token = self.tokens.access_token().await?;

        let response = self
            .client
            .post(self.upload_url(&remote_key))
            .timeout(self.timeout)
            .bearer_auth(token)
            .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
            .body(bytes)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let public_url = self.public_url(&remote_key);
        info!(key = %remote_key, url = %public_url, "Photo uploaded");

        Ok(PublishedArtifact {
            remote_key,
            public_url,
        })
    }
}
