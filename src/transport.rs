//! HTTP access to the upstream services
//!
//! Adapters never touch `reqwest` directly. They go through [`Transport`], so
//! tests can swap in stubs that count attempts or fail on demand.

use std::path::Path;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::{Result, RetrievalError};

/// Minimal GET-only transport used by every adapter
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` and return the whole body
    ///
    /// Any non-2xx status is an error.
    async fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Fetch `url` into the file at `path`, returning the number of bytes written
    async fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let body = self.get(url).await?;
        tokio_fs::write(path, &body)
            .await
            .map_err(|e| RetrievalError::IoError {
                message: format!("Failed to write {}: {}", path.display(), e),
            })?;
        Ok(body.len() as u64)
    }
}

/// `reqwest`-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Build a client with the configured user agent and timeout
    ///
    /// Idle connections are not pooled, so nothing outlives a call.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.effective_user_agent())
            .timeout(config.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| {
                RetrievalError::configuration(format!("Failed to create HTTP client: {e}"))
            })?;

        Ok(Self { client })
    }

    /// Wrap an existing `reqwest` client
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn send(&self, url: &str) -> Result<reqwest::Response> {
        debug!("Making API request to: {url}");
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(RetrievalError::from_status(response.status()));
        }

        Ok(response)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.send(url).await?;
        let body = response.bytes().await?;
        Ok(body.to_vec())
    }

    async fn download_to(&self, url: &str, path: &Path) -> Result<u64> {
        let response = self.send(url).await?;

        let mut file = tokio_fs::File::create(path)
            .await
            .map_err(|e| RetrievalError::IoError {
                message: format!("Failed to create temporary file: {}", e),
            })?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .map_err(|e| RetrievalError::IoError {
                    message: format!("Failed to write to temporary file: {}", e),
                })?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| RetrievalError::IoError {
            message: format!("Failed to flush temporary file: {}", e),
        })?;

        debug!(bytes = written, "Downloaded to {}", path.display());
        Ok(written)
    }
}
