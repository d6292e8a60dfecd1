//! Audio clip fetch service client

use async_trait::async_trait;
use reqwest::StatusCode;

use crate::{Error, Result};

/// Result of one clip fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipFetch {
    /// The clip is still being synthesized; fetch again
    NotReady,
    /// Encoded audio bytes for the clip
    Ready(Vec<u8>),
}

/// Fetches and cancels synthesized audio clips by handle
///
/// The playback queue drives this seam; tests substitute a scripted mock.
#[async_trait]
pub trait ClipStore: Send + Sync {
    /// Fetch one clip by its opaque handle
    ///
    /// # Errors
    ///
    /// Returns error on any response that is neither success nor
    /// not-ready; such an error is fatal for this clip only
    async fn fetch(&self, handle: &str) -> Result<ClipFetch>;

    /// Best-effort cancellation of a clip that will never be played
    async fn cancel(&self, handle: &str);
}

/// HTTP clip store
#[derive(Debug, Clone)]
pub struct ClipClient {
    client: reqwest::Client,
    base_url: String,
}

impl ClipClient {
    /// Create a new clip client
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl ClipStore for ClipClient {
    async fn fetch(&self, handle: &str) -> Result<ClipFetch> {
        let response = self
            .client
            .get(format!("{}/audio/{handle}", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            return Ok(ClipFetch::NotReady);
        }
        if !status.is_success() {
            return Err(Error::Clip(format!(
                "clip fetch failed with status {status}"
            )));
        }

        let bytes = response.bytes().await?;
        tracing::debug!(handle, bytes = bytes.len(), "clip fetched");
        Ok(ClipFetch::Ready(bytes.to_vec()))
    }

    async fn cancel(&self, handle: &str) {
        // fire-and-forget: the clip is simply never collected if this is lost
        let request = self
            .client
            .delete(format!("{}/audio/{handle}", self.base_url));
        let handle = handle.to_string();

        tokio::spawn(async move {
            match request.send().await {
                Ok(response) => {
                    tracing::debug!(handle = %handle, status = %response.status(), "clip cancelled");
                }
                Err(e) => {
                    tracing::debug!(handle = %handle, error = %e, "clip cancel failed");
                }
            }
        });
    }
}
