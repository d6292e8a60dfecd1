//! Transcription service client

use crate::{Error, Result};

/// Transcribes finished utterance segments
#[derive(Debug, Clone)]
pub struct TranscriptionClient {
    client: reqwest::Client,
    base_url: String,
}

impl TranscriptionClient {
    /// Create a new transcription client
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Transcribe one segment of audio
    ///
    /// Samples are shipped as raw little-endian 32-bit float PCM, mono, at
    /// the capture sample rate. An empty slice is the warm-up call; the
    /// service answers it with an empty transcript.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service answers non-2xx.
    /// Failures are fatal for this segment only; the caller substitutes an
    /// empty transcript to keep the turn machine moving.
    pub async fn transcribe(&self, samples: &[f32]) -> Result<String> {
        tracing::debug!(samples = samples.len(), "starting transcription");

        let mut body = Vec::with_capacity(samples.len() * 4);
        for sample in samples {
            body.extend_from_slice(&sample.to_le_bytes());
        }

        let response = self
            .client
            .post(format!("{}/transcribe", self.base_url))
            .header("Content-Type", "audio/float32")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "transcription request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "transcription service error");
            return Err(Error::Transcription(format!(
                "transcription service error {status}: {body}"
            )));
        }

        // the body is a bare JSON string
        let text: String = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse transcript");
            e
        })?;

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}
