//! Generation service client
//!
//! The generation endpoint streams its answer as record-separator-framed
//! JSON records; see `protocol` for the framing rules.

use std::collections::VecDeque;
use std::pin::Pin;

use futures::{Stream, StreamExt};

use crate::protocol::{RecordDecoder, ResponseEvent};
use crate::{Error, Result};

/// Request body for a generation call
#[derive(serde::Serialize)]
struct GenerateRequest<'a> {
    input: &'a str,
    history: &'a [String],
}

/// Request body for the warm-up call
#[derive(serde::Serialize)]
struct WarmRequest {
    warm: bool,
}

/// Streams responses from the generation service
#[derive(Debug, Clone)]
pub struct GenerationClient {
    client: reqwest::Client,
    base_url: String,
}

impl GenerationClient {
    /// Create a new generation client
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Warm up the generation service
    ///
    /// The service answers with an empty-bodied success and no stream.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service answers non-2xx
    pub async fn warm(&self) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&WarmRequest { warm: true })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Generation(format!(
                "warm-up failed with status {status}"
            )));
        }

        tracing::debug!("generation service warmed");
        Ok(())
    }

    /// Start generating a response for a completed user turn
    ///
    /// `history` is the ordered list of prior turn texts.
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the service answers non-2xx
    /// before any streaming begins (the turn-level fatal case)
    pub async fn generate(&self, input: &str, history: &[String]) -> Result<ResponseStream> {
        tracing::debug!(input = %input, history_turns = history.len(), "starting generation");

        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&GenerateRequest { input, history })
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "generation request failed");
                e
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "generation service error");
            return Err(Error::Generation(format!(
                "generation service error {status}: {body}"
            )));
        }

        Ok(ResponseStream::new(
            response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())),
        ))
    }
}

/// Ordered, single-pass event stream for one generation response
///
/// Consuming it is destructive; re-reading requires a fresh request.
pub struct ResponseStream {
    chunks: Pin<Box<dyn Stream<Item = reqwest::Result<Vec<u8>>> + Send>>,
    decoder: RecordDecoder,
    ready: VecDeque<ResponseEvent>,
    done: bool,
}

impl ResponseStream {
    fn new(chunks: impl Stream<Item = reqwest::Result<Vec<u8>>> + Send + 'static) -> Self {
        Self {
            chunks: Box::pin(chunks),
            decoder: RecordDecoder::new(),
            ready: VecDeque::new(),
            done: false,
        }
    }

    /// Next decoded event, or `None` once the stream has ended
    ///
    /// # Errors
    ///
    /// Returns error if the underlying transfer fails mid-stream
    pub async fn next_event(&mut self) -> Result<Option<ResponseEvent>> {
        loop {
            if let Some(event) = self.ready.pop_front() {
                return Ok(Some(event));
            }
            if self.done {
                return Ok(None);
            }

            match self.chunks.next().await {
                Some(Ok(chunk)) => self.ready.extend(self.decoder.push(&chunk)),
                Some(Err(e)) => {
                    self.done = true;
                    return Err(e.into());
                }
                None => {
                    self.done = true;
                    self.ready.extend(self.decoder.finish());
                }
            }
        }
    }
}

impl std::fmt::Debug for ResponseStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseStream")
            .field("ready", &self.ready.len())
            .field("done", &self.done)
            .finish_non_exhaustive()
    }
}
