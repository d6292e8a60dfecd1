//! Response stream record decoding
//!
//! The generation service answers with a chunked byte stream of JSON
//! records delimited by an ASCII record separator. Payload text may
//! contain newlines, so the separator is the only framing byte.

use serde::Deserialize;

/// Delimiter between records in a generation response stream
pub const RECORD_SEPARATOR: u8 = 0x1E;

/// A single decoded event from the generation response stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseEvent {
    /// Incremental response text
    Text(String),

    /// Handle of a synthesized audio clip ready to be fetched
    AudioClip(String),
}

/// Wire form of one record
#[derive(Deserialize)]
struct WireRecord {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    value: serde_json::Value,
}

/// Incremental decoder for record-separator-delimited response streams
///
/// Network chunks may split a record anywhere, including mid-payload;
/// bytes are buffered until a full record is available. Decoding is
/// single-pass and destructive: each record is emitted exactly once.
#[derive(Debug, Default)]
pub struct RecordDecoder {
    buf: Vec<u8>,
}

impl RecordDecoder {
    /// Create an empty decoder
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Feed one network chunk, returning every record completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<ResponseEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(pos) = self.buf.iter().position(|&b| b == RECORD_SEPARATOR) {
            let record: Vec<u8> = self.buf.drain(..=pos).take(pos).collect();
            if let Some(event) = decode_record(&record) {
                events.push(event);
            }
        }

        events
    }

    /// Drain the decoder at end of stream
    ///
    /// A well-formed stream terminates every record, so this normally
    /// returns nothing. A final unterminated record is decoded if it
    /// parses and dropped with a warning otherwise.
    pub fn finish(&mut self) -> Option<ResponseEvent> {
        let rest = std::mem::take(&mut self.buf);
        if rest.is_empty() {
            return None;
        }

        let event = decode_record(&rest);
        if event.is_none() {
            tracing::warn!(bytes = rest.len(), "dropping unterminated trailing record");
        }
        event
    }
}

/// Decode one framed record, tolerating junk
///
/// Empty fragments (separator at chunk end) are skipped silently, unknown
/// record types are ignored for forward compatibility, and malformed
/// records are logged and skipped rather than failing the stream.
fn decode_record(raw: &[u8]) -> Option<ResponseEvent> {
    if raw.is_empty() {
        return None;
    }

    let record: WireRecord = match serde_json::from_slice(raw) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, bytes = raw.len(), "skipping malformed record");
            return None;
        }
    };

    match record.kind.as_str() {
        "text" => match record.value.as_str() {
            Some(text) => Some(ResponseEvent::Text(text.to_string())),
            None => {
                tracing::warn!("skipping text record with non-string value");
                None
            }
        },
        "audio" => match record.value.as_str() {
            Some(handle) => Some(ResponseEvent::AudioClip(handle.to_string())),
            None => {
                tracing::warn!("skipping audio record with non-string value");
                None
            }
        },
        other => {
            tracing::debug!(kind = other, "ignoring unknown record type");
            None
        }
    }
}
