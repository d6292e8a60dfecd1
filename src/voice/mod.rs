//! Voice processing module
//!
//! Handles audio capture, utterance segmentation, and playback.
//! Transcription and generation are remote services (see `client`).

mod capture;
mod playback;
mod segmenter;

pub use capture::{AudioCapture, SAMPLE_RATE};
pub use playback::{AudioPlayback, AudioSink};
pub use segmenter::{Segmenter, SegmenterConfig, SegmenterEvent};
