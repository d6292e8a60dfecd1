//! Parley - Real-time spoken-dialogue client for AI assistants
//!
//! This library provides the core of a voice conversation client:
//! - Utterance segmentation of the live microphone stream
//! - Turn-taking (when has the user finished speaking?)
//! - Streamed response decoding (interleaved text and audio clips)
//! - Strictly ordered audio clip playback
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │ Microphone                                           │
//! └──────┬───────────────────────────────────────────────┘
//!        │ frames
//! ┌──────▼──────┐ segments  ┌───────────────┐ transcripts
//! │  Segmenter  ├──────────▶│ Transcription ├──────────┐
//! └──────┬──────┘           └───────────────┘          │
//!        │ talking/silence edges                        │
//! ┌──────▼────────────────────────────────────────────▼─┐
//! │              Turn Controller                         │
//! └──────┬───────────────────────────────────────────────┘
//!        │ completed turn
//! ┌──────▼──────┐ text ──▶ transcript
//! │  Generation │
//! │   stream    │ clip handles ──▶ Playback Queue ──▶ Speaker
//! └─────────────┘
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod session;
pub mod transcript;
pub mod turn;
pub mod voice;

pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{RECORD_SEPARATOR, RecordDecoder, ResponseEvent};
pub use queue::{PlaybackQueue, PlaybackState, QueueHandle};
pub use session::{ConversationSession, GREETING, SessionUpdate};
pub use transcript::{ChatTurn, Speaker, Transcript};
pub use turn::{TurnAction, TurnController, TurnEvent, TurnMachine, TurnState};
pub use voice::{AudioCapture, AudioPlayback, AudioSink, SAMPLE_RATE, Segmenter, SegmenterConfig, SegmenterEvent};
