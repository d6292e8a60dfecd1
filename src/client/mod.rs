//! Dialogue service clients
//!
//! Each collaborator is one HTTP surface: transcription of finished
//! segments, streamed response generation, and clip fetch/cancel.

mod clips;
mod generate;
mod transcribe;

pub use clips::{ClipClient, ClipFetch, ClipStore};
pub use generate::{GenerationClient, ResponseStream};
pub use transcribe::TranscriptionClient;
