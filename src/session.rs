//! Conversation session
//!
//! Wires the capture stream, segmenter, turn controller, service clients,
//! and playback queue into one cooperative loop. All turn state lives
//! here on a single logical thread; the only suspension points are the
//! network calls, the silence timer, and channel receives.

use tokio::sync::mpsc;

use crate::client::{GenerationClient, TranscriptionClient};
use crate::protocol::ResponseEvent;
use crate::queue::{PlaybackState, QueueHandle};
use crate::transcript::{ChatTurn, Speaker, Transcript};
use crate::turn::{TurnAction, TurnController, TurnEvent};
use crate::voice::{Segmenter, SegmenterConfig, SegmenterEvent};
use crate::Config;

/// Greeting rendered as turn 0 before any audio flows
pub const GREETING: &str = "Hi! Talk to me using your microphone.";

/// What the presentation layer sees
///
/// The presentation layer owns no state; it renders these as they come.
#[derive(Debug, Clone)]
pub enum SessionUpdate {
    /// Incremental text for the in-progress bubble (user transcript
    /// fragments while the user talks, response deltas while the bot does)
    TextDelta(String),
    /// A turn completed and joined the transcript
    TurnCommitted(ChatTurn),
    /// Playback state changed (indicator only)
    Playback(PlaybackState),
    /// A turn-level failure; the session is back in a safe state
    TurnFailed(String),
}

/// What woke the session loop
enum Wake {
    SilenceElapsed,
    Frame(Vec<f32>),
    Event(TurnEvent),
    Playback(PlaybackState),
    CaptureClosed,
}

/// One conversation: microphone in, transcript and speech out
pub struct ConversationSession {
    controller: TurnController,
    segmenter: Segmenter,
    transcript: Transcript,
    transcription: TranscriptionClient,
    generation: GenerationClient,
    queue: QueueHandle,
    updates_tx: mpsc::UnboundedSender<SessionUpdate>,
    events_tx: mpsc::UnboundedSender<TurnEvent>,
    events_rx: mpsc::UnboundedReceiver<TurnEvent>,
}

impl ConversationSession {
    /// Create a session from configuration and a running playback queue
    ///
    /// Returns the session plus the update stream for the presentation
    /// layer.
    #[must_use]
    pub fn new(
        config: &Config,
        sample_rate: u32,
        queue: QueueHandle,
    ) -> (Self, mpsc::UnboundedReceiver<SessionUpdate>) {
        let segmenter = Segmenter::new(&SegmenterConfig {
            sample_rate,
            silence_threshold: config.voice.silence_threshold,
            window_frames: config.voice.amplitude_window_frames,
            min_segment_secs: config.voice.min_segment_secs,
            max_segment_secs: config.voice.max_segment_secs,
        });

        let controller = TurnController::new(std::time::Duration::from_millis(
            config.voice.silence_delay_ms,
        ));

        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        (
            Self {
                controller,
                segmenter,
                transcript: Transcript::new(GREETING),
                transcription: TranscriptionClient::new(config.server.base_url.clone()),
                generation: GenerationClient::new(config.server.base_url.clone()),
                queue,
                updates_tx,
                events_tx,
                events_rx,
            },
            updates_rx,
        )
    }

    /// The completed turns so far
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Run the session until the capture stream closes
    ///
    /// Recoverable failures never surface here: a failed transcription
    /// becomes an empty transcript, a failed clip is dropped by the queue,
    /// and a failed generation resolves back to `BotDone`.
    pub async fn run(mut self, mut frames: mpsc::UnboundedReceiver<Vec<f32>>) {
        self.warm_up().await;

        let mut playback = self.queue.state_changes();

        loop {
            let wake = tokio::select! {
                () = self.controller.silence_elapsed() => Wake::SilenceElapsed,
                frame = frames.recv() => frame.map_or(Wake::CaptureClosed, Wake::Frame),
                event = self.events_rx.recv() => {
                    // both sender halves live in self; never closes
                    event.map_or(Wake::CaptureClosed, Wake::Event)
                }
                changed = playback.changed() => {
                    if changed.is_err() {
                        Wake::CaptureClosed
                    } else {
                        Wake::Playback(*playback.borrow())
                    }
                }
            };

            match wake {
                Wake::SilenceElapsed => {
                    self.dispatch(TurnEvent::SilenceElapsed).await;

                    // a stopped segmenter means a generation just ran inside
                    // that dispatch; frames buffered while the bot had the
                    // floor are stale, not speech to segment
                    if !self.segmenter.is_running() {
                        while frames.try_recv().is_ok() {}
                        self.segmenter.start();
                    }
                }
                Wake::Frame(frame) => self.on_frame(&frame).await,
                Wake::Event(event) => self.dispatch(event).await,
                Wake::Playback(state) => {
                    self.send_update(SessionUpdate::Playback(state));
                }
                Wake::CaptureClosed => break,
            }
        }

        tracing::info!("session ended");
    }

    /// Best-effort service warm-up
    ///
    /// Goes straight to the clients, never through the turn machine: a
    /// warm-up segment must not open a phantom turn.
    async fn warm_up(&self) {
        if let Err(e) = self.transcription.transcribe(&[]).await {
            tracing::debug!(error = %e, "transcription warm-up failed");
        }
        if let Err(e) = self.generation.warm().await {
            tracing::debug!(error = %e, "generation warm-up failed");
        }
    }

    /// Feed one captured frame through the segmenter
    async fn on_frame(&mut self, frame: &[f32]) {
        for event in self.segmenter.push_frame(frame) {
            match event {
                SegmenterEvent::SpeechStarted => self.dispatch(TurnEvent::TalkingEdge).await,
                SegmenterEvent::SpeechEnded => self.dispatch(TurnEvent::SilenceEdge).await,
                SegmenterEvent::SegmentReady(samples) => {
                    self.dispatch(TurnEvent::SegmentFinished).await;
                    self.spawn_transcription(samples);
                }
            }
        }
    }

    /// Transcribe one segment off the loop; the result comes back as an
    /// event in its own time
    fn spawn_transcription(&self, samples: Vec<f32>) {
        let client = self.transcription.clone();
        let events_tx = self.events_tx.clone();

        tokio::spawn(async move {
            let text = match client.transcribe(&samples).await {
                Ok(text) => text,
                Err(e) => {
                    // fatal for this segment only: an empty transcript keeps
                    // the pending-segment counter moving
                    tracing::warn!(error = %e, "transcription failed, substituting empty text");
                    String::new()
                }
            };
            let _ = events_tx.send(TurnEvent::TranscriptReceived(text));
        });
    }

    /// Apply one turn event and execute whatever it demands
    async fn dispatch(&mut self, event: TurnEvent) {
        if let TurnEvent::TranscriptReceived(text) = &event {
            if !text.is_empty() {
                self.send_update(SessionUpdate::TextDelta(text.clone()));
            }
        }

        for action in self.controller.apply(&event) {
            match action {
                TurnAction::Generate { input } => self.run_generation(input).await,
                // timer actions never escape the controller
                other => tracing::warn!(?other, "unexpected turn action"),
            }
        }
    }

    /// Stream one generated response to completion
    async fn run_generation(&mut self, input: String) {
        self.segmenter.stop();

        let history = self.transcript.history();
        let turn = self.transcript.push(Speaker::User, input.clone());
        self.send_update(SessionUpdate::TurnCommitted(turn));

        match self.generation.generate(&input, &history).await {
            Ok(mut stream) => {
                let mut bot_text = String::new();
                let mut first_audio = true;

                loop {
                    match stream.next_event().await {
                        Ok(Some(ResponseEvent::Text(delta))) => {
                            bot_text.push_str(&delta);
                            self.send_update(SessionUpdate::TextDelta(delta));
                        }
                        Ok(Some(ResponseEvent::AudioClip(handle))) => {
                            if first_audio {
                                // barge-in: a prior turn's clips may still be
                                // queued; this turn's audio must not interleave
                                self.queue.clear();
                                first_audio = false;
                            }
                            self.queue.enqueue(handle);
                        }
                        Ok(None) => break,
                        Err(e) => {
                            // mid-stream loss: keep what already streamed and
                            // end the turn rather than wedge
                            tracing::warn!(error = %e, "response stream interrupted");
                            break;
                        }
                    }
                }

                let turn = self.transcript.push(Speaker::Bot, bot_text);
                self.send_update(SessionUpdate::TurnCommitted(turn));
                self.finish_generation(&TurnEvent::GenerationFinished);
            }
            Err(e) => {
                tracing::error!(error = %e, "generation failed");
                self.send_update(SessionUpdate::TurnFailed(e.to_string()));
                self.finish_generation(&TurnEvent::GenerationFailed);
            }
        }
    }

    /// Return the machine to `BotDone`
    ///
    /// The segmenter stays stopped here; the run loop restarts it after
    /// discarding frames captured while the bot had the floor.
    fn finish_generation(&mut self, event: &TurnEvent) {
        let leftover = self.controller.apply(event);
        debug_assert!(leftover.is_empty());
    }

    fn send_update(&self, update: SessionUpdate) {
        // a departed presentation layer is not an error
        let _ = self.updates_tx.send(update);
    }
}
