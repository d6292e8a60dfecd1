//! Turn-taking state machine
//!
//! Segment-finished and transcript-received events come from independent
//! asynchronous sources and may interleave arbitrarily. The machine
//! reconciles them with a pending-segment counter so the aggregate
//! outcome is order-independent, and decides exactly when a user turn is
//! complete enough to hand to the generation service.
//!
//! All transitions are synchronous: `apply` maps (state, event) to a new
//! state plus a list of actions for the caller to execute. The machine
//! itself never talks to a timer or the network.

/// Conversation state, exactly one active at a time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// The assistant's response is being generated and streamed
    BotGenerating,
    /// The assistant has finished; waiting for the user to speak
    BotDone,
    /// The user is speaking
    UserTalking,
    /// The user has gone quiet; the silence timer is running
    UserSilent,
    /// Segments are out for transcription and not all have returned
    WaitingForTranscript,
}

/// Input events, from the segmenter, the service clients, and the timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Smoothed amplitude rose above the silence gate (edge)
    TalkingEdge,
    /// Smoothed amplitude fell to or below the silence gate (edge)
    SilenceEdge,
    /// The segmenter emitted a finished utterance segment
    SegmentFinished,
    /// A dispatched segment's transcript came back (empty on failure)
    TranscriptReceived(String),
    /// The silence timer elapsed
    SilenceElapsed,
    /// The generation stream completed
    GenerationFinished,
    /// The generation request failed before streaming began
    GenerationFailed,
}

/// Side effects the caller must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnAction {
    /// Arm (or re-arm) the silence timer
    ArmSilenceTimer,
    /// Cancel any outstanding silence timer
    CancelSilenceTimer,
    /// Trigger generation for a completed user turn
    Generate {
        /// The turn's accumulated transcript
        input: String,
    },
}

/// Counters carried across transitions
#[derive(Debug)]
struct TurnContext {
    /// Segments dispatched for transcription but not yet acknowledged
    pending_segments: u32,
    /// Transcript fragments of the in-progress user turn, in receive order
    accumulated: String,
    /// Monotonic count of turn boundaries crossed
    turn_index: u64,
}

/// The turn-taking machine
#[derive(Debug)]
pub struct TurnMachine {
    state: TurnState,
    ctx: TurnContext,
}

impl Default for TurnMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnMachine {
    /// Create a machine in `BotDone` with the greeting counted as turn 0
    #[must_use]
    pub const fn new() -> Self {
        Self {
            state: TurnState::BotDone,
            ctx: TurnContext {
                pending_segments: 0,
                accumulated: String::new(),
                turn_index: 1,
            },
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Segments still out for transcription
    #[must_use]
    pub const fn pending_segments(&self) -> u32 {
        self.ctx.pending_segments
    }

    /// Transcript accumulated for the in-progress user turn
    #[must_use]
    pub fn accumulated_transcript(&self) -> &str {
        &self.ctx.accumulated
    }

    /// Count of turn boundaries crossed so far
    #[must_use]
    pub const fn turn_index(&self) -> u64 {
        self.ctx.turn_index
    }

    /// Apply one event, returning the actions it demands
    ///
    /// Events with no transition listed for the current state are no-ops;
    /// duplicates therefore cannot re-trigger generation or corrupt the
    /// counters.
    pub fn apply(&mut self, event: &TurnEvent) -> Vec<TurnAction> {
        let before = self.state;
        let actions = match (self.state, event) {
            (TurnState::BotDone, TurnEvent::SegmentFinished) => {
                self.ctx.pending_segments = 1;
                self.ctx.turn_index += 1;
                self.state = TurnState::WaitingForTranscript;
                vec![]
            }

            (TurnState::UserTalking, TurnEvent::SilenceEdge) => {
                self.state = TurnState::UserSilent;
                vec![TurnAction::ArmSilenceTimer]
            }

            (TurnState::UserTalking, TurnEvent::SegmentFinished) => {
                self.ctx.pending_segments += 1;
                self.state = TurnState::WaitingForTranscript;
                vec![]
            }

            (TurnState::UserSilent, TurnEvent::TalkingEdge) => {
                self.state = TurnState::UserTalking;
                vec![TurnAction::CancelSilenceTimer]
            }

            (TurnState::UserSilent, TurnEvent::SegmentFinished) => {
                self.ctx.pending_segments += 1;
                self.state = TurnState::WaitingForTranscript;
                vec![TurnAction::CancelSilenceTimer]
            }

            (TurnState::UserSilent, TurnEvent::SilenceElapsed) => {
                if self.ctx.accumulated.is_empty() {
                    // nothing transcribable yet; give the user more time
                    vec![TurnAction::ArmSilenceTimer]
                } else {
                    self.ctx.turn_index += 1;
                    let input = std::mem::take(&mut self.ctx.accumulated);
                    self.state = TurnState::BotGenerating;
                    vec![TurnAction::Generate { input }]
                }
            }

            (TurnState::WaitingForTranscript, TurnEvent::SegmentFinished) => {
                self.ctx.pending_segments += 1;
                vec![]
            }

            (TurnState::WaitingForTranscript, TurnEvent::TranscriptReceived(text)) => {
                if self.ctx.pending_segments == 0 {
                    tracing::warn!("transcript received with no pending segments");
                } else {
                    self.ctx.pending_segments -= 1;
                }
                self.ctx.accumulated.push_str(text);

                if self.ctx.pending_segments == 0 {
                    self.state = TurnState::UserSilent;
                    vec![TurnAction::ArmSilenceTimer]
                } else {
                    vec![]
                }
            }

            (
                TurnState::BotGenerating,
                TurnEvent::GenerationFinished | TurnEvent::GenerationFailed,
            ) => {
                self.state = TurnState::BotDone;
                vec![]
            }

            _ => vec![],
        };

        if before != self.state {
            tracing::debug!(
                from = ?before,
                to = ?self.state,
                event = ?event,
                pending = self.ctx.pending_segments,
                turn = self.ctx.turn_index,
                "turn transition"
            );
        }

        actions
    }
}
