//! Typed chat transcript
//!
//! The transcript is append-only: a turn is recorded once, when it
//! completes, and never mutated afterwards.

/// Who produced a chat turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human on the microphone
    User,
    /// The assistant
    Bot,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Bot => write!(f, "bot"),
        }
    }
}

/// One completed speaking contribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    /// Who spoke
    pub speaker: Speaker,
    /// Full text of the turn
    pub text: String,
    /// Position in the conversation, greeting is turn 0
    pub turn_index: usize,
}

/// Ordered list of completed turns
#[derive(Debug, Clone)]
pub struct Transcript {
    turns: Vec<ChatTurn>,
}

impl Transcript {
    /// Create a transcript seeded with the assistant greeting as turn 0
    #[must_use]
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            turns: vec![ChatTurn {
                speaker: Speaker::Bot,
                text: greeting.into(),
                turn_index: 0,
            }],
        }
    }

    /// Append a completed turn, returning a copy of the record
    pub fn push(&mut self, speaker: Speaker, text: impl Into<String>) -> ChatTurn {
        let turn = ChatTurn {
            speaker,
            text: text.into(),
            turn_index: self.turns.len(),
        };
        self.turns.push(turn.clone());
        turn
    }

    /// All completed turns in order
    #[must_use]
    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    /// Prior turn texts for a generation request, greeting excluded
    #[must_use]
    pub fn history(&self) -> Vec<String> {
        self.turns[1..].iter().map(|t| t.text.clone()).collect()
    }

    /// Number of completed turns, greeting included
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Always false; the greeting is present from construction
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
