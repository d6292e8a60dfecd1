//! Async driver for the turn machine
//!
//! Owns the machine plus the one outstanding silence deadline. Arming and
//! cancelling the timer are bound to state transitions here; no timer
//! handle exists anywhere else.

use std::time::Duration;

use tokio::time::Instant;

use super::machine::{TurnAction, TurnEvent, TurnMachine, TurnState};

/// Drives the [`TurnMachine`] and its silence timer
#[derive(Debug)]
pub struct TurnController {
    machine: TurnMachine,
    silence_delay: Duration,
    deadline: Option<Instant>,
}

impl TurnController {
    /// Create a controller with the given silence delay
    #[must_use]
    pub const fn new(silence_delay: Duration) -> Self {
        Self {
            machine: TurnMachine::new(),
            silence_delay,
            deadline: None,
        }
    }

    /// Current machine state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.machine.state()
    }

    /// Whether a silence deadline is currently armed
    #[must_use]
    pub const fn timer_armed(&self) -> bool {
        self.deadline.is_some()
    }

    /// Apply one event
    ///
    /// Timer actions are absorbed into the owned deadline; everything else
    /// (currently only [`TurnAction::Generate`]) is returned for the caller
    /// to execute.
    pub fn apply(&mut self, event: &TurnEvent) -> Vec<TurnAction> {
        let mut external = Vec::new();
        for action in self.machine.apply(event) {
            match action {
                TurnAction::ArmSilenceTimer => {
                    self.deadline = Some(Instant::now() + self.silence_delay);
                }
                TurnAction::CancelSilenceTimer => {
                    self.deadline = None;
                }
                other => external.push(other),
            }
        }
        external
    }

    /// Wait for the silence deadline
    ///
    /// Resolves when the armed deadline passes, clearing it; pends forever
    /// while no deadline is armed. Intended as one branch of the session's
    /// `select!` loop; the caller feeds [`TurnEvent::SilenceElapsed`] back
    /// through [`Self::apply`] when this resolves.
    pub async fn silence_elapsed(&mut self) {
        match self.deadline {
            Some(deadline) => {
                tokio::time::sleep_until(deadline).await;
                self.deadline = None;
            }
            None => std::future::pending().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn timer_arms_on_user_silent_entry() {
        let mut controller = TurnController::new(Duration::from_millis(3000));

        controller.apply(&TurnEvent::SegmentFinished);
        assert!(!controller.timer_armed());

        controller.apply(&TurnEvent::TranscriptReceived("hi".to_string()));
        assert!(controller.timer_armed());

        controller.silence_elapsed().await;
        assert!(!controller.timer_armed());

        let actions = controller.apply(&TurnEvent::SilenceElapsed);
        assert_eq!(
            actions,
            vec![TurnAction::Generate {
                input: "hi".to_string()
            }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn talking_edge_cancels_timer() {
        let mut controller = TurnController::new(Duration::from_millis(3000));
        controller.apply(&TurnEvent::SegmentFinished);
        controller.apply(&TurnEvent::TranscriptReceived("hi".to_string()));
        assert!(controller.timer_armed());

        controller.apply(&TurnEvent::TalkingEdge);
        assert!(!controller.timer_armed());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_transcript_rearms() {
        let mut controller = TurnController::new(Duration::from_millis(3000));
        controller.apply(&TurnEvent::SegmentFinished);
        controller.apply(&TurnEvent::TranscriptReceived(String::new()));

        controller.silence_elapsed().await;
        let actions = controller.apply(&TurnEvent::SilenceElapsed);
        assert!(actions.is_empty());
        // restarted, not abandoned
        assert!(controller.timer_armed());
        assert_eq!(controller.state(), TurnState::UserSilent);
    }
}
