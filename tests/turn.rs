//! Turn-taking integration tests
//!
//! Exercises the machine against every legal interleaving of segment and
//! transcript arrivals, and the controller's silence timer against paused
//! time.

use std::time::Duration;

use parley::turn::{TurnAction, TurnController, TurnEvent, TurnMachine, TurnState};

/// All orderings of `k` segment events and `k` transcript events in which
/// no transcript precedes its segment (the only orderings the collaborators
/// can produce)
fn interleavings(k: usize) -> Vec<Vec<TurnEvent>> {
    fn build(
        segments_left: usize,
        transcripts_left: usize,
        in_flight: usize,
        prefix: &mut Vec<TurnEvent>,
        out: &mut Vec<Vec<TurnEvent>>,
        transcript_no: usize,
    ) {
        if segments_left == 0 && transcripts_left == 0 {
            out.push(prefix.clone());
            return;
        }
        if segments_left > 0 {
            prefix.push(TurnEvent::SegmentFinished);
            build(
                segments_left - 1,
                transcripts_left,
                in_flight + 1,
                prefix,
                out,
                transcript_no,
            );
            prefix.pop();
        }
        if transcripts_left > 0 && in_flight > 0 {
            prefix.push(TurnEvent::TranscriptReceived(format!("w{transcript_no} ")));
            build(
                segments_left,
                transcripts_left - 1,
                in_flight - 1,
                prefix,
                out,
                transcript_no + 1,
            );
            prefix.pop();
        }
    }

    let mut out = Vec::new();
    build(k, k, 0, &mut Vec::new(), &mut out, 0);
    out
}

#[test]
fn reconciliation_is_order_independent() {
    // k = 3 gives the five lattice orderings; every one must drain the
    // counter and land in UserSilent with the same accumulated transcript
    let orderings = interleavings(3);
    assert_eq!(orderings.len(), 5);

    for events in orderings {
        let mut machine = TurnMachine::new();
        let mut reconciliations = 0;

        for event in &events {
            let was_waiting = machine.state() == TurnState::WaitingForTranscript;
            machine.apply(event);
            if was_waiting && machine.state() == TurnState::UserSilent {
                reconciliations += 1;
            }
        }

        assert_eq!(machine.pending_segments(), 0, "events: {events:?}");
        assert_eq!(machine.state(), TurnState::UserSilent, "events: {events:?}");
        assert_eq!(machine.accumulated_transcript(), "w0 w1 w2 ");
        assert!(reconciliations >= 1);
    }
}

#[test]
fn deeper_interleavings_also_reconcile() {
    for events in interleavings(5) {
        let mut machine = TurnMachine::new();
        for event in &events {
            machine.apply(event);
        }
        assert_eq!(machine.pending_segments(), 0, "events: {events:?}");
        assert_eq!(machine.state(), TurnState::UserSilent, "events: {events:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn hello_scenario_generates_after_silence() {
    let mut controller = TurnController::new(Duration::from_millis(3000));

    controller.apply(&TurnEvent::SegmentFinished);
    assert_eq!(controller.state(), TurnState::WaitingForTranscript);

    controller.apply(&TurnEvent::TranscriptReceived("hello".to_string()));
    assert_eq!(controller.state(), TurnState::UserSilent);

    controller.silence_elapsed().await;
    let actions = controller.apply(&TurnEvent::SilenceElapsed);

    assert_eq!(controller.state(), TurnState::BotGenerating);
    assert_eq!(
        actions,
        vec![TurnAction::Generate {
            input: "hello".to_string()
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn empty_transcript_timer_restarts_twice() {
    let mut controller = TurnController::new(Duration::from_millis(3000));

    controller.apply(&TurnEvent::SegmentFinished);
    controller.apply(&TurnEvent::TranscriptReceived(String::new()));
    assert_eq!(controller.state(), TurnState::UserSilent);

    // the timer fires twice against an empty transcript; both times the
    // machine stays put and re-arms rather than generating
    for _ in 0..2 {
        controller.silence_elapsed().await;
        let actions = controller.apply(&TurnEvent::SilenceElapsed);
        assert!(actions.is_empty());
        assert_eq!(controller.state(), TurnState::UserSilent);
        assert!(controller.timer_armed());
    }
}

#[tokio::test(start_paused = true)]
async fn resumed_talking_cancels_the_pending_turn() {
    let mut controller = TurnController::new(Duration::from_millis(3000));

    controller.apply(&TurnEvent::SegmentFinished);
    controller.apply(&TurnEvent::TranscriptReceived("so".to_string()));
    assert!(controller.timer_armed());

    // user picks the sentence back up before the delay elapses
    controller.apply(&TurnEvent::TalkingEdge);
    assert_eq!(controller.state(), TurnState::UserTalking);
    assert!(!controller.timer_armed());

    // second segment extends the same turn
    controller.apply(&TurnEvent::SegmentFinished);
    controller.apply(&TurnEvent::TranscriptReceived(" anyway".to_string()));

    controller.silence_elapsed().await;
    let actions = controller.apply(&TurnEvent::SilenceElapsed);
    assert_eq!(
        actions,
        vec![TurnAction::Generate {
            input: "so anyway".to_string()
        }]
    );
}

#[test]
fn generation_lifecycle_round_trip() {
    let mut machine = TurnMachine::new();

    machine.apply(&TurnEvent::SegmentFinished);
    machine.apply(&TurnEvent::TranscriptReceived("question".to_string()));
    machine.apply(&TurnEvent::SilenceElapsed);
    assert_eq!(machine.state(), TurnState::BotGenerating);

    // duplicate completion events cannot double-transition
    machine.apply(&TurnEvent::GenerationFinished);
    assert_eq!(machine.state(), TurnState::BotDone);
    machine.apply(&TurnEvent::GenerationFinished);
    assert_eq!(machine.state(), TurnState::BotDone);

    // the next utterance opens a fresh turn with a clean accumulator
    machine.apply(&TurnEvent::SegmentFinished);
    assert_eq!(machine.state(), TurnState::WaitingForTranscript);
    assert_eq!(machine.accumulated_transcript(), "");
    assert_eq!(machine.pending_segments(), 1);
}
