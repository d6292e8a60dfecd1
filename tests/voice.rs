//! Segmentation integration tests
//!
//! Tests the segmenter against realistic audio without requiring hardware.

use parley::voice::{Segmenter, SegmenterConfig, SegmenterEvent};

mod common;

const SAMPLE_RATE: u32 = 16_000;
const FRAME_SIZE: usize = 128;

/// Tuning proportioned like the production defaults: the smoothing window
/// covers about half a second of 128-sample frames
fn test_config() -> SegmenterConfig {
    SegmenterConfig {
        sample_rate: SAMPLE_RATE,
        silence_threshold: 0.02,
        window_frames: 62,
        min_segment_secs: 1.0,
        max_segment_secs: 10.0,
    }
}

/// Feed samples as fixed-size frames, collecting all events
fn feed(segmenter: &mut Segmenter, samples: &[f32]) -> Vec<SegmenterEvent> {
    samples
        .chunks(FRAME_SIZE)
        .flat_map(|frame| segmenter.push_frame(frame))
        .collect()
}

fn segments(events: &[SegmenterEvent]) -> Vec<&Vec<f32>> {
    events
        .iter()
        .filter_map(|e| match e {
            SegmenterEvent::SegmentReady(samples) => Some(samples),
            _ => None,
        })
        .collect()
}

#[test]
fn speech_then_silence_emits_one_segment() {
    let mut segmenter = Segmenter::new(&test_config());

    let mut events = feed(&mut segmenter, &common::sine(440.0, 2.0, 0.5, SAMPLE_RATE));
    events.extend(feed(&mut segmenter, &common::silence(1.5, SAMPLE_RATE)));

    let segments = segments(&events);
    assert_eq!(segments.len(), 1);
    // at least the spoken two seconds survive, minus nothing
    assert!(segments[0].len() >= 2 * SAMPLE_RATE as usize);
}

#[test]
fn talking_and_silence_events_are_edge_triggered() {
    let mut segmenter = Segmenter::new(&test_config());

    let mut events = feed(&mut segmenter, &common::sine(440.0, 2.0, 0.5, SAMPLE_RATE));
    events.extend(feed(&mut segmenter, &common::silence(1.5, SAMPLE_RATE)));

    let started = events
        .iter()
        .filter(|e| matches!(e, SegmenterEvent::SpeechStarted))
        .count();
    let ended = events
        .iter()
        .filter(|e| matches!(e, SegmenterEvent::SpeechEnded))
        .count();

    // hundreds of loud frames, exactly one edge each way
    assert_eq!(started, 1);
    assert_eq!(ended, 1);
}

#[test]
fn short_blip_is_never_forwarded() {
    let mut segmenter = Segmenter::new(&test_config());

    // 200ms of noise, then quiet: under the 1s floor once the window decays
    let mut events = feed(&mut segmenter, &common::sine(440.0, 0.2, 0.5, SAMPLE_RATE));
    events.extend(feed(&mut segmenter, &common::silence(2.0, SAMPLE_RATE)));

    assert!(segments(&events).is_empty());
}

#[test]
fn emitted_segments_respect_the_duration_floor() {
    let config = test_config();
    let floor_samples = SAMPLE_RATE as usize; // 1.0s

    // a spread of utterance lengths around the floor
    for speech_secs in [0.1, 0.5, 0.9, 1.2, 3.0] {
        let mut segmenter = Segmenter::new(&config);
        let mut events = feed(
            &mut segmenter,
            &common::sine(300.0, speech_secs, 0.5, SAMPLE_RATE),
        );
        events.extend(feed(&mut segmenter, &common::silence(2.0, SAMPLE_RATE)));

        for segment in segments(&events) {
            assert!(
                segment.len() > floor_samples,
                "segment of {} samples violates the floor (speech {speech_secs}s)",
                segment.len()
            );
        }
    }
}

#[test]
fn long_speech_wraps_without_losing_samples() {
    let mut segmenter = Segmenter::new(&test_config());

    // 25 seconds of continuous speech against a 10-second buffer cap
    let speech = common::sine(220.0, 25.0, 0.5, SAMPLE_RATE);
    let events = feed(&mut segmenter, &speech);

    let emitted: usize = segments(&events).iter().map(|s| s.len()).sum();
    assert_eq!(emitted + segmenter.buffered_samples(), speech.len());

    // the cap forced at least two flushes
    assert!(segments(&events).len() >= 2);
}

#[test]
fn stop_start_is_idempotent() {
    let mut segmenter = Segmenter::new(&test_config());

    feed(&mut segmenter, &common::sine(440.0, 2.0, 0.5, SAMPLE_RATE));
    assert!(segmenter.buffered_samples() > 0);

    segmenter.stop();
    segmenter.start();

    // write offset reset, no segment emitted in between
    assert_eq!(segmenter.buffered_samples(), 0);

    // frames during the stopped window are ignored entirely
    segmenter.stop();
    let events = feed(&mut segmenter, &common::sine(440.0, 1.0, 0.5, SAMPLE_RATE));
    assert!(events.is_empty());
    assert_eq!(segmenter.buffered_samples(), 0);
}
