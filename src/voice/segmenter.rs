//! Amplitude-gated utterance segmentation
//!
//! Turns the continuous microphone frame stream into discrete utterance
//! segments plus edge-triggered talking/silence events. Runs entirely in
//! the per-frame path, so nothing here suspends or allocates beyond the
//! segment buffers themselves.

use std::collections::VecDeque;

/// Events produced while consuming frames
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterEvent {
    /// Smoothed amplitude rose above the silence gate
    SpeechStarted,
    /// Smoothed amplitude fell to or below the silence gate
    SpeechEnded,
    /// A finished utterance segment, ready for transcription
    SegmentReady(Vec<f32>),
}

/// Segmenter tuning
#[derive(Debug, Clone, Copy)]
pub struct SegmenterConfig {
    /// Sample rate of incoming frames (Hz)
    pub sample_rate: u32,
    /// Smoothed amplitude at or below this level counts as silence
    pub silence_threshold: f32,
    /// Number of recent frames in the amplitude smoothing window
    pub window_frames: usize,
    /// Segments shorter than this are discarded as noise (seconds)
    pub min_segment_secs: f32,
    /// Hard cap on a single segment's length (seconds)
    pub max_segment_secs: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            silence_threshold: 0.02,
            window_frames: 180,
            min_segment_secs: 1.0,
            max_segment_secs: 10.0,
        }
    }
}

/// Bounded history of per-frame mean-absolute amplitudes
///
/// Keeps a running sum so the smoothed average is O(1) per frame. The sum
/// always equals the sum of currently retained entries.
#[derive(Debug)]
struct AmplitudeWindow {
    entries: VecDeque<f32>,
    sum: f32,
    capacity: usize,
}

impl AmplitudeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            sum: 0.0,
            capacity,
        }
    }

    fn push(&mut self, amplitude: f32) {
        if self.entries.len() >= self.capacity {
            if let Some(front) = self.entries.pop_front() {
                self.sum -= front;
            }
        }
        self.entries.push_back(amplitude);
        self.sum += amplitude;
    }

    #[allow(clippy::cast_precision_loss)]
    fn average(&self) -> f32 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.sum / self.entries.len() as f32
        }
    }
}

/// Converts a continuous frame stream into discrete utterance segments
#[derive(Debug)]
pub struct Segmenter {
    silence_threshold: f32,
    /// Utterance buffer capacity in samples
    capacity: usize,
    /// Minimum emitted segment length in samples
    min_samples: usize,
    window: AmplitudeWindow,
    buffer: Vec<f32>,
    talking: bool,
    running: bool,
}

impl Segmenter {
    /// Create a segmenter from its tuning
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn new(config: &SegmenterConfig) -> Self {
        let capacity = (config.max_segment_secs * config.sample_rate as f32) as usize;
        let min_samples = (config.min_segment_secs * config.sample_rate as f32) as usize;

        Self {
            silence_threshold: config.silence_threshold,
            capacity,
            min_samples,
            window: AmplitudeWindow::new(config.window_frames),
            buffer: Vec::with_capacity(capacity),
            talking: false,
            running: true,
        }
    }

    /// Whether frames are currently being consumed
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Samples accumulated toward the current segment
    #[must_use]
    pub fn buffered_samples(&self) -> usize {
        self.buffer.len()
    }

    /// Stop consuming frames, freezing all state
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Resume consuming frames with the write offset reset to zero
    ///
    /// Whatever was buffered when [`Self::stop`] was called is discarded
    /// without emitting a segment.
    pub fn start(&mut self) {
        self.buffer.clear();
        self.running = true;
    }

    /// Consume one captured frame, in capture order
    ///
    /// Returns the boundary events the frame produced: at most one
    /// talking/silence edge plus at most one finished segment. Zero-length
    /// frames and frames received while stopped are no-ops.
    #[allow(clippy::cast_precision_loss)]
    pub fn push_frame(&mut self, frame: &[f32]) -> Vec<SegmenterEvent> {
        let mut events = Vec::new();
        if !self.running || frame.is_empty() {
            return events;
        }

        let amplitude = frame.iter().map(|s| s.abs()).sum::<f32>() / frame.len() as f32;
        self.window.push(amplitude);
        let average = self.window.average();

        // Append the frame, splitting across the capacity boundary so no
        // sample is lost when the buffer fills mid-frame.
        let mut offset = 0;
        while offset < frame.len() {
            let space = self.capacity - self.buffer.len();
            let take = space.min(frame.len() - offset);
            self.buffer.extend_from_slice(&frame[offset..offset + take]);
            offset += take;

            if self.buffer.len() == self.capacity {
                self.flush(average, &mut events);
            }
        }

        let talking = average > self.silence_threshold;
        if talking != self.talking {
            self.talking = talking;
            events.push(if talking {
                SegmenterEvent::SpeechStarted
            } else {
                SegmenterEvent::SpeechEnded
            });
        }

        // Boundary: smoothed silence, or not enough room for another frame
        // of this size.
        let remaining = self.capacity - self.buffer.len();
        if (average <= self.silence_threshold || remaining < frame.len())
            && !self.buffer.is_empty()
        {
            self.flush(average, &mut events);
        }

        events
    }

    /// Declare a segment boundary: emit the buffer if it clears the
    /// minimum-duration floor, discard it otherwise, and reset.
    fn flush(&mut self, average: f32, events: &mut Vec<SegmenterEvent>) {
        if self.buffer.len() > self.min_samples {
            tracing::debug!(
                samples = self.buffer.len(),
                average,
                "utterance segment complete"
            );
            let segment = std::mem::replace(&mut self.buffer, Vec::with_capacity(self.capacity));
            events.push(SegmenterEvent::SegmentReady(segment));
        } else {
            tracing::trace!(samples = self.buffer.len(), "discarding short segment");
            self.buffer.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SegmenterConfig {
        SegmenterConfig {
            sample_rate: 1000,
            silence_threshold: 0.02,
            window_frames: 4,
            min_segment_secs: 0.1, // 100 samples
            max_segment_secs: 1.0, // 1000 samples
        }
    }

    fn loud(len: usize) -> Vec<f32> {
        vec![0.5; len]
    }

    fn quiet(len: usize) -> Vec<f32> {
        vec![0.0; len]
    }

    #[test]
    fn zero_length_frame_is_noop() {
        let mut segmenter = Segmenter::new(&config());
        assert!(segmenter.push_frame(&[]).is_empty());
        assert_eq!(segmenter.buffered_samples(), 0);
    }

    #[test]
    fn talking_event_is_edge_triggered() {
        let mut segmenter = Segmenter::new(&config());

        let mut talking_events = 0;
        for _ in 0..10 {
            for event in segmenter.push_frame(&loud(50)) {
                if event == SegmenterEvent::SpeechStarted {
                    talking_events += 1;
                }
            }
        }

        assert_eq!(talking_events, 1);
    }

    #[test]
    fn silence_flushes_accumulated_speech() {
        let mut segmenter = Segmenter::new(&config());

        // 300 loud samples, enough to clear the 100-sample floor
        for _ in 0..6 {
            assert!(
                segmenter
                    .push_frame(&loud(50))
                    .iter()
                    .all(|e| !matches!(e, SegmenterEvent::SegmentReady(_)))
            );
        }

        // silence drags the 4-frame window average under the gate
        let mut segment = None;
        for _ in 0..6 {
            for event in segmenter.push_frame(&quiet(50)) {
                if let SegmenterEvent::SegmentReady(samples) = event {
                    segment = Some(samples);
                }
            }
            if segment.is_some() {
                break;
            }
        }

        let segment = segment.expect("silence should flush a segment");
        assert!(segment.len() > 100);
    }

    #[test]
    fn short_blip_is_discarded() {
        let mut segmenter = Segmenter::new(&config());

        // one loud frame, then silence: accumulated length stays under the
        // floor by the time the average drops
        segmenter.push_frame(&loud(20));
        let mut saw_segment = false;
        for _ in 0..8 {
            for event in segmenter.push_frame(&quiet(10)) {
                if matches!(event, SegmenterEvent::SegmentReady(_)) {
                    saw_segment = true;
                }
            }
        }

        assert!(!saw_segment);
        // buffer was still reset at the boundary
        assert!(segmenter.buffered_samples() < 100);
    }

    #[test]
    fn full_buffer_flushes_before_overflow() {
        let mut segmenter = Segmenter::new(&config());

        // 7 frames of 150 samples; frame 7 would overflow the 1000-sample
        // capacity, so the buffer flushes once there is no room for another
        // frame of that size
        let mut emitted = 0;
        let mut fed = 0;
        for _ in 0..7 {
            fed += 150;
            for event in segmenter.push_frame(&loud(150)) {
                if let SegmenterEvent::SegmentReady(samples) = event {
                    emitted += samples.len();
                }
            }
        }

        assert_eq!(emitted + segmenter.buffered_samples(), fed);
        assert!(emitted > 0);
    }

    #[test]
    fn frame_split_across_capacity_loses_no_samples() {
        let mut segmenter = Segmenter::new(&config());

        // a frame larger than the whole buffer must split at the capacity
        // boundary: one full segment plus the tail, nothing dropped
        let mut emitted = 0;
        for event in segmenter.push_frame(&loud(1200)) {
            if let SegmenterEvent::SegmentReady(samples) = event {
                emitted += samples.len();
            }
        }

        assert_eq!(emitted + segmenter.buffered_samples(), 1200);
        assert!(emitted >= 1000);
    }

    #[test]
    fn stop_start_resets_without_spurious_segment() {
        let mut segmenter = Segmenter::new(&config());
        for _ in 0..6 {
            segmenter.push_frame(&loud(50));
        }
        assert!(segmenter.buffered_samples() > 0);

        segmenter.stop();
        assert!(segmenter.push_frame(&loud(50)).is_empty());

        segmenter.start();
        assert_eq!(segmenter.buffered_samples(), 0);
        assert!(segmenter.is_running());
    }
}
