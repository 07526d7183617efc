use tracing::debug;

use crate::random::RandomSource;
use crate::sampler::Sampler;
use crate::trace::{Pattern, Point};

/// Strokes shorter than this are treated as misclicks
pub const MIN_PATTERN_POINTS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum RecorderState {
    Idle,
    Recording { drawing: bool },
}

/// What happened when a stroke was released
#[derive(Debug, Clone, PartialEq)]
pub enum StrokeOutcome {
    Committed(Pattern),
    MisclickDiscarded { points: usize },
    /// No stroke was in progress
    Ignored,
}

/// Owns the recording flag and the stroke being drawn right now
#[derive(Debug, Clone)]
pub struct PatternRecorder {
    state: RecorderState,
    buffer: Vec<Point>,
    session_start: Option<i64>,
    sampler: Sampler,
    min_points: usize,
}

impl PatternRecorder {
    pub fn new(sampler: Sampler, min_points: usize) -> Self {
        Self {
            state: RecorderState::Idle,
            buffer: Vec::new(),
            session_start: None,
            sampler,
            min_points,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        matches!(self.state, RecorderState::Recording { .. })
    }

    pub fn is_drawing(&self) -> bool {
        matches!(self.state, RecorderState::Recording { drawing: true })
    }

    pub fn session_start(&self) -> Option<i64> {
        self.session_start
    }

    pub fn sampler_mut(&mut self) -> &mut Sampler {
        &mut self.sampler
    }

    /// Points of the stroke still under the pointer
    pub fn in_progress(&self) -> &[Point] {
        &self.buffer
    }

    pub fn start_session(&mut self, now: i64) {
        debug!(from = %self.state, start = now, "recorder session started");
        self.state = RecorderState::Recording { drawing: false };
        self.buffer.clear();
        self.session_start = Some(now);
    }

    /// Leaves committed patterns alone; an unfinished stroke is dropped.
    pub fn stop_session(&mut self) {
        debug!(
            from = %self.state,
            dropped = self.buffer.len(),
            "recorder session stopped"
        );
        self.state = RecorderState::Idle;
        self.buffer.clear();
    }

    /// Back to a fresh idle recorder with no session reference
    pub fn reset(&mut self) {
        self.stop_session();
        self.session_start = None;
    }

    fn relative_time(&self, now: i64) -> i64 {
        let elapsed = self
            .session_start
            .map_or(0, |start| now.saturating_sub(start))
            .max(0);
        match self.buffer.last() {
            Some(last) => elapsed.max(last.time),
            None => elapsed,
        }
    }

    pub fn begin_stroke(&mut self, x: f64, y: f64, now: i64) -> bool {
        if !self.is_recording() {
            return false;
        }
        let point = Point::new(x, y, self.relative_time(now));
        self.buffer.push(point);
        self.state = RecorderState::Recording { drawing: true };
        true
    }

    /// Returns the number of points appended
    pub fn extend_stroke(
        &mut self,
        x: f64,
        y: f64,
        now: i64,
        rng: &mut dyn RandomSource,
    ) -> usize {
        if !self.is_drawing() {
            return 0;
        }
        let raw = Point::new(x, y, self.relative_time(now));
        let Some(last) = self.buffer.last().copied() else {
            self.buffer.push(raw);
            return 1;
        };

        let sampled = self.sampler.sample(&last, &raw, rng);
        let added = sampled.len();
        self.buffer.extend(sampled);
        added
    }

    pub fn end_stroke(&mut self) -> StrokeOutcome {
        if !self.is_drawing() {
            return StrokeOutcome::Ignored;
        }
        self.state = RecorderState::Recording { drawing: false };

        let points = std::mem::take(&mut self.buffer);
        if points.len() < self.min_points {
            debug!(points = points.len(), "stroke discarded as misclick");
            return StrokeOutcome::MisclickDiscarded {
                points: points.len(),
            };
        }

        debug!(points = points.len(), "stroke committed");
        StrokeOutcome::Committed(Pattern::new(points))
    }
}
