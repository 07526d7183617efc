use tracing::{debug, info};

use crate::random::RandomSource;
use crate::trace::Pattern;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Finished,
}

/// Part of one pattern visible in a frame
#[derive(Debug, Clone, PartialEq)]
pub struct RevealedStroke {
    pub pattern_index: usize,
    /// Length of the revealed prefix
    pub revealed: usize,
    /// `(index + 1) / total`; earlier patterns fade
    pub weight: f64,
    /// Stroke hue in degrees
    pub hue: f64,
}

/// Everything the renderer needs for one display refresh
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackFrame {
    pub generation: u64,
    pub simulated_ms: f64,
    pub frame_index: usize,
    pub strokes: Vec<RevealedStroke>,
    pub finished: bool,
}

#[derive(Debug, Clone)]
struct Run {
    patterns: Vec<Pattern>,
    speed: f64,
    wall_start: i64,
    frame_index: usize,
}

/// Replays committed patterns by their recorded timestamps.
///
/// Only one run exists at a time. The external driver calls [`tick`] once per
/// display refresh; nothing here sleeps or schedules.
///
/// [`tick`]: PlaybackEngine::tick
#[derive(Debug, Clone)]
pub struct PlaybackEngine {
    state: PlaybackState,
    run: Option<Run>,
    generation: u64,
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackEngine {
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Stopped,
            run: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }

    /// Incremented whenever a run starts or is cancelled
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Patterns of the current (or last finished) run
    pub fn patterns(&self) -> &[Pattern] {
        self.run
            .as_ref()
            .map(|run| run.patterns.as_slice())
            .unwrap_or(&[])
    }

    pub fn speed(&self) -> Option<f64> {
        self.run.as_ref().map(|run| run.speed)
    }

    /// Starts a new run, cancelling any run already in flight.
    ///
    /// Returns the generation of the new run.
    pub fn play(&mut self, patterns: Vec<Pattern>, speed: f64, now: i64) -> u64 {
        if self.is_playing() {
            debug!(
                generation = self.generation,
                state = %self.state,
                "cancelling previous playback"
            );
        }
        let speed = if speed.is_finite() && speed > 0.0 {
            speed
        } else {
            1.0
        };

        self.generation += 1;
        info!(
            generation = self.generation,
            patterns = patterns.len(),
            speed,
            "playback started"
        );
        self.run = Some(Run {
            patterns,
            speed,
            wall_start: now,
            frame_index: 0,
        });
        self.state = PlaybackState::Playing;
        self.generation
    }

    /// Cancels the run; the engine returns to `Stopped`
    pub fn stop(&mut self) {
        debug!(
            generation = self.generation,
            state = %self.state,
            "playback stopped"
        );
        self.generation += 1;
        self.run = None;
        self.state = PlaybackState::Stopped;
    }

    /// Advances the run to wall time `now`.
    ///
    /// Returns `None` unless a run is playing. The frame reveals, for every
    /// pattern up to the current frame index, the points recorded at or before
    /// the simulated time. The frame index moves forward by at most one per
    /// call, once the current pattern's last point has been reached.
    pub fn tick(&mut self, now: i64, rng: &mut dyn RandomSource) -> Option<PlaybackFrame> {
        if self.state != PlaybackState::Playing {
            return None;
        }
        let run = self.run.as_mut()?;

        let total = run.patterns.len();
        let simulated_ms = (now - run.wall_start).max(0) as f64 * run.speed;

        let strokes = run
            .patterns
            .iter()
            .enumerate()
            .take((run.frame_index + 1).min(total))
            .map(|(i, pattern)| RevealedStroke {
                pattern_index: i,
                revealed: pattern.revealed(simulated_ms).len(),
                weight: (i + 1) as f64 / total as f64,
                hue: rng.next_unit() * 360.0,
            })
            .collect();

        if let Some(current) = run.patterns.get(run.frame_index) {
            let done = current
                .last_time()
                .map_or(true, |last| last as f64 <= simulated_ms);
            if done {
                run.frame_index += 1;
            }
        }

        let finished = run.frame_index >= total;
        let frame = PlaybackFrame {
            generation: self.generation,
            simulated_ms,
            frame_index: run.frame_index,
            strokes,
            finished,
        };

        if finished {
            info!(generation = self.generation, "playback finished");
            self.state = PlaybackState::Finished;
        }
        Some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::{FixedRandom, SeededRandom};
    use crate::trace::Point;

    /// Pattern with one point every 100ms from `first` to `last`
    fn timed(first: i64, last: i64) -> Pattern {
        (0..)
            .map(|i| first + i * 100)
            .take_while(|t| *t <= last)
            .map(|t| Point::new(0.0, 0.0, t))
            .collect::<Vec<_>>()
            .into()
    }

    fn revealed(frame: &PlaybackFrame) -> Vec<(usize, usize)> {
        frame
            .strokes
            .iter()
            .map(|s| (s.pattern_index, s.revealed))
            .collect()
    }

    /// Ticks every 16ms from `start` until finished; returns every frame
    fn run_to_end(engine: &mut PlaybackEngine, start: i64) -> Vec<PlaybackFrame> {
        let mut frames = Vec::new();
        let mut rng = FixedRandom(0.0);
        let mut now = start;
        while let Some(frame) = engine.tick(now, &mut rng) {
            frames.push(frame);
            now += 16;
            assert!(frames.len() < 10_000, "playback never finished");
        }
        frames
    }

    #[test]
    fn test_tick_without_run_is_noop() {
        let mut engine = PlaybackEngine::new();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert!(engine.tick(0, &mut FixedRandom(0.0)).is_none());
    }

    #[test]
    fn test_state_names() {
        assert_eq!(PlaybackState::Playing.to_string(), "Playing");
        assert_eq!(PlaybackState::Finished.to_string(), "Finished");
    }

    #[test]
    fn test_two_patterns_at_double_speed() {
        let mut engine = PlaybackEngine::new();
        engine.play(vec![timed(0, 1_000), timed(500, 3_000)], 2.0, 10_000);

        let mut rng = FixedRandom(0.0);
        let mut last = None;
        for wall in (0..=600).step_by(20) {
            last = engine.tick(10_000 + wall, &mut rng);
        }
        let frame = last.unwrap();

        assert_eq!(frame.simulated_ms, 1_200.0);
        assert_eq!(frame.strokes.len(), 2);
        // first pattern fully shown
        assert_eq!(frame.strokes[0].revealed, 11);
        // second shows 500..=1200 in 100ms steps
        assert_eq!(frame.strokes[1].revealed, 8);
        let second = &engine.patterns()[1];
        assert!(second.points()[..frame.strokes[1].revealed]
            .iter()
            .all(|p| p.time <= 1_200));
        assert_eq!(frame.strokes[0].weight, 0.5);
        assert_eq!(frame.strokes[1].weight, 1.0);
        assert!(!frame.finished);
    }

    #[test]
    fn test_single_tick_advances_at_most_one_pattern() {
        let mut engine = PlaybackEngine::new();
        engine.play(vec![timed(0, 100), timed(0, 100), timed(0, 100)], 1.0, 0);

        let mut rng = FixedRandom(0.0);
        let frame = engine.tick(10_000, &mut rng).unwrap();
        assert_eq!(frame.strokes.len(), 1);
        assert_eq!(frame.frame_index, 1);

        let frame = engine.tick(10_000, &mut rng).unwrap();
        assert_eq!(frame.strokes.len(), 2);
        assert_eq!(frame.frame_index, 2);

        let frame = engine.tick(10_000, &mut rng).unwrap();
        assert_eq!(frame.strokes.len(), 3);
        assert!(frame.finished);
        assert_eq!(engine.state(), PlaybackState::Finished);
        assert!(engine.tick(10_016, &mut rng).is_none());
    }

    #[test]
    fn test_replay_is_identical() {
        let patterns = vec![timed(0, 700), timed(200, 1_500), timed(1_000, 1_800)];
        let mut engine = PlaybackEngine::new();

        engine.play(patterns.clone(), 1.5, 0);
        let first: Vec<_> = run_to_end(&mut engine, 0).iter().map(revealed).collect();
        assert_eq!(engine.state(), PlaybackState::Finished);

        engine.play(patterns, 1.5, 50_000);
        let second: Vec<_> = run_to_end(&mut engine, 50_000)
            .iter()
            .map(revealed)
            .collect();

        assert_eq!(first, second);
        assert!(!first.is_empty());
    }

    #[test]
    fn test_play_cancels_previous_run() {
        let mut engine = PlaybackEngine::new();
        let g1 = engine.play(vec![timed(0, 5_000)], 1.0, 0);
        let g2 = engine.play(vec![timed(0, 100)], 1.0, 1_000);
        assert!(g2 > g1);
        assert_eq!(engine.patterns().len(), 1);
        assert_eq!(engine.patterns()[0].last_time(), Some(100));

        let frame = engine.tick(1_000, &mut FixedRandom(0.0)).unwrap();
        assert_eq!(frame.generation, g2);
        assert_eq!(frame.simulated_ms, 0.0);
    }

    #[test]
    fn test_stop_resets_to_stopped() {
        let mut engine = PlaybackEngine::new();
        let g = engine.play(vec![timed(0, 5_000)], 1.0, 0);
        engine.stop();
        assert_eq!(engine.state(), PlaybackState::Stopped);
        assert!(engine.generation() > g);
        assert!(engine.patterns().is_empty());
        assert!(engine.tick(100, &mut FixedRandom(0.0)).is_none());
    }

    #[test]
    fn test_empty_session_finishes_immediately() {
        let mut engine = PlaybackEngine::new();
        engine.play(Vec::new(), 1.0, 0);
        let frame = engine.tick(0, &mut FixedRandom(0.0)).unwrap();
        assert!(frame.finished);
        assert!(frame.strokes.is_empty());
        assert_eq!(engine.state(), PlaybackState::Finished);
    }

    #[test]
    fn test_empty_pattern_does_not_stall() {
        let mut engine = PlaybackEngine::new();
        engine.play(vec![Pattern::default(), timed(0, 100)], 1.0, 0);
        let frames = run_to_end(&mut engine, 0);
        assert!(frames.last().unwrap().finished);
    }

    #[test]
    fn test_invalid_speed_falls_back_to_realtime() {
        let mut engine = PlaybackEngine::new();
        engine.play(vec![timed(0, 100)], 0.0, 0);
        assert_eq!(engine.speed(), Some(1.0));
        engine.play(vec![timed(0, 100)], f64::NAN, 0);
        assert_eq!(engine.speed(), Some(1.0));
    }

    #[test]
    fn test_hue_comes_from_random_source() {
        let mut engine = PlaybackEngine::new();
        engine.play(vec![timed(0, 100)], 1.0, 0);
        let frame = engine.tick(0, &mut FixedRandom(0.5)).unwrap();
        assert_eq!(frame.strokes[0].hue, 180.0);

        engine.play(vec![timed(0, 100)], 1.0, 0);
        let frame = engine.tick(0, &mut SeededRandom::new(1)).unwrap();
        assert!((0.0..360.0).contains(&frame.strokes[0].hue));
    }
}
