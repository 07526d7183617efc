use crate::random::RandomSource;
use crate::trace::Point;

/// Spacing between synthetic points, in surface units
pub const POINT_DISTANCE: f64 = 5.0;
/// Peak-to-peak jitter added to each synthetic point, in normalized units
pub const JITTER_AMPLITUDE: f64 = 0.02;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplerConfig {
    pub point_distance: f64,
    pub jitter_amplitude: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            point_distance: POINT_DISTANCE,
            jitter_amplitude: JITTER_AMPLITUDE,
        }
    }
}

/// Resolution of the tracing surface before coordinates were normalized.
///
/// Normalized deltas are scaled back up by this so that `point_distance`
/// is measured in the same units the pointer moved in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Surface {
    pub width: f64,
    pub height: f64,
}

impl Surface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width: width.max(1.0),
            height: height.max(1.0),
        }
    }
}

impl Default for Surface {
    fn default() -> Self {
        Self::new(800.0, 600.0)
    }
}

/// Turns one raw pointer move into a run of evenly spaced, jittered points
#[derive(Debug, Clone)]
pub struct Sampler {
    config: SamplerConfig,
    surface: Surface,
}

impl Sampler {
    pub fn new(config: SamplerConfig, surface: Surface) -> Self {
        Self { config, surface }
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.surface = surface;
    }

    /// Number of interpolation steps between two normalized points
    pub fn steps_between(&self, from: &Point, to: &Point) -> usize {
        let dx = (to.x - from.x) * self.surface.width;
        let dy = (to.y - from.y) * self.surface.height;
        let distance = (dx * dx + dy * dy).sqrt();

        if self.config.point_distance <= 0.0 || !distance.is_finite() {
            return 1;
        }
        ((distance / self.config.point_distance).floor() as usize).max(1)
    }

    /// Points from just after `previous` up to and including `raw`.
    ///
    /// Every generated point is stamped with `raw.time`, never earlier than
    /// `previous.time`.
    pub fn sample(
        &self,
        previous: &Point,
        raw: &Point,
        rng: &mut dyn RandomSource,
    ) -> Vec<Point> {
        let steps = self.steps_between(previous, raw);
        let dx = raw.x - previous.x;
        let dy = raw.y - previous.y;
        let time = raw.time.max(previous.time);
        let amplitude = self.config.jitter_amplitude;

        (1..=steps)
            .map(|i| {
                let t = i as f64 / steps as f64;
                let jitter_x = (rng.next_unit() - 0.5) * amplitude;
                let jitter_y = (rng.next_unit() - 0.5) * amplitude;
                Point::new(
                    previous.x + dx * t + jitter_x,
                    previous.y + dy * t + jitter_y,
                    time,
                )
            })
            .collect()
    }
}
