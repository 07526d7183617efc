use serde::{Deserialize, Deserializer, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SESSION_KEY_PREFIX: &str = "session_";

/// A single traced sample, relative to the surface center and the session start
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    /// milliseconds since the owning session started
    pub time: i64,
}

impl Point {
    pub fn new(x: f64, y: f64, time: i64) -> Self {
        Self { x, y, time }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }
}

/// A decoded pattern whose times break the recording invariants
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidPattern {
    #[error("point {index} has negative time {time}")]
    NegativeTime { index: usize, time: i64 },

    #[error("point {index} goes back in time ({previous} -> {time})")]
    TimeWentBackwards {
        index: usize,
        previous: i64,
        time: i64,
    },
}

/// One committed stroke. Points are kept in recorded order, which is also time order.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(transparent)]
pub struct Pattern {
    points: Vec<Point>,
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let pattern = Self::new(Vec::<Point>::deserialize(deserializer)?);
        pattern.validate().map_err(serde::de::Error::custom)?;
        Ok(pattern)
    }
}

impl Pattern {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Timestamp of the final point, `None` for an empty pattern
    pub fn last_time(&self) -> Option<i64> {
        self.points.last().map(|p| p.time)
    }

    /// Prefix of points recorded at or before `t`.
    ///
    /// Times never decrease inside a pattern, so the matching points always
    /// form a prefix and a binary search finds its end.
    pub fn revealed(&self, t: f64) -> &[Point] {
        let end = self.points.partition_point(|p| (p.time as f64) <= t);
        &self.points[..end]
    }

    /// Highest point on screen (smallest y), used to place the elapsed-time label
    pub fn peak(&self) -> Option<&Point> {
        self.points
            .iter()
            .min_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal))
    }

    pub fn is_time_ordered(&self) -> bool {
        self.points.windows(2).all(|w| w[0].time <= w[1].time)
    }

    /// Checks that every time is non-negative and never decreases
    pub fn validate(&self) -> Result<(), InvalidPattern> {
        let mut previous = 0;
        for (index, point) in self.points.iter().enumerate() {
            if point.time < 0 {
                return Err(InvalidPattern::NegativeTime {
                    index,
                    time: point.time,
                });
            }
            if point.time < previous {
                return Err(InvalidPattern::TimeWentBackwards {
                    index,
                    previous,
                    time: point.time,
                });
            }
            previous = point.time;
        }
        Ok(())
    }
}

impl From<Vec<Point>> for Pattern {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Store key of a session: `session_<epoch-millis>`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    pub fn from_millis(epoch_ms: i64) -> Self {
        Self(format!("{SESSION_KEY_PREFIX}{epoch_ms}"))
    }

    /// Epoch millis embedded in the key, if it has the expected shape
    pub fn timestamp(&self) -> Option<i64> {
        self.0
            .strip_prefix(SESSION_KEY_PREFIX)
            .and_then(|ts| ts.parse().ok())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for SessionId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp()
            .cmp(&other.timestamp())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for SessionId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SessionId {
    type Err = String;

    /// Accepts either the full key or the bare timestamp
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = if s.starts_with(SESSION_KEY_PREFIX) {
            Self(s.to_string())
        } else {
            Self(format!("{SESSION_KEY_PREFIX}{s}"))
        };

        match id.timestamp() {
            Some(_) => Ok(id),
            None => Err(format!("'{s}' is not a session id (expected session_<millis>)")),
        }
    }
}

/// A recording unit: committed patterns plus the absolute time recording began
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: SessionId,
    pub start_time: i64,
    pub patterns: Vec<Pattern>,
}

impl Session {
    pub fn new(id: SessionId, start_time: i64) -> Self {
        Self {
            id,
            start_time,
            patterns: Vec::new(),
        }
    }

    pub fn from_record(id: SessionId, record: SessionRecord) -> Self {
        Self {
            id,
            start_time: record.session_start_time,
            patterns: record.patterns,
        }
    }

    pub fn to_record(&self) -> SessionRecord {
        SessionRecord {
            patterns: self.patterns.clone(),
            session_start_time: self.start_time,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn total_points(&self) -> usize {
        self.patterns.iter().map(Pattern::len).sum()
    }

    /// Sum of every pattern's final timestamp.
    ///
    /// Pattern times are all relative to the session start, so this counts
    /// overlapping spans more than once. The browser app reported duration
    /// this way and existing session lists depend on it.
    pub fn duration_ms(&self) -> i64 {
        summed_duration_ms(&self.patterns)
    }
}

pub(crate) fn summed_duration_ms(patterns: &[Pattern]) -> i64 {
    patterns
        .iter()
        .map(|p| p.last_time().unwrap_or(0))
        .fold(0i64, i64::saturating_add)
}

/// On-disk and exchange encoding of a session. The id is never part of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub patterns: Vec<Pattern>,
    pub session_start_time: i64,
}
