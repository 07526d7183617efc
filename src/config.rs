use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::recorder::MIN_PATTERN_POINTS;
use crate::sampler::{SamplerConfig, JITTER_AMPLITUDE, POINT_DISTANCE};

pub const MIN_SPEED: f64 = 0.5;
pub const MAX_SPEED: f64 = 10.0;
pub const SPEED_STEP: f64 = 0.5;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub default_speed: f64,
    pub point_distance: f64,
    pub jitter_amplitude: f64,
    pub min_pattern_points: usize,
    pub notice_ms: i64,
    pub restore_last_session: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_speed: 1.0,
            point_distance: POINT_DISTANCE,
            jitter_amplitude: JITTER_AMPLITUDE,
            min_pattern_points: MIN_PATTERN_POINTS,
            notice_ms: 2_000,
            restore_last_session: false,
        }
    }
}

impl Config {
    pub fn sampler(&self) -> SamplerConfig {
        SamplerConfig {
            point_distance: self.point_distance,
            jitter_amplitude: self.jitter_amplitude,
        }
    }
}

/// Clamps a playback speed into the supported range
pub fn clamp_speed(speed: f64) -> f64 {
    if speed.is_finite() {
        speed.clamp(MIN_SPEED, MAX_SPEED)
    } else {
        1.0
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "auratrace") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("auratrace_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        let Ok(bytes) = fs::read(&self.path) else {
            return Config::default();
        };
        match serde_json::from_slice::<Config>(&bytes) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable config");
                Config::default()
            }
        }
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::from)?;
        fs::write(&self.path, data)
    }
}
