//! The single context object that owns every piece of "at most one" state:
//! the active session, the recorder, the playback run and the notices.
//!
//! Nothing in here reads the clock. Every operation takes `now` in epoch
//! milliseconds so a test can drive it exactly.

use chrono::{Local, SecondsFormat, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{clamp_speed, Config, SPEED_STEP};
use crate::playback::{PlaybackEngine, PlaybackFrame, PlaybackState};
use crate::random::RandomSource;
use crate::recorder::{PatternRecorder, StrokeOutcome};
use crate::sampler::{Sampler, Surface};
use crate::store::{KeyValueStore, SaveOutcome, SessionStore, SessionSummary};
use crate::trace::{Point, Session, SessionId};
use crate::util::format_duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// Transient, dismissible message
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub level: NoticeLevel,
    pub expires_at: i64,
}

pub fn export_file_name(now: i64) -> String {
    let stamp = Utc
        .timestamp_millis_opt(now)
        .single()
        .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_else(|| now.to_string());
    format!("migraine_session_{}.json", stamp.replace(':', "-"))
}

pub fn download_file_name(id: &SessionId) -> String {
    format!("migraine_session_{id}.json")
}

pub struct Studio<S: KeyValueStore> {
    store: SessionStore<S>,
    recorder: PatternRecorder,
    playback: PlaybackEngine,
    active: Option<Session>,
    last_frame: Option<PlaybackFrame>,
    speed: f64,
    rng: Box<dyn RandomSource>,
    notices: Vec<Notice>,
    notice_ms: i64,
}

impl<S: KeyValueStore> Studio<S> {
    pub fn new(
        store: SessionStore<S>,
        config: &Config,
        surface: Surface,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            store,
            recorder: PatternRecorder::new(
                Sampler::new(config.sampler(), surface),
                config.min_pattern_points,
            ),
            playback: PlaybackEngine::new(),
            active: None,
            last_frame: None,
            speed: clamp_speed(config.default_speed),
            rng,
            notices: Vec::new(),
            notice_ms: config.notice_ms,
        }
    }

    pub fn store(&self) -> &SessionStore<S> {
        &self.store
    }

    pub fn recorder(&self) -> &PatternRecorder {
        &self.recorder
    }

    pub fn playback(&self) -> &PlaybackEngine {
        &self.playback
    }

    pub fn active_session(&self) -> Option<&Session> {
        self.active.as_ref()
    }

    pub fn in_progress(&self) -> &[Point] {
        self.recorder.in_progress()
    }

    /// Latest playback frame, kept after the run finishes so the final
    /// picture stays on screen
    pub fn last_frame(&self) -> Option<&PlaybackFrame> {
        self.last_frame.as_ref()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.recorder.sampler_mut().set_surface(surface);
    }

    /// Play, speed and export only make sense with something recorded
    pub fn can_play(&self) -> bool {
        self.active.as_ref().is_some_and(|s| !s.is_empty())
    }

    fn notify(&mut self, message: impl Into<String>, level: NoticeLevel, now: i64) {
        self.notices.push(Notice {
            message: message.into(),
            level,
            expires_at: now + self.notice_ms,
        });
    }

    pub fn dismiss_notices(&mut self) {
        self.notices.clear();
    }

    fn cancel_playback(&mut self) {
        self.playback.stop();
        self.last_frame = None;
    }

    // recording

    pub fn start_recording(&mut self, now: i64) {
        self.cancel_playback();
        let id = match self.store.fresh_id(now) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "could not check for id collisions");
                SessionId::from_millis(now)
            }
        };
        self.recorder.start_session(now);
        info!(id = %id, "recording started");
        self.active = Some(Session::new(id, now));
    }

    pub fn stop_recording(&mut self) {
        if self.recorder.is_recording() {
            info!("recording stopped");
        }
        self.recorder.stop_session();
    }

    pub fn toggle_recording(&mut self, now: i64) {
        if self.recorder.is_recording() {
            self.stop_recording();
        } else {
            self.start_recording(now);
        }
    }

    /// Pressing on the surface starts a session if none is recording
    pub fn pointer_down(&mut self, x: f64, y: f64, now: i64) {
        if !self.recorder.is_recording() {
            self.start_recording(now);
        }
        self.recorder.begin_stroke(x, y, now);
    }

    pub fn pointer_move(&mut self, x: f64, y: f64, now: i64) {
        self.recorder.extend_stroke(x, y, now, self.rng.as_mut());
    }

    /// Pointer left the surface mid-stroke: feed the edge position instead
    pub fn pointer_leave(&mut self, x: f64, y: f64, now: i64) {
        if self.recorder.is_drawing() {
            self.pointer_move(x.clamp(-0.5, 0.5), y.clamp(-0.5, 0.5), now);
        }
    }

    pub fn pointer_up(&mut self, now: i64) -> StrokeOutcome {
        let outcome = self.recorder.end_stroke();
        if let StrokeOutcome::Committed(pattern) = &outcome {
            if let Some(session) = self.active.as_mut() {
                session.patterns.push(pattern.clone());
                info!(
                    id = %session.id,
                    points = pattern.len(),
                    patterns = session.patterns.len(),
                    "pattern committed"
                );
            }
            if !self.playback.is_playing() {
                self.last_frame = None;
            }
            self.persist_active(now);
        }
        outcome
    }

    fn persist_active(&mut self, now: i64) -> bool {
        let Some(session) = self.active.as_ref() else {
            return false;
        };
        match self.store.save(session) {
            Ok(SaveOutcome::Saved) => true,
            Ok(SaveOutcome::EmptySessionDiscarded) => false,
            Err(e) => {
                warn!(error = %e, "failed to save session");
                self.notify("Error saving session", NoticeLevel::Error, now);
                false
            }
        }
    }

    /// Clears the active session and every in-flight activity
    pub fn reset(&mut self) {
        self.cancel_playback();
        self.recorder.reset();
        self.active = None;
        info!("studio reset");
    }

    // playback

    pub fn play(&mut self, now: i64) -> bool {
        let Some(session) = self.active.as_ref().filter(|s| !s.is_empty()) else {
            return false;
        };
        let patterns = session.patterns.clone();
        self.last_frame = None;
        self.playback.play(patterns, self.speed, now);
        true
    }

    pub fn stop_playback(&mut self) {
        self.cancel_playback();
    }

    /// Drives playback and expires notices; call once per display refresh.
    ///
    /// Returns the frame produced by this tick, if a run is playing.
    pub fn tick(&mut self, now: i64) -> Option<&PlaybackFrame> {
        self.notices.retain(|n| n.expires_at > now);
        let frame = self.playback.tick(now, self.rng.as_mut())?;
        self.last_frame = Some(frame);
        self.last_frame.as_ref()
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback.state()
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.speed = clamp_speed(speed);
    }

    pub fn speed_up(&mut self) {
        self.set_speed(self.speed + SPEED_STEP);
    }

    pub fn slow_down(&mut self) {
        self.set_speed(self.speed - SPEED_STEP);
    }

    // sessions

    pub fn sessions(&mut self, now: i64) -> Vec<SessionSummary> {
        match self.store.list() {
            Ok(list) => list,
            Err(e) => {
                warn!(error = %e, "failed to list sessions");
                self.notify("Error reading sessions", NoticeLevel::Error, now);
                Vec::new()
            }
        }
    }

    fn make_active(&mut self, session: Session) {
        self.cancel_playback();
        self.recorder.reset();
        self.active = Some(session);
    }

    /// On failure the active session is left as it was
    pub fn load_session(&mut self, id: &SessionId, now: i64) -> bool {
        match self.store.load(id) {
            Ok(session) => {
                let count = session.patterns.len();
                info!(id = %id, patterns = count, "session loaded");
                self.make_active(session);
                self.notify(
                    format!("Session loaded with {count} Auras"),
                    NoticeLevel::Info,
                    now,
                );
                true
            }
            Err(e) => {
                warn!(id = %id, error = %e, "failed to load session");
                self.notify(format!("Error loading session: {e}"), NoticeLevel::Error, now);
                false
            }
        }
    }

    /// Loads the stored session with the greatest key, if any
    pub fn restore_last_session(&mut self, now: i64) -> bool {
        match self.store.last_key() {
            Ok(Some(id)) => self.load_session(&id, now),
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "failed to look up last session");
                false
            }
        }
    }

    pub fn delete_session(&mut self, id: &SessionId, now: i64) -> bool {
        match self.store.delete(id) {
            Ok(removed) => {
                if self.active.as_ref().is_some_and(|s| &s.id == id) {
                    self.reset();
                }
                removed
            }
            Err(e) => {
                warn!(id = %id, error = %e, "failed to delete session");
                self.notify("Error deleting session", NoticeLevel::Error, now);
                false
            }
        }
    }

    /// Replaces the active session with the imported one.
    ///
    /// Malformed input leaves the store and the active session untouched.
    pub fn import_bytes(&mut self, bytes: &[u8], now: i64) -> bool {
        let session = match self.store.import_from_bytes(bytes, now) {
            Ok(session) => session,
            Err(e) => {
                warn!(error = %e, "import rejected");
                self.notify("Error importing session", NoticeLevel::Error, now);
                return false;
            }
        };

        info!(id = %session.id, patterns = session.patterns.len(), "session imported");
        self.make_active(session);
        self.persist_active(now);
        self.notify("Session imported successfully", NoticeLevel::Info, now);
        true
    }

    pub fn import_file<P: AsRef<Path>>(&mut self, path: P, now: i64) -> bool {
        match fs::read(path.as_ref()) {
            Ok(bytes) => self.import_bytes(&bytes, now),
            Err(e) => {
                warn!(path = %path.as_ref().display(), error = %e, "could not read import file");
                self.notify("Error importing session", NoticeLevel::Error, now);
                false
            }
        }
    }

    /// File name and contents for exporting the active session
    pub fn export_active(&self, now: i64) -> Option<(String, Vec<u8>)> {
        let session = self.active.as_ref().filter(|s| !s.is_empty())?;
        match SessionStore::<S>::export_to_bytes(session) {
            Ok(bytes) => Some((export_file_name(now), bytes)),
            Err(e) => {
                warn!(error = %e, "failed to encode session");
                None
            }
        }
    }

    pub fn export_active_to(&mut self, dir: &Path, now: i64) -> Option<PathBuf> {
        let (name, bytes) = self.export_active(now)?;
        self.write_export(dir.join(name), &bytes, now)
    }

    /// Writes the stored record for `id` verbatim
    pub fn download_session(&mut self, id: &SessionId, dir: &Path, now: i64) -> Option<PathBuf> {
        match self.store.raw_record(id) {
            Ok(bytes) => self.write_export(dir.join(download_file_name(id)), &bytes, now),
            Err(e) => {
                warn!(id = %id, error = %e, "failed to read session for download");
                self.notify("Error downloading session", NoticeLevel::Error, now);
                None
            }
        }
    }

    fn write_export(&mut self, path: PathBuf, bytes: &[u8], now: i64) -> Option<PathBuf> {
        let written = path
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(&path, bytes));
        match written {
            Ok(()) => {
                info!(path = %path.display(), "session exported");
                self.notify(
                    format!("Saved {}", path.display()),
                    NoticeLevel::Info,
                    now,
                );
                Some(path)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "export failed");
                self.notify("Error exporting session", NoticeLevel::Error, now);
                None
            }
        }
    }

    /// One-line description of the active session
    pub fn current_session_info(&self) -> String {
        let Some(session) = self.active.as_ref() else {
            return "No active session".to_string();
        };
        let started = session
            .id
            .timestamp()
            .and_then(|ms| Local.timestamp_millis_opt(ms).single())
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        format!(
            "Current Session: Started {}, Duration: {}, Auras: {}",
            started,
            format_duration(session.duration_ms()),
            session.patterns.len()
        )
    }
}
