use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::path::PathBuf;

use crate::recorder::StrokeOutcome;
use crate::runtime::AuraEvent;
use crate::store::{KeyValueStore, SessionSummary};
use crate::studio::Studio;
use crate::trace::SessionId;
use crate::ui::surface;

#[derive(Debug, Clone, PartialEq)]
pub enum AppState {
    Tracing,
    Sessions,
    ConfirmDelete(SessionId),
}

/// Terminal front end around a [`Studio`]
pub struct App<S: KeyValueStore> {
    pub studio: Studio<S>,
    pub state: AppState,
    pub sessions: Vec<SessionSummary>,
    pub selected: usize,
    pub export_dir: PathBuf,
    pub should_quit: bool,
    canvas_area: Rect,
}

impl<S: KeyValueStore> App<S> {
    pub fn new(studio: Studio<S>, export_dir: PathBuf, now: i64) -> Self {
        let mut app = Self {
            studio,
            state: AppState::Tracing,
            sessions: Vec::new(),
            selected: 0,
            export_dir,
            should_quit: false,
            canvas_area: Rect::default(),
        };
        app.refresh_sessions(now);
        app
    }

    pub fn canvas_area(&self) -> Rect {
        self.canvas_area
    }

    /// Called by the renderer with the inner area of the tracing surface
    pub fn set_canvas_area(&mut self, area: Rect) {
        if area != self.canvas_area {
            self.canvas_area = area;
            self.studio.set_surface(surface::surface_for(area));
        }
    }

    pub fn refresh_sessions(&mut self, now: i64) {
        self.sessions = self.studio.sessions(now);
        if self.selected >= self.sessions.len() {
            self.selected = self.sessions.len().saturating_sub(1);
        }
    }

    pub fn selected_session(&self) -> Option<SessionId> {
        self.sessions.get(self.selected).map(|s| s.session_id())
    }

    /// Returns true when the event changed something worth redrawing
    pub fn handle(&mut self, event: AuraEvent, now: i64) -> bool {
        match event {
            AuraEvent::Tick => self.studio.tick(now).is_some() || !self.studio.notices().is_empty(),
            AuraEvent::Resize => true,
            AuraEvent::Key(key) => {
                self.on_key(key, now);
                true
            }
            AuraEvent::Mouse(mouse) => self.on_mouse(mouse, now),
        }
    }

    pub fn on_key(&mut self, key: KeyEvent, now: i64) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }

        match self.state.clone() {
            AppState::Tracing => self.on_tracing_key(key.code, now),
            AppState::Sessions => self.on_sessions_key(key.code, now),
            AppState::ConfirmDelete(id) => match key.code {
                KeyCode::Char('y') | KeyCode::Char('Y') => {
                    self.studio.delete_session(&id, now);
                    self.refresh_sessions(now);
                    self.state = AppState::Sessions;
                }
                _ => self.state = AppState::Sessions,
            },
        }
    }

    fn on_tracing_key(&mut self, code: KeyCode, now: i64) {
        match code {
            KeyCode::Esc | KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('r') => self.studio.toggle_recording(now),
            KeyCode::Char(' ') | KeyCode::Char('p') => {
                self.studio.play(now);
            }
            KeyCode::Char('+') | KeyCode::Char('=') if self.studio.can_play() => {
                self.studio.speed_up()
            }
            KeyCode::Char('-') if self.studio.can_play() => self.studio.slow_down(),
            KeyCode::Char('e') => {
                self.studio.export_active_to(&self.export_dir, now);
            }
            KeyCode::Char('x') => self.studio.reset(),
            KeyCode::Char('c') => self.studio.dismiss_notices(),
            KeyCode::Char('s') | KeyCode::Tab => {
                // the stop-recording button lived in the menu
                self.studio.stop_recording();
                self.refresh_sessions(now);
                self.state = AppState::Sessions;
            }
            _ => {}
        }
    }

    fn on_sessions_key(&mut self, code: KeyCode, now: i64) {
        match code {
            KeyCode::Esc | KeyCode::Char('s') | KeyCode::Tab => self.state = AppState::Tracing,
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('c') => self.studio.dismiss_notices(),
            KeyCode::Up | KeyCode::Char('k') => self.selected = self.selected.saturating_sub(1),
            KeyCode::Down | KeyCode::Char('j') => {
                if self.selected + 1 < self.sessions.len() {
                    self.selected += 1;
                }
            }
            KeyCode::Enter => {
                if let Some(id) = self.selected_session() {
                    if self.studio.load_session(&id, now) {
                        self.state = AppState::Tracing;
                    }
                }
            }
            KeyCode::Char('d') => {
                if let Some(id) = self.selected_session() {
                    self.state = AppState::ConfirmDelete(id);
                }
            }
            KeyCode::Char('w') => {
                if let Some(id) = self.selected_session() {
                    self.studio.download_session(&id, &self.export_dir, now);
                }
            }
            _ => {}
        }
    }

    pub fn on_mouse(&mut self, mouse: MouseEvent, now: i64) -> bool {
        if self.state != AppState::Tracing || self.canvas_area.is_empty() {
            return false;
        }
        let area = self.canvas_area;
        let inside = surface::contains(area, mouse.column, mouse.row);
        let (x, y) = surface::normalize(area, mouse.column, mouse.row);

        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) if inside => {
                self.studio.pointer_down(x, y, now);
                true
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                if inside {
                    self.studio.pointer_move(x, y, now);
                } else {
                    self.studio.pointer_leave(x, y, now);
                }
                true
            }
            MouseEventKind::Up(MouseButton::Left) => {
                if let StrokeOutcome::Committed(_) = self.studio.pointer_up(now) {
                    self.refresh_sessions(now);
                }
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::random::FixedRandom;
    use crate::sampler::Surface;
    use crate::store::{MemoryKeyValueStore, SessionStore};

    fn app() -> App<MemoryKeyValueStore> {
        let studio = Studio::new(
            SessionStore::new(MemoryKeyValueStore::new()),
            &Config::default(),
            Surface::default(),
            Box::new(FixedRandom(0.5)),
        );
        let mut app = App::new(studio, std::env::temp_dir(), 0);
        app.set_canvas_area(Rect::new(1, 1, 80, 24));
        app
    }

    fn key(c: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)
    }

    fn mouse(kind: MouseEventKind, column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn drag_stroke(app: &mut App<MemoryKeyValueStore>, start: i64, cells: u16) {
        app.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 10), start);
        for i in 1..=cells {
            app.on_mouse(
                mouse(MouseEventKind::Drag(MouseButton::Left), 5 + i, 10),
                start + i as i64 * 10,
            );
        }
        app.on_mouse(
            mouse(MouseEventKind::Up(MouseButton::Left), 5 + cells, 10),
            start + 1_000,
        );
    }

    #[test]
    fn test_drag_records_pattern_and_refreshes_list() {
        let mut app = app();
        drag_stroke(&mut app, 1_000, 30);
        let session = app.studio.active_session().unwrap();
        assert_eq!(session.patterns.len(), 1);
        assert_eq!(app.sessions.len(), 1);
        assert_eq!(app.sessions[0].pattern_count, 1);
    }

    #[test]
    fn test_mouse_ignored_outside_tracing_state() {
        let mut app = app();
        app.on_key(key('s'), 0);
        assert_eq!(app.state, AppState::Sessions);
        assert!(!app.on_mouse(mouse(MouseEventKind::Down(MouseButton::Left), 5, 5), 0));
        assert!(app.studio.active_session().is_none());
    }

    #[test]
    fn test_speed_keys_need_a_recording() {
        let mut app = app();
        app.on_key(key('+'), 0);
        assert_eq!(app.studio.speed(), 1.0);

        drag_stroke(&mut app, 1_000, 30);
        app.on_key(key('+'), 2_000);
        app.on_key(key('+'), 2_000);
        assert_eq!(app.studio.speed(), 2.0);
        app.on_key(key('-'), 2_000);
        assert_eq!(app.studio.speed(), 1.5);
    }

    #[test]
    fn test_delete_needs_confirmation() {
        let mut app = app();
        drag_stroke(&mut app, 1_000, 30);
        app.on_key(key('s'), 2_000);
        app.on_key(key('d'), 2_000);
        assert_eq!(
            app.state,
            AppState::ConfirmDelete(SessionId::from_millis(1_000))
        );

        app.on_key(key('n'), 2_000);
        assert_eq!(app.state, AppState::Sessions);
        assert_eq!(app.sessions.len(), 1);

        app.on_key(key('d'), 2_000);
        app.on_key(key('y'), 2_000);
        assert!(app.sessions.is_empty());
        assert!(app.studio.active_session().is_none());
    }

    #[test]
    fn test_enter_loads_selected_session() {
        let mut app = app();
        drag_stroke(&mut app, 1_000, 30);
        app.on_key(key('x'), 2_000);
        assert!(app.studio.active_session().is_none());

        app.on_key(key('s'), 2_000);
        app.on_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE), 2_000);
        assert_eq!(app.state, AppState::Tracing);
        assert_eq!(app.studio.active_session().unwrap().patterns.len(), 1);
    }

    #[test]
    fn test_c_dismisses_notices() {
        let mut app = app();
        assert!(!app.studio.import_bytes(b"{\"patterns\": 3}", 0));
        assert_eq!(app.studio.notices().len(), 1);
        app.on_key(key('c'), 10);
        assert!(app.studio.notices().is_empty());

        app.studio.import_bytes(b"not json", 20);
        app.on_key(key('s'), 30);
        assert_eq!(app.state, AppState::Sessions);
        app.on_key(key('c'), 40);
        assert!(app.studio.notices().is_empty());
    }

    #[test]
    fn test_quit_keys() {
        let mut app = app();
        app.on_key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL), 0);
        assert!(app.should_quit);

        let mut app = self::app();
        app.on_key(key('q'), 0);
        assert!(app.should_quit);
    }
}
