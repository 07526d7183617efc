use std::sync::mpsc::{self, Sender};
use std::time::Duration;

use auratrace::app::{App, AppState};
use auratrace::clock::{Clock, ManualClock};
use auratrace::config::Config;
use auratrace::playback::PlaybackState;
use auratrace::random::FixedRandom;
use auratrace::runtime::{AuraEvent, FixedTicker, Runner, TestEventSource};
use auratrace::sampler::Surface;
use auratrace::store::{KeyValueStore, MemoryKeyValueStore, SessionStore};
use auratrace::studio::{NoticeLevel, Studio};
use auratrace::trace::{Pattern, Point, Session, SessionId};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;

const FRAME_MS: i64 = 16;

// Headless harness: the real App driven through Runner/TestEventSource with a
// hand-driven clock, no TTY involved.
struct Harness {
    app: App<MemoryKeyValueStore>,
    runner: Runner<TestEventSource, FixedTicker>,
    tx: Sender<AuraEvent>,
    clock: ManualClock,
}

impl Harness {
    fn new(kv: MemoryKeyValueStore) -> Self {
        let studio = Studio::new(
            SessionStore::new(kv),
            &Config::default(),
            Surface::default(),
            Box::new(FixedRandom(0.5)),
        );
        let clock = ManualClock::new(1_700_000_000_000);
        let mut app = App::new(studio, std::env::temp_dir(), clock.now_ms());
        // 80x24 cells: one column is 8 surface units, so each drag cell adds one point
        app.set_canvas_area(Rect::new(0, 0, 80, 24));

        let (tx, rx) = mpsc::channel();
        let runner = Runner::new(
            TestEventSource::new(rx),
            FixedTicker::new(Duration::from_millis(1)),
        );
        Self {
            app,
            runner,
            tx,
            clock,
        }
    }

    fn send(&self, event: AuraEvent) {
        self.tx.send(event).unwrap();
    }

    fn mouse(&self, kind: MouseEventKind, column: u16, row: u16) {
        self.send(AuraEvent::Mouse(MouseEvent {
            kind,
            column,
            row,
            modifiers: KeyModifiers::NONE,
        }));
    }

    fn key(&self, c: char) {
        self.send(AuraEvent::Key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE)));
    }

    /// Queues a horizontal drag producing `moves + 1` raw points
    fn drag(&self, row: u16, moves: u16) {
        self.mouse(MouseEventKind::Down(MouseButton::Left), 10, row);
        for i in 1..=moves {
            self.mouse(MouseEventKind::Drag(MouseButton::Left), 10 + i, row);
        }
        self.mouse(MouseEventKind::Up(MouseButton::Left), 10 + moves, row);
    }

    /// Advances one frame per step, for at most `steps` steps
    fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            let now = self.clock.advance(FRAME_MS);
            let event = self.runner.step();
            self.app.handle(event, now);
        }
    }

    fn run_until(&mut self, max_steps: usize, done: impl Fn(&App<MemoryKeyValueStore>) -> bool) {
        for _ in 0..max_steps {
            if done(&self.app) {
                return;
            }
            self.run(1);
        }
    }

    fn stored_keys(&self) -> Vec<String> {
        self.app.studio.store().backend().keys().unwrap()
    }
}

fn timed(last: i64) -> Pattern {
    (0..=last / 100)
        .map(|i| Point::new(i as f64 * 0.001, 0.0, i * 100))
        .collect::<Vec<_>>()
        .into()
}

#[test]
fn long_stroke_is_committed_and_persisted() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    let started = h.clock.now_ms() + FRAME_MS;
    h.drag(12, 24);
    h.run(30);

    let session = h.app.studio.active_session().expect("a session");
    assert_eq!(session.patterns.len(), 1);
    assert!(session.patterns[0].len() >= 25);
    assert!(session.patterns[0].is_time_ordered());
    assert_eq!(h.stored_keys(), vec![format!("session_{started}")]);
    assert_eq!(h.app.sessions.len(), 1);
}

#[test]
fn short_stroke_leaves_store_unchanged() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.drag(12, 9);
    h.run(20);

    assert!(h.app.studio.active_session().unwrap().patterns.is_empty());
    assert!(h.stored_keys().is_empty());
    assert!(h.app.studio.notices().is_empty());
}

#[test]
fn playback_reveals_by_simulated_time() {
    let mut kv = MemoryKeyValueStore::new();
    let mut session = Session::new(SessionId::from_millis(1), 1);
    session.patterns = vec![timed(1_000), timed(3_000)];
    kv.set(
        "session_1",
        &serde_json::to_string(&session.to_record()).unwrap(),
    )
    .unwrap();

    let studio_start = 0;
    let mut studio = Studio::new(
        SessionStore::new(kv),
        &Config::default(),
        Surface::default(),
        Box::new(FixedRandom(0.5)),
    );
    assert!(studio.load_session(&SessionId::from_millis(1), studio_start));
    studio.set_speed(2.0);
    assert!(studio.play(studio_start));

    let mut last = None;
    for wall in (20..=600).step_by(20) {
        if let Some(frame) = studio.tick(studio_start + wall) {
            last = Some(frame.clone());
        }
    }

    let frame = last.expect("frames while playing");
    assert_eq!(frame.simulated_ms, 1_200.0);
    assert_eq!(frame.strokes.len(), 2);
    assert_eq!(frame.strokes[0].revealed, 11);
    assert_eq!(frame.strokes[1].revealed, 13);
    assert_eq!(studio.playback_state(), PlaybackState::Playing);
}

#[test]
fn malformed_import_keeps_active_session() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.drag(12, 24);
    h.run(30);
    let before = h.app.studio.active_session().cloned();
    let keys = h.stored_keys();

    let now = h.clock.now_ms();
    assert!(!h
        .app
        .studio
        .import_bytes(br#"{"patterns": "not-an-array"}"#, now));

    assert_eq!(h.app.studio.active_session().cloned(), before);
    assert_eq!(h.stored_keys(), keys);
    assert_eq!(h.app.studio.notices()[0].level, NoticeLevel::Error);
}

#[test]
fn deleting_active_session_stops_playback() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.drag(12, 24);
    h.run(30);

    h.key(' ');
    h.run(2);
    assert_eq!(h.app.studio.playback_state(), PlaybackState::Playing);

    h.key('s');
    h.key('d');
    h.key('y');
    h.run(3);

    assert_eq!(h.app.state, AppState::Sessions);
    assert!(h.app.studio.active_session().is_none());
    assert_eq!(h.app.studio.playback_state(), PlaybackState::Stopped);
    assert!(h.stored_keys().is_empty());
}

#[test]
fn playback_finishes_and_replays_identically() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.drag(8, 24);
    h.run(30);
    h.drag(16, 30);
    h.run(40);
    h.key('r');
    h.run(1);
    assert!(!h.app.studio.recorder().is_recording());

    h.key(' ');
    h.run(1);
    h.run_until(2_000, |app| {
        app.studio.playback_state() == PlaybackState::Finished
    });
    let first = h.app.studio.last_frame().cloned().expect("final frame");
    assert!(first.finished);

    h.key(' ');
    h.run(1);
    h.run_until(2_000, |app| {
        app.studio.playback_state() == PlaybackState::Finished
    });
    let second = h.app.studio.last_frame().cloned().expect("final frame");

    assert!(second.generation > first.generation);
    let revealed = |f: &auratrace::playback::PlaybackFrame| {
        f.strokes.iter().map(|s| s.revealed).collect::<Vec<_>>()
    };
    assert_eq!(revealed(&first), revealed(&second));
}

#[test]
fn exported_session_imports_with_same_patterns() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.drag(12, 24);
    h.run(30);

    let now = h.clock.now_ms();
    let (_, bytes) = h.app.studio.export_active(now).expect("something to export");
    let original = h.app.studio.active_session().cloned().unwrap();

    let later = h.clock.advance(5_000);
    assert!(h.app.studio.import_bytes(&bytes, later));
    let imported = h.app.studio.active_session().unwrap();
    assert_eq!(imported.id, SessionId::from_millis(later));
    assert_eq!(imported.patterns, original.patterns);
    assert_eq!(imported.start_time, original.start_time);
    assert_eq!(h.stored_keys().len(), 2);
}

#[test]
fn quit_key_stops_the_loop() {
    let mut h = Harness::new(MemoryKeyValueStore::new());
    h.key('q');
    h.run_until(10, |app| app.should_quit);
    assert!(h.app.should_quit);
}
