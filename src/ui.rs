pub mod sessions;
pub mod surface;

use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

use crate::app::{App, AppState};
use crate::playback::PlaybackState;
use crate::store::KeyValueStore;
use crate::studio::NoticeLevel;
use crate::util::format_speed;

use self::surface::SurfaceView;

const SESSIONS_WIDTH_PERCENT: u16 = 50;

fn key_hint(key: &str, label: &str, enabled: bool) -> Vec<Span<'static>> {
    let style = if enabled {
        Style::default().add_modifier(Modifier::BOLD)
    } else {
        Style::default().add_modifier(Modifier::DIM)
    };
    vec![
        Span::styled(format!("({key})"), style),
        Span::styled(format!("{label}  "), style.remove_modifier(Modifier::BOLD)),
    ]
}

fn help_line<S: KeyValueStore>(app: &App<S>) -> Line<'static> {
    let studio = &app.studio;
    let can_play = studio.can_play();
    let recording = studio.recorder().is_recording();

    let spans: Vec<Span> = match app.state {
        AppState::Tracing => [
            key_hint("r", if recording { "stop" } else { "record" }, true),
            key_hint("space", "play", can_play),
            key_hint("+/-", &format!("speed {}", format_speed(studio.speed())), can_play),
            key_hint("e", "export", can_play),
            key_hint("x", "reset", true),
            key_hint("s", "sessions", true),
            key_hint("q", "quit", true),
        ]
        .concat(),
        AppState::Sessions => {
            let any = !app.sessions.is_empty();
            [
                key_hint("↑/↓", "select", any),
                key_hint("enter", "load", any),
                key_hint("w", "download", any),
                key_hint("d", "delete", any),
                key_hint("esc", "back", true),
            ]
            .concat()
        }
        AppState::ConfirmDelete(_) => key_hint("y", "confirm delete", true),
    };
    Line::from(spans)
}

fn status_line<S: KeyValueStore>(app: &App<S>) -> Line<'static> {
    if let Some(notice) = app.studio.notices().last() {
        let color = match notice.level {
            NoticeLevel::Info => Color::Green,
            NoticeLevel::Error => Color::Red,
        };
        let mut spans = vec![Span::styled(
            format!("{}  ", notice.message),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )];
        spans.extend(key_hint("c", "dismiss", true));
        return Line::from(spans);
    }
    Line::from(Span::styled(
        app.studio.current_session_info(),
        Style::default()
            .fg(Color::Cyan)
            .add_modifier(Modifier::ITALIC),
    ))
}

fn surface_title<S: KeyValueStore>(app: &App<S>) -> String {
    let studio = &app.studio;
    let activity = if studio.recorder().is_recording() {
        "● recording"
    } else {
        match studio.playback_state() {
            PlaybackState::Playing => "▶ playing",
            PlaybackState::Finished => "■ finished",
            PlaybackState::Stopped => "idle",
        }
    };
    format!(" auratrace · {activity} ")
}

pub fn draw<S: KeyValueStore>(app: &mut App<S>, f: &mut Frame) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(3),
            Constraint::Length(1), // session info or notice
            Constraint::Length(1), // key help
        ])
        .split(f.area());

    let main = if app.state == AppState::Tracing {
        rows[0]
    } else {
        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(100 - SESSIONS_WIDTH_PERCENT),
                Constraint::Percentage(SESSIONS_WIDTH_PERCENT),
            ])
            .split(rows[0]);
        sessions::render_sessions(f, columns[1], &app.sessions, app.selected);
        columns[0]
    };

    let title = surface_title(app);
    let studio = &app.studio;
    let patterns = studio
        .active_session()
        .map(|s| s.patterns.as_slice())
        .unwrap_or(&[]);
    let view = match studio.last_frame() {
        Some(frame) => SurfaceView::Playback {
            patterns: studio.playback().patterns(),
            frame,
        },
        None => SurfaceView::Patterns(patterns),
    };
    let inner = surface::render_surface(f, main, &title, view, studio.in_progress());
    app.set_canvas_area(inner);

    f.render_widget(Paragraph::new(status_line(app)), rows[1]);
    f.render_widget(
        Paragraph::new(help_line(app)).style(Style::default().fg(Color::Gray)),
        rows[2],
    );

    if let AppState::ConfirmDelete(id) = &app.state {
        sessions::render_confirm_delete(f, rows[0], id);
    }
}
