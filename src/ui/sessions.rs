use ratatui::{
    layout::{Alignment, Constraint, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::store::SessionSummary;
use crate::trace::SessionId;
use crate::util::format_duration;

fn started_label(summary: &SessionSummary) -> String {
    summary
        .started_at_local()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| summary.id.clone())
}

pub fn session_row(summary: &SessionSummary) -> Row<'static> {
    Row::new(vec![
        Cell::from(summary.rank.to_string()),
        Cell::from(started_label(summary)),
        Cell::from(format_duration(summary.duration_ms)),
        Cell::from(summary.pattern_count.to_string()),
        Cell::from(format!("{:.2} points", summary.avg_pattern_len)),
    ])
}

pub fn render_sessions(f: &mut Frame, area: Rect, sessions: &[SessionSummary], selected: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!("Sessions ({})", sessions.len()));

    if sessions.is_empty() {
        let empty = Paragraph::new("No saved sessions yet.\nDraw on the surface to record one.")
            .block(block)
            .style(Style::default().fg(Color::Gray))
            .alignment(Alignment::Center);
        f.render_widget(empty, area);
        return;
    }

    let header = Row::new(vec!["#", "Started", "Duration", "Auras", "Avg length"]).style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    );

    let table = Table::new(
        sessions.iter().map(session_row),
        [
            Constraint::Length(4),
            Constraint::Length(20),
            Constraint::Length(9),
            Constraint::Length(6),
            Constraint::Min(12),
        ],
    )
    .header(header)
    .block(block)
    .row_highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD));

    let mut state = TableState::default().with_selected(Some(selected.min(sessions.len() - 1)));
    f.render_stateful_widget(table, area, &mut state);
}

/// Modal asking to confirm deleting `id`, centered over `area`
pub fn render_confirm_delete(f: &mut Frame, area: Rect, id: &SessionId) {
    let width = area.width.min(44);
    let height = area.height.min(5);
    let popup = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + (area.height - height) / 2,
        width,
        height,
    );

    let prompt = Paragraph::new(format!("Delete {id}?\n(y)es / any other key cancels"))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Confirm")
                .style(Style::default().fg(Color::Red)),
        )
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });

    f.render_widget(Clear, popup);
    f.render_widget(prompt, popup);
}
