use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line as TextLine, Span},
    widgets::{
        canvas::{Canvas, Context, Line},
        Block, Borders,
    },
    Frame,
};
use unicode_width::UnicodeWidthStr;

use crate::playback::PlaybackFrame;
use crate::sampler::Surface;
use crate::trace::{Pattern, Point};
use crate::util::format_elapsed_label;

/// Approximate pixel size of a terminal cell, so sampler spacing keeps
/// roughly the same feel as on a pointer surface
pub const CELL_WIDTH_PX: f64 = 8.0;
pub const CELL_HEIGHT_PX: f64 = 16.0;

const PROMPT: &str = "Focus on the crosshair and trace your migraine aura";
const CROSSHAIR_HALF: f64 = 0.03;

pub fn surface_for(area: Rect) -> Surface {
    Surface::new(
        area.width as f64 * CELL_WIDTH_PX,
        area.height as f64 * CELL_HEIGHT_PX,
    )
}

pub fn contains(area: Rect, column: u16, row: u16) -> bool {
    column >= area.x && column < area.right() && row >= area.y && row < area.bottom()
}

/// Cell center to offset from the surface center, in surface fractions.
/// Cells outside the area map past ±0.5.
pub fn normalize(area: Rect, column: u16, row: u16) -> (f64, f64) {
    let width = area.width.max(1) as f64;
    let height = area.height.max(1) as f64;
    let x = (column as f64 - area.x as f64 + 0.5) / width - 0.5;
    let y = (row as f64 - area.y as f64 + 0.5) / height - 0.5;
    (x, y)
}

/// Fully saturated HSL color at 50% lightness, dimmed by `weight`
pub fn stroke_color(hue: f64, weight: f64) -> Color {
    let h = hue.rem_euclid(360.0) / 60.0;
    let x = 1.0 - (h % 2.0 - 1.0).abs();
    let (r, g, b) = match h as u32 {
        0 => (1.0, x, 0.0),
        1 => (x, 1.0, 0.0),
        2 => (0.0, 1.0, x),
        3 => (0.0, x, 1.0),
        4 => (x, 0.0, 1.0),
        _ => (1.0, 0.0, x),
    };
    let w = weight.clamp(0.0, 1.0);
    let channel = |v: f64| (v * w * 255.0).round() as u8;
    Color::Rgb(channel(r), channel(g), channel(b))
}

/// Stable hue per pattern index for the static view
fn index_hue(index: usize) -> f64 {
    (index as f64 * 137.5) % 360.0
}

/// What the surface shows this frame
pub enum SurfaceView<'a> {
    /// All committed patterns, earlier ones faded
    Patterns(&'a [Pattern]),
    /// A playback frame over the patterns it was built from
    Playback {
        patterns: &'a [Pattern],
        frame: &'a PlaybackFrame,
    },
}

fn draw_polyline(ctx: &mut Context, points: &[Point], color: Color) {
    for pair in points.windows(2) {
        ctx.draw(&Line {
            x1: pair[0].x,
            y1: -pair[0].y,
            x2: pair[1].x,
            y2: -pair[1].y,
            color,
        });
    }
}

fn draw_label(ctx: &mut Context, pattern: &Pattern, area: Rect) {
    let Some(peak) = pattern.peak() else {
        return;
    };
    let text = format_elapsed_label(peak.time);
    let half_width = text.width() as f64 / 2.0 / area.width.max(1) as f64;
    let one_row = 1.0 / area.height.max(1) as f64;
    ctx.print(
        peak.x - half_width,
        -peak.y + one_row,
        TextLine::styled(text, Style::default().fg(Color::Gray)),
    );
}

fn draw_crosshair(ctx: &mut Context, area: Rect) {
    let color = Color::DarkGray;
    let aspect = area.width.max(1) as f64 * CELL_WIDTH_PX / (area.height.max(1) as f64 * CELL_HEIGHT_PX);
    ctx.draw(&Line {
        x1: -CROSSHAIR_HALF,
        y1: 0.0,
        x2: CROSSHAIR_HALF,
        y2: 0.0,
        color,
    });
    ctx.draw(&Line {
        x1: 0.0,
        y1: -CROSSHAIR_HALF * aspect,
        x2: 0.0,
        y2: CROSSHAIR_HALF * aspect,
        color,
    });

    let half_width = PROMPT.width() as f64 / 2.0 / area.width.max(1) as f64;
    let above = 3.0 / area.height.max(1) as f64;
    ctx.print(
        -half_width,
        CROSSHAIR_HALF * aspect + above,
        TextLine::from(Span::styled(
            PROMPT,
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::ITALIC),
        )),
    );
}

/// Renders the tracing surface and returns the inner area used for pointer mapping
pub fn render_surface(
    f: &mut Frame,
    area: Rect,
    title: &str,
    view: SurfaceView,
    in_progress: &[Point],
) -> Rect {
    let block = Block::default().borders(Borders::ALL).title(title.to_string());
    let inner = block.inner(area);

    let canvas = Canvas::default()
        .block(block)
        .marker(Marker::Braille)
        .x_bounds([-0.5, 0.5])
        .y_bounds([-0.5, 0.5])
        .paint(|ctx| {
            draw_crosshair(ctx, inner);
            ctx.layer();

            match &view {
                SurfaceView::Patterns(patterns) => {
                    let total = patterns.len();
                    for (i, pattern) in patterns.iter().enumerate() {
                        let weight = (i + 1) as f64 / total as f64;
                        draw_polyline(ctx, pattern.points(), stroke_color(index_hue(i), weight));
                    }
                    ctx.layer();
                    for pattern in patterns.iter() {
                        draw_label(ctx, pattern, inner);
                    }
                }
                SurfaceView::Playback { patterns, frame } => {
                    for stroke in &frame.strokes {
                        if let Some(pattern) = patterns.get(stroke.pattern_index) {
                            let shown = &pattern.points()[..stroke.revealed.min(pattern.len())];
                            draw_polyline(ctx, shown, stroke_color(stroke.hue, stroke.weight));
                        }
                    }
                }
            }

            ctx.layer();
            draw_polyline(ctx, in_progress, Color::Yellow);
        });

    f.render_widget(canvas, area);
    inner
}
