pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}

/// `m:ss`, minutes unbounded
pub fn format_duration(milliseconds: i64) -> String {
    let seconds = milliseconds.max(0) / 1000;
    let minutes = seconds / 60;
    format!("{}:{:02}", minutes, seconds % 60)
}

pub fn format_speed(speed: f64) -> String {
    format!("{speed:.1}x")
}

/// Label drawn above a pattern: whole seconds since the session started
pub fn format_elapsed_label(time_ms: i64) -> String {
    format!("+{}s", time_ms.max(0) / 1000)
}
