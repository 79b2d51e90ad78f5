//! ui::format
//!
//! Value formatting and cell layout helpers used by the presenter.
//!
//! All widths are measured in `char`s.

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::core::output::Alignment;
use crate::core::value::{format_number, Value};

const BYTE_UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Width of the progress bar in cells.
pub const PROGRESS_WIDTH: usize = 30;

/// Humanize a byte count: divide by 1024 until below 1024 or out of units.
///
/// ```
/// use shellx::ui::format::format_bytes;
///
/// assert_eq!(format_bytes(0.0), "0.0 B");
/// assert_eq!(format_bytes(1024.0), "1.0 KB");
/// assert_eq!(format_bytes(1048576.0), "1.0 MB");
/// ```
pub fn format_bytes(bytes: f64) -> String {
    let mut size = bytes;
    let mut unit = 0;
    while size >= 1024.0 && unit < BYTE_UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", size, BYTE_UNITS[unit])
}

/// Local date-time rendering of an RFC 3339 string or epoch milliseconds.
///
/// Values that are neither are shown as-is.
pub fn format_date(value: &Value) -> String {
    let parsed: Option<DateTime<Utc>> = match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc)),
        Value::Number(ms) if ms.is_finite() => Utc.timestamp_millis_opt(*ms as i64).single(),
        _ => None,
    };
    match parsed {
        Some(date) => date
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => value.to_string(),
    }
}

pub fn format_duration(value: &Value) -> String {
    format!("{}ms", value)
}

/// Pad `text` to `width`, truncating with `..` when it does not fit.
pub fn pad_cell(text: &str, width: usize, align: Alignment) -> String {
    let len = text.chars().count();
    let cell: String = if len > width {
        let keep = width.saturating_sub(2);
        text.chars().take(keep).chain("..".chars()).collect()
    } else {
        text.to_string()
    };

    let padding = width.saturating_sub(cell.chars().count());
    match align {
        Alignment::Right => format!("{}{}", " ".repeat(padding), cell),
        Alignment::Center => {
            let left = padding / 2;
            let right = padding - left;
            format!("{}{}{}", " ".repeat(left), cell, " ".repeat(right))
        }
        Alignment::Left => format!("{}{}", cell, " ".repeat(padding)),
    }
}

/// Shorten `text` to at most `limit` chars, ending in `...` when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(3);
    text.chars().take(keep).chain("...".chars()).collect()
}

/// Column widths for a table: the widest of header and cells per column,
/// scaled down proportionally (minimum 5) when the row exceeds `max_width`.
pub fn column_widths(headers: &[String], rows: &[Vec<Value>], max_width: usize) -> Vec<usize> {
    let mut widths: Vec<usize> = headers
        .iter()
        .enumerate()
        .map(|(i, header)| {
            rows.iter()
                .map(|row| row.get(i).map_or(0, |cell| cell.to_string().chars().count()))
                .chain(std::iter::once(header.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let separators = widths.len().saturating_sub(1) * 3;
    let total: usize = widths.iter().sum::<usize>() + separators;
    if total > max_width && total > 0 {
        let scale = max_width as f64 / total as f64;
        for width in &mut widths {
            *width = ((*width as f64 * scale).floor() as usize).max(5);
        }
    }
    widths
}

/// Filled cell count and rounded percentage for a progress bar.
///
/// A non-positive total counts as no progress.
pub fn progress_fill(current: f64, total: f64) -> (usize, i64) {
    let ratio = if total > 0.0 && current.is_finite() {
        (current / total).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * PROGRESS_WIDTH as f64).round() as usize;
    let percent = (ratio * 100.0).round() as i64;
    (filled, percent)
}

/// `current/total` plus an optional unit.
pub fn progress_status(current: f64, total: f64, unit: Option<&str>) -> String {
    match unit {
        Some(unit) => format!("{}/{} {}", format_number(current), format_number(total), unit),
        None => format!("{}/{}", format_number(current), format_number(total)),
    }
}
