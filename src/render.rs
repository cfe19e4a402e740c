//! Plain-text rendering for the terminal

use chrono::{DateTime, Datelike, TimeZone};
use regex::Regex;
use std::fmt::Display;
use std::sync::LazyLock;

static BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<br\s*/?>").expect("valid regex"));
static PARA_OPEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<p[^>]*>").expect("valid regex"));
static PARA_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)</p>").expect("valid regex"));
static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]+>").expect("valid regex"));
static BLANK_LINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("valid regex"));

/// Reduce an HTML body to readable text.
///
/// Line breaks and paragraphs become newlines, every other tag is
/// dropped and entities are decoded.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let text = BREAK.replace_all(html, "\n");
    let text = PARA_OPEN.replace_all(&text, "\n");
    let text = PARA_CLOSE.replace_all(&text, "");
    let text = TAG.replace_all(&text, "");
    let text = html_escape::decode_html_entities(&text);
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Short timestamp relative to `now`: time only for today, no year for
/// this year.
#[must_use]
pub fn format_timestamp<Tz>(ts: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if ts.date_naive() == now.date_naive() {
        ts.format("%H:%M").to_string()
    } else if ts.year() == now.year() {
        ts.format("%b %d %H:%M").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M").to_string()
    }
}

/// Human-readable byte count.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn format_size(bytes: usize) -> String {
    let mut size = bytes as f64;
    for unit in ["B", "KB", "MB", "GB"] {
        if size < 1024.0 {
            return format!("{size:.0}{unit}");
        }
        size /= 1024.0;
    }
    format!("{size:.1}TB")
}

/// Cut `s` to at most `max` characters, marking the cut with `...`.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let keep = max.saturating_sub(3);
    let mut out: String = s.chars().take(keep).collect();
    out.push_str("...");
    out
}
