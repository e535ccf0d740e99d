//! Formatting utilities for Telegram HTML replies.

use chrono::{DateTime, Utc};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// `day/month/year hour:minute`, the format used across the Ouranos UI.
pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%d/%m/%Y %H:%M").to_string()
}

/// `soil_humidity` -> `soil humidity`.
pub fn humanize(name: &str) -> String {
    name.replace('_', " ")
}

/// Round to two decimals (sensor summaries).
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Split a reply into chunks of at most `limit` bytes.
///
/// Splits happen on line boundaries so HTML tags opened by the templates (which
/// never span lines) stay balanced. A single line longer than `limit` is cut on
/// a char boundary.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    for line in text.split('\n') {
        let needed = if chunk.is_empty() {
            line.len()
        } else {
            chunk.len() + 1 + line.len()
        };
        if needed <= limit {
            if !chunk.is_empty() {
                chunk.push('\n');
            }
            chunk.push_str(line);
            continue;
        }

        if !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }

        let mut rest = line;
        while rest.len() > limit {
            let mut cut = limit;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                // First char alone is wider than the limit.
                cut = rest.chars().next().map(char::len_utf8).unwrap_or(rest.len());
            }
            out.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        chunk.push_str(rest);
    }
    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}
