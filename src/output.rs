// SPDX-License-Identifier: MIT OR Apache-2.0

//! Output and color utilities for consistent terminal formatting
//!
//! Provides shared color functions respecting NO_COLOR environment variable.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

/// Check if colors should be used (respects NO_COLOR env var)
pub fn use_colors() -> bool {
    std::env::var("NO_COLOR").is_err()
}

/// Colorize file path (cyan)
pub fn colorize_path(text: &str, use_color: bool) -> String {
    if use_color {
        text.cyan().to_string()
    } else {
        text.to_string()
    }
}

/// Colorize similarity score (green when at or above `threshold`, yellow otherwise)
pub fn colorize_score(score: f32, threshold: f32, use_color: bool) -> String {
    let text = format!("{:.4}", score);
    if !use_color {
        text
    } else if score >= threshold {
        text.green().to_string()
    } else {
        text.yellow().to_string()
    }
}

/// Colorize record type (blue, bracketed)
pub fn colorize_kind(text: &str, use_color: bool) -> String {
    let text = format!("[{}]", text);
    if use_color {
        text.blue().to_string()
    } else {
        text
    }
}

/// Colorize secondary text (dimmed)
pub fn colorize_context(text: &str, use_color: bool) -> String {
    if use_color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Cuts `text` to at most `max_chars` characters, marking the cut with "...".
pub fn preview(text: &str, max_chars: usize) -> String {
    let flattened: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flattened.chars().count() <= max_chars {
        flattened
    } else {
        let mut cut: String = flattened.chars().take(max_chars).collect();
        cut.push_str("...");
        cut
    }
}

/// Prints `value` as JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T, compact: bool) -> Result<()> {
    let rendered = if compact {
        serde_json::to_string(value)?
    } else {
        serde_json::to_string_pretty(value)?
    };
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_output_without_color() {
        assert_eq!(colorize_path("a/b.txt", false), "a/b.txt");
        assert_eq!(colorize_kind("legal_document", false), "[legal_document]");
        assert_eq!(colorize_score(0.91234, 0.8, false), "0.9123");
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        assert_eq!(preview("short", 10), "short");
        assert_eq!(preview("line one\nline two", 8), "line one...");
        assert_eq!(preview("ééééé", 2), "éé...");
    }
}
