//! Round-trip check: read the written calendar back and make sure every
//! event block carries the summary and timestamps we rendered.

use crate::render::{escape_text, CalendarEvent};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch {
    EventCount { expected: usize, found: usize },
    Summary { index: usize, expected: String },
    Start { index: usize, expected: String },
    End { index: usize, expected: String },
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::EventCount { expected, found } => {
                write!(f, "expected {} events, found {}", expected, found)
            }
            Mismatch::Summary { index, expected } => {
                write!(f, "event {}: missing line SUMMARY:{}", index + 1, expected)
            }
            Mismatch::Start { index, expected } => {
                write!(f, "event {}: missing line DTSTART:{}", index + 1, expected)
            }
            Mismatch::End { index, expected } => {
                write!(f, "event {}: missing line DTEND:{}", index + 1, expected)
            }
        }
    }
}

static EVENT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?ms)^BEGIN:VEVENT\r?$(.*?)^END:VEVENT\r?$")
        .expect("Invalid event block regex")
});

/// Undo content-line folding (CRLF followed by a space or tab).
fn unfold(text: &str) -> String {
    text.replace("\r\n ", "")
        .replace("\r\n\t", "")
        .replace("\n ", "")
}

/// The text between each BEGIN:VEVENT/END:VEVENT pair, in order.
pub fn extract_event_blocks(calendar: &str) -> Vec<String> {
    let unfolded = unfold(calendar);
    EVENT_BLOCK
        .captures_iter(&unfolded)
        .map(|caps| caps[1].to_string())
        .collect()
}

fn has_line(block: &str, line: &str) -> bool {
    block.lines().any(|l| l.trim_end_matches('\r') == line)
}

/// Compare the calendar text against the events it was rendered from.
/// Returns every mismatch found; an empty list means the round trip held.
pub fn validate(calendar: &str, expected: &[CalendarEvent]) -> Vec<Mismatch> {
    let blocks = extract_event_blocks(calendar);
    let mut errors = Vec::new();

    if blocks.len() != expected.len() {
        errors.push(Mismatch::EventCount {
            expected: expected.len(),
            found: blocks.len(),
        });
    }

    for (index, (block, event)) in blocks.iter().zip(expected).enumerate() {
        let summary = format!("SUMMARY:{}", escape_text(&event.summary));
        if !has_line(block, &summary) {
            errors.push(Mismatch::Summary {
                index,
                expected: event.summary.clone(),
            });
        }
        let start = event.dtstart();
        if !has_line(block, &format!("DTSTART:{}", start)) {
            errors.push(Mismatch::Start {
                index,
                expected: start,
            });
        }
        let end = event.dtend();
        if !has_line(block, &format!("DTEND:{}", end)) {
            errors.push(Mismatch::End {
                index,
                expected: end,
            });
        }
    }

    errors
}
