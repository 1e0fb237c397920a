//! Bounded capture of converter error output.

use std::collections::VecDeque;

/// Appended to text that was cut short.
pub const TRUNCATION_MARKER: &str = "…";

/// Last non-empty line of some process output, trimmed.
pub fn headline(text: &str) -> Option<&str> {
    text.lines().map(str::trim).rev().find(|line| !line.is_empty())
}

/// Cuts `text` to at most `max_bytes` bytes on a char boundary, marking the cut.
pub fn truncate_diagnostic(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    // Too small to hold the marker: plain cut
    let marker = if max_bytes >= TRUNCATION_MARKER.len() {
        TRUNCATION_MARKER
    } else {
        ""
    };
    let mut cut = max_bytes - marker.len();
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}{}", &text[..cut], marker)
}

/// Keeps the most recent lines of a stream within a byte budget.
///
/// Converters print progress chatter first and the actual error last, so the
/// tail is the part worth keeping.
#[derive(Debug)]
pub struct StderrTail {
    lines: VecDeque<String>,
    bytes: usize,
    limit: usize,
}

impl StderrTail {
    pub fn new(limit: usize) -> Self {
        Self {
            lines: VecDeque::new(),
            bytes: 0,
            limit,
        }
    }

    pub fn push_line(&mut self, line: &str) {
        let line = line.trim_end_matches(['\r', '\n']);
        let line = truncate_diagnostic(line, self.limit);

        self.bytes += line.len() + 1;
        self.lines.push_back(line);

        while self.bytes > self.limit && self.lines.len() > 1 {
            if let Some(dropped) = self.lines.pop_front() {
                self.bytes -= dropped.len() + 1;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(|l| l.trim().is_empty())
    }

    pub fn into_string(self) -> String {
        Vec::from(self.lines).join("\n")
    }
}
