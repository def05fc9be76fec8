//! Console line buffer
//!
//! Holds the text shown in the console pane. Lines are appended from script
//! output relays, the oldest lines are evicted past `max_lines`, and every
//! append moves the view to the newest line.
//!
//! The buffer is owned by the UI loop; workers never touch it directly.

use std::collections::VecDeque;

use crate::config::DEFAULT_CONSOLE_MAX_LINES;

/// Position in the console stream, used by renderers to fetch only new lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConsoleCursor {
    /// Bumped on every `clear()`
    generation: u64,
    /// Sequence number of the next line to read
    next_seq: u64,
}

#[derive(Debug, Clone)]
pub struct ConsoleBuffer {
    /// Buffered lines (newest at back)
    lines: VecDeque<String>,
    /// Maximum number of lines to keep
    max_lines: usize,
    /// Sequence number of `lines[0]`
    first_seq: u64,
    generation: u64,
    /// Index of the line the view is scrolled to
    scroll_line: Option<usize>,
}

impl Default for ConsoleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLE_MAX_LINES)
    }
}

impl ConsoleBuffer {
    pub fn new(max_lines: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines: max_lines.max(1),
            first_seq: 0,
            generation: 0,
            scroll_line: None,
        }
    }

    /// Append a line and scroll to it, evicting the oldest line if full
    pub fn push_line(&mut self, line: impl Into<String>) {
        while self.lines.len() >= self.max_lines {
            self.lines.pop_front();
            self.first_seq += 1;
        }
        self.lines.push_back(line.into());
        self.scroll_to_end();
    }

    /// Append text that may contain newlines, one console line per segment
    pub fn push_text(&mut self, text: &str) {
        for line in text.split('\n') {
            self.push_line(line.trim_end_matches('\r'));
        }
    }

    pub fn clear(&mut self) {
        self.first_seq += self.lines.len() as u64;
        self.lines.clear();
        self.generation += 1;
        self.scroll_line = None;
    }

    pub fn scroll_to_end(&mut self) {
        self.scroll_line = self.lines.len().checked_sub(1);
    }

    /// Line index the view shows at the bottom, `None` while empty
    pub fn scroll_line(&self) -> Option<usize> {
        self.scroll_line
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn last_line(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    /// Get the last N lines (or all if fewer exist)
    pub fn last_n_lines(&self, n: usize) -> Vec<&str> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Cursor positioned after the newest line
    pub fn cursor(&self) -> ConsoleCursor {
        ConsoleCursor {
            generation: self.generation,
            next_seq: self.first_seq + self.lines.len() as u64,
        }
    }

    /// Lines appended since `cursor`, plus whether the console was cleared in between
    ///
    /// Lines evicted before they were read are skipped.
    pub fn read_since(&self, cursor: ConsoleCursor) -> (Vec<&str>, bool, ConsoleCursor) {
        let cleared = cursor.generation != self.generation;
        let from_seq = if cleared {
            self.first_seq
        } else {
            cursor.next_seq.max(self.first_seq)
        };
        let skip = (from_seq - self.first_seq) as usize;
        let lines = self.lines.iter().skip(skip).map(String::as_str).collect();
        (lines, cleared, self.cursor())
    }
}
