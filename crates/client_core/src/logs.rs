//! Bounded log buffer with severity filtering, search and export.

use std::{
    collections::VecDeque,
    time::{Duration, Instant},
};

use chrono::{DateTime, Local, SecondsFormat, Utc};
use shared::domain::LogLevel;

/// Hard ceiling on retained entries. Oldest entries are evicted first.
pub const LOG_CAPACITY: usize = 500;
/// How long a click on the log view suspends auto-scroll.
pub const AUTO_SCROLL_PAUSE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>, timestamp: Option<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: timestamp.unwrap_or_else(local_time_label),
        }
    }

    /// Text shown in the log view, which is also what search matches against.
    pub fn rendered_text(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }

    pub fn export_line(&self) -> String {
        format!("[{}] [{}] {}", self.timestamp, self.level, self.message)
    }
}

pub fn local_time_label() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!(
        "logs_{}.txt",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
            .replace(':', "-")
    )
}

#[derive(Debug, Clone)]
struct Slot {
    seq: u64,
    entry: LogEntry,
}

/// Deadline-based auto-scroll pause. Re-arming replaces the pending deadline.
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoScroll {
    resume_at: Option<Instant>,
}

impl AutoScroll {
    pub fn pause(&mut self, now: Instant) {
        self.resume_at = Some(now + AUTO_SCROLL_PAUSE);
    }

    pub fn is_active(&self, now: Instant) -> bool {
        self.resume_at.map_or(true, |deadline| now >= deadline)
    }
}

#[derive(Debug, Clone)]
pub struct LogReconciler {
    buffer: VecDeque<Slot>,
    // Sequence numbers of rendered entries; always a subsequence of `buffer`.
    displayed: VecDeque<u64>,
    next_seq: u64,
    debug_visible: bool,
    search: String,
    full_redraws: u64,
    auto_scroll: AutoScroll,
}

impl Default for LogReconciler {
    fn default() -> Self {
        Self::new()
    }
}

impl LogReconciler {
    pub fn new() -> Self {
        Self {
            buffer: VecDeque::with_capacity(LOG_CAPACITY + 1),
            displayed: VecDeque::new(),
            next_seq: 0,
            debug_visible: true,
            search: String::new(),
            full_redraws: 0,
            auto_scroll: AutoScroll::default(),
        }
    }

    /// Appends a new entry, stamping it with the local time when the source
    /// gave none. Returns whether the entry was rendered immediately.
    pub fn append(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        timestamp: Option<String>,
    ) -> bool {
        self.push(LogEntry::new(level, message, timestamp))
    }

    pub fn push(&mut self, entry: LogEntry) -> bool {
        let seq = self.next_seq;
        self.next_seq += 1;
        let render = self.passes_level_filter(entry.level);
        self.buffer.push_back(Slot { seq, entry });
        if render {
            self.displayed.push_back(seq);
        }

        while self.buffer.len() > LOG_CAPACITY {
            if let Some(evicted) = self.buffer.pop_front() {
                if self.displayed.front() == Some(&evicted.seq) {
                    self.displayed.pop_front();
                }
            }
        }
        render
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.displayed.clear();
    }

    /// Changes DEBUG visibility and rebuilds the displayed list from scratch.
    pub fn set_debug_visible(&mut self, visible: bool) {
        self.debug_visible = visible;
        self.redraw();
    }

    pub fn debug_visible(&self) -> bool {
        self.debug_visible
    }

    pub fn set_search(&mut self, query: &str) {
        self.search = query.to_lowercase();
    }

    pub fn search(&self) -> &str {
        &self.search
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.buffer.iter().map(|slot| &slot.entry)
    }

    /// Entries currently rendered, before the search filter.
    pub fn displayed(&self) -> impl Iterator<Item = &LogEntry> {
        self.displayed
            .iter()
            .filter_map(move |seq| self.entry_by_seq(*seq))
    }

    /// Rendered entries that match the current search.
    pub fn visible_rows(&self) -> impl Iterator<Item = &LogEntry> {
        self.displayed()
            .filter(move |entry| self.matches_search(entry))
    }

    /// Sequence number the next appended entry will receive.
    pub fn next_seq(&self) -> u64 {
        self.next_seq
    }

    /// Visible rows appended at or after `seq`, for renderers that only
    /// draw what is new.
    pub fn visible_since(&self, seq: u64) -> impl Iterator<Item = &LogEntry> {
        self.displayed
            .iter()
            .filter(move |displayed| **displayed >= seq)
            .filter_map(move |displayed| self.entry_by_seq(*displayed))
            .filter(move |entry| self.matches_search(entry))
    }

    fn matches_search(&self, entry: &LogEntry) -> bool {
        self.search.is_empty() || entry.rendered_text().to_lowercase().contains(&self.search)
    }

    pub fn export_text(&self) -> String {
        self.entries()
            .map(LogEntry::export_line)
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn full_redraws(&self) -> u64 {
        self.full_redraws
    }

    pub fn pause_auto_scroll(&mut self, now: Instant) {
        self.auto_scroll.pause(now);
    }

    pub fn auto_scroll(&self) -> AutoScroll {
        self.auto_scroll
    }

    fn passes_level_filter(&self, level: LogLevel) -> bool {
        self.debug_visible || level != LogLevel::Debug
    }

    fn redraw(&mut self) {
        self.displayed = self
            .buffer
            .iter()
            .filter(|slot| self.passes_level_filter(slot.entry.level))
            .map(|slot| slot.seq)
            .collect();
        self.full_redraws += 1;
    }

    fn entry_by_seq(&self, seq: u64) -> Option<&LogEntry> {
        let first = self.buffer.front()?.seq;
        let offset = usize::try_from(seq.checked_sub(first)?).ok()?;
        self.buffer.get(offset).map(|slot| &slot.entry)
    }
}
