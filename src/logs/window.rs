// src/logs/window.rs

//! Offset-tracked log windows.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::logs::markers::{ErrorMarkers, MarkerHit};

/// Separator appended when a source's log no longer extends what we already
/// hold (rotated file, restarted pod).
const RESTART_SEPARATOR: &str = "\n----- log source restarted -----\n";

/// Append-only view over one log source.
///
/// `content` only ever grows for the lifetime of a scenario and
/// `read_offset <= content.len()` and `segment_start <= content.len()` always
/// hold.
/// `read_offset` marks how far error markers have been scanned;
/// `segment_start` is where the source's current incarnation begins.
#[derive(Debug, Clone)]
pub struct LogWindow {
    source_id: String,
    content: String,
    read_offset: usize,
    segment_start: usize,
}

impl LogWindow {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            content: String::new(),
            read_offset: 0,
            segment_start: 0,
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn read_offset(&self) -> usize {
        self.read_offset
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Append a chunk of freshly read log text.
    pub fn append(&mut self, chunk: &str) {
        self.content.push_str(chunk);
    }

    /// Merge a full-log fetch into the window.
    ///
    /// Platforms return the whole log on every fetch. If the fetch extends
    /// the current incarnation of the source, only the new suffix is
    /// appended. Otherwise the source was restarted: the fetch is appended
    /// whole after a separator and becomes the new incarnation, which later
    /// fetches extend again.
    ///
    /// Returns the number of bytes added.
    pub fn absorb(&mut self, fetched: &str) -> usize {
        let before = self.content.len();
        let current = &self.content[self.segment_start..];

        if fetched.starts_with(current) {
            let held = current.len();
            self.content.push_str(&fetched[held..]);
        } else {
            debug!(
                source = %self.source_id,
                held = current.len(),
                fetched = fetched.len(),
                "log no longer extends window; appending as restarted source"
            );
            self.content.push_str(RESTART_SEPARATOR);
            self.segment_start = self.content.len();
            self.content.push_str(fetched);
        }

        self.content.len() - before
    }

    /// Text that has not been scanned for markers yet.
    pub fn unscanned(&self) -> &str {
        &self.content[self.read_offset..]
    }

    /// Whole-window substring check.
    pub fn contains(&self, needle: &str) -> bool {
        self.content.contains(needle)
    }

    /// Scan the unscanned part of the window for error markers and advance
    /// `read_offset` to the end.
    ///
    /// Scanning restarts at the beginning of the line that contains
    /// `read_offset`, so a marker split across two fetches is still found.
    /// Matches that ended before `read_offset` were already reported and are
    /// skipped.
    pub fn scan(&mut self, markers: &ErrorMarkers) -> Option<MarkerHit> {
        if markers.is_empty() || self.read_offset == self.content.len() {
            self.read_offset = self.content.len();
            return None;
        }

        let line_start = self.content[..self.read_offset]
            .rfind('\n')
            .map(|i| i + 1)
            .unwrap_or(0);
        let region = &self.content[line_start..];
        let min_end = self.read_offset - line_start;

        let hit = markers
            .earliest_match(region, min_end)
            .map(|(marker, start, _end)| {
                let abs = line_start + start;
                MarkerHit {
                    source_id: self.source_id.clone(),
                    marker,
                    line: line_around(&self.content, abs).to_string(),
                    offset: abs,
                }
            });

        self.read_offset = self.content.len();
        hit
    }
}

fn line_around(text: &str, offset: usize) -> &str {
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    text[start..end].trim_end_matches('\r')
}

/// All log windows owned by one scenario.
///
/// Windows are created lazily on first access and dropped with the book, so
/// no log content leaks between scenarios.
#[derive(Debug, Default)]
pub struct LogBook {
    windows: BTreeMap<String, LogWindow>,
}

impl LogBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the window for a source.
    pub fn window_mut(&mut self, source_id: &str) -> &mut LogWindow {
        self.windows
            .entry(source_id.to_string())
            .or_insert_with(|| LogWindow::new(source_id))
    }

    pub fn window(&self, source_id: &str) -> Option<&LogWindow> {
        self.windows.get(source_id)
    }

    pub fn sources(&self) -> impl Iterator<Item = &str> {
        self.windows.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Dump every window at warn level so a failed scenario can be correlated
    /// with platform-side symptoms. Returns the number of windows dumped.
    pub fn dump(&self) -> usize {
        warn!(sources = self.windows.len(), "scenario failed; dumping app logs");
        for window in self.windows.values() {
            warn!(
                source = %window.source_id(),
                bytes = window.len(),
                "----- log dump -----\n{}",
                window.content()
            );
        }
        warn!("app log dump complete");
        self.windows.len()
    }

    /// Drop all windows.
    pub fn clear(&mut self) {
        self.windows.clear();
    }
}
