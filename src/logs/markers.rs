// src/logs/markers.rs

use regex::Regex;

/// A compiled set of error markers.
///
/// Each marker is a regex; a match anywhere in newly fetched log text is a
/// fail-fast signal.
#[derive(Debug, Clone, Default)]
pub struct ErrorMarkers {
    patterns: Vec<Regex>,
}

/// Where a marker matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerHit {
    pub source_id: String,
    /// The marker pattern that matched.
    pub marker: String,
    /// The full log line containing the match.
    pub line: String,
    /// Byte offset of the match within the source's window.
    pub offset: usize,
}

impl ErrorMarkers {
    pub fn from_patterns<S: AsRef<str>>(patterns: &[S]) -> Result<Self, regex::Error> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Earliest match in `text` starting at or after `min_end` bytes.
    ///
    /// Returns the marker pattern and the match's byte range.
    pub fn earliest_match(&self, text: &str, min_end: usize) -> Option<(String, usize, usize)> {
        self.patterns
            .iter()
            .filter_map(|re| {
                re.find_iter(text)
                    .find(|m| m.end() > min_end)
                    .map(|m| (re.as_str().to_string(), m.start(), m.end()))
            })
            .min_by_key(|(_, start, _)| *start)
    }
}
