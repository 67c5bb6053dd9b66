// src/logs/monitor.rs

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, warn};

use crate::logs::adapter::{LogFetcher, LogTarget};
use crate::logs::markers::{ErrorMarkers, MarkerHit};
use crate::logs::window::LogBook;

/// Per-scenario log state: the injected fetch strategy, the error markers and
/// the scenario's [`LogBook`].
///
/// The book sits behind a mutex so poll suppliers can refresh it through a
/// shared reference. The lock is only taken between fetches, never across an
/// await.
pub struct LogMonitor {
    fetcher: Arc<dyn LogFetcher>,
    markers: ErrorMarkers,
    book: Mutex<LogBook>,
}

impl std::fmt::Debug for LogMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogMonitor")
            .field("markers", &self.markers)
            .field("book", &self.book)
            .finish_non_exhaustive()
    }
}

impl LogMonitor {
    pub fn new(fetcher: Arc<dyn LogFetcher>, markers: ErrorMarkers) -> Self {
        Self {
            fetcher,
            markers,
            book: Mutex::new(LogBook::new()),
        }
    }

    pub fn markers(&self) -> &ErrorMarkers {
        &self.markers
    }

    fn book(&self) -> MutexGuard<'_, LogBook> {
        self.book.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Fetch `target` and merge the result into its window.
    ///
    /// Returns the number of bytes added.
    pub async fn refresh(&self, target: &LogTarget) -> anyhow::Result<usize> {
        let fetched = self.fetcher.fetch(target).await?;
        let added = self
            .book()
            .window_mut(&target.source_id())
            .absorb(&fetched);
        debug!(source = %target.source_id(), added, "log window refreshed");
        Ok(added)
    }

    /// Refresh every target and scan the new text for error markers.
    ///
    /// Fetch failures are treated as "nothing new yet". Returns the first
    /// marker hit, in target order.
    pub async fn check(&self, targets: &[LogTarget]) -> Option<MarkerHit> {
        let mut first: Option<MarkerHit> = None;
        for target in targets {
            if let Err(err) = self.refresh(target).await {
                debug!(source = %target.source_id(), error = %format!("{err:#}"), "log fetch failed");
                continue;
            }
            let hit = self
                .book()
                .window_mut(&target.source_id())
                .scan(&self.markers);
            if let Some(hit) = hit {
                warn!(
                    source = %hit.source_id,
                    marker = %hit.marker,
                    line = %hit.line,
                    "error marker found in app log"
                );
                first.get_or_insert(hit);
            }
        }
        first
    }

    /// Whole-window text of a source, if it has been fetched at least once.
    pub fn content(&self, source_id: &str) -> Option<String> {
        self.book().window(source_id).map(|w| w.content().to_string())
    }

    pub fn contains(&self, source_id: &str, needle: &str) -> bool {
        self.book()
            .window(source_id)
            .is_some_and(|w| w.contains(needle))
    }

    pub fn sources(&self) -> Vec<String> {
        self.book().sources().map(str::to_string).collect()
    }

    /// Dump every window at warn level; returns the number of windows.
    pub fn dump(&self) -> usize {
        self.book().dump()
    }

    /// Drop all windows.
    pub fn clear(&self) {
        self.book().clear();
    }
}
