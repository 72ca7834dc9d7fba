//! Run state and progress reporting.
//!
//! [`RunState`] is owned by the single loop that drains page outcomes. Fetch
//! tasks never touch it, so it needs no synchronization.

use std::time::{Duration, Instant};

use crate::RawRecord;

/// Accumulator for one run.
///
/// Records are whatever the drain loop produces: raw API items by default, or
/// transformed rows when a transformer runs during accumulation.
#[derive(Debug)]
pub struct RunState<T = RawRecord> {
    /// Pages that produced an outcome
    pub completed: u32,
    /// Pages in the run
    pub total_pages: u32,
    /// Records accumulated in completion order
    pub records: Vec<T>,
    /// Pages that exhausted every attempt
    pub failed_pages: Vec<u32>,
    /// Pages cut short by shutdown
    pub cancelled_pages: Vec<u32>,
    /// Attempts made across all pages
    pub attempts: u64,
    /// When fetching started
    pub start_time: Instant,
    progress_interval: u32,
}

impl<T> RunState<T> {
    /// Fresh state for a run of `total_pages` pages.
    pub fn new(total_pages: u32, progress_interval: u32) -> Self {
        Self {
            completed: 0,
            total_pages,
            records: Vec::new(),
            failed_pages: Vec::new(),
            cancelled_pages: Vec::new(),
            attempts: 0,
            start_time: Instant::now(),
            progress_interval: progress_interval.max(1),
        }
    }

    /// Count one finished page and append its records.
    pub fn record_page(&mut self, records: impl IntoIterator<Item = T>, attempts: u32) {
        self.completed += 1;
        self.attempts += u64::from(attempts);
        self.records.extend(records);
    }

    /// Count one page that exhausted its attempts.
    pub fn record_failed(&mut self, page: u32, attempts: u32) {
        self.record_page(std::iter::empty(), attempts);
        self.failed_pages.push(page);
    }

    /// Count one page cut short by shutdown.
    pub fn record_cancelled(&mut self, page: u32, attempts: u32) {
        self.completed += 1;
        self.attempts += u64::from(attempts);
        self.cancelled_pages.push(page);
    }

    /// Whether the latest completion should emit a progress line.
    pub fn should_report(&self) -> bool {
        self.completed > 0
            && (self.completed % self.progress_interval == 0 || self.completed == self.total_pages)
    }

    /// Wall time since fetching started.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Human-readable progress line.
    pub fn format_progress(&self) -> String {
        format!(
            "Progress: {}/{} pages | {} products | {:.1}s",
            self.completed,
            self.total_pages,
            self.records.len(),
            self.elapsed().as_secs_f64()
        )
    }

    /// Whether every page produced an outcome.
    pub fn is_complete(&self) -> bool {
        self.completed == self.total_pages
    }
}
