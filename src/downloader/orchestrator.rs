//! Fetch orchestration
//!
//! One task per page, all spawned up front. The only bound on parallelism is
//! the requester's [`ConcurrencyGate`](super::ConcurrencyGate). Outcomes are
//! drained in completion order by a single loop that owns the [`RunState`].

use indicatif::ProgressBar;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::downloader::progress::RunState;
use crate::fetcher::{PageSource, RetryingRequester};
use crate::{CatalogQuery, FetchOutcome, FetchRequest, PageOutcome, RawRecord};

/// What a finished orchestration produced.
#[derive(Debug)]
pub struct OrchestratorReport<T = RawRecord> {
    /// Accumulated records, in completion order
    pub records: Vec<T>,
    /// Pages in the run
    pub total_pages: u32,
    /// Pages that produced an outcome
    pub pages_completed: u32,
    /// Pages that exhausted every attempt, ascending
    pub failed_pages: Vec<u32>,
    /// Pages cut short by shutdown, ascending
    pub cancelled_pages: Vec<u32>,
    /// Attempts across all pages
    pub attempts: u64,
    /// Wall time of the fetch phase
    pub elapsed: Duration,
}

impl<T> OrchestratorReport<T> {
    /// Whether shutdown interrupted any page.
    pub fn was_cancelled(&self) -> bool {
        !self.cancelled_pages.is_empty()
    }
}

/// Spawns and drains one fetch task per page.
pub struct FetchOrchestrator<S> {
    requester: Arc<RetryingRequester<S>>,
    query: CatalogQuery,
    progress_interval: u32,
    progress_bar: Option<ProgressBar>,
}

impl<S: PageSource + 'static> FetchOrchestrator<S> {
    /// Create an orchestrator issuing `query` through `requester`.
    pub fn new(
        requester: Arc<RetryingRequester<S>>,
        query: CatalogQuery,
        progress_interval: u32,
    ) -> Self {
        Self {
            requester,
            query,
            progress_interval,
            progress_bar: None,
        }
    }

    /// Advance `bar` once per completed page.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    /// Fetch pages `1..=total_pages` and return the raw records.
    pub async fn run(&self, total_pages: u32) -> OrchestratorReport {
        self.run_with(total_pages, |raw| raw).await
    }

    /// Fetch pages `1..=total_pages`, applying `transform` to each raw record
    /// as its page is accumulated.
    pub async fn run_with<T, F>(&self, total_pages: u32, mut transform: F) -> OrchestratorReport<T>
    where
        F: FnMut(RawRecord) -> T,
    {
        let mut tasks = JoinSet::new();
        for page in 1..=total_pages {
            let requester = Arc::clone(&self.requester);
            let request = FetchRequest::new(page, self.query.clone());
            tasks.spawn(async move {
                let outcome = requester.fetch(&request).await;
                PageOutcome { page, outcome }
            });
        }
        debug!(total_pages, "Spawned page tasks");

        let mut state = RunState::new(total_pages, self.progress_interval);
        let mut pending: BTreeSet<u32> = (1..=total_pages).collect();

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(PageOutcome { page, outcome }) => {
                    pending.remove(&page);
                    match outcome {
                        FetchOutcome::Success { records, attempts } => {
                            crate::metrics::record_page_records(records.len());
                            state.record_page(records.into_iter().map(&mut transform), attempts);
                        }
                        FetchOutcome::Exhausted { attempts, .. } => {
                            state.record_failed(page, attempts);
                        }
                        FetchOutcome::Cancelled { attempts } => {
                            state.record_cancelled(page, attempts);
                        }
                    }
                }
                Err(join_error) => {
                    // Page index is recovered from `pending` once draining ends.
                    error!(error = %join_error, "Page task aborted");
                    state.record_page(std::iter::empty(), 0);
                }
            }

            if let Some(bar) = &self.progress_bar {
                bar.inc(1);
            }
            if state.should_report() {
                info!(
                    completed = state.completed,
                    total_pages,
                    records = state.records.len(),
                    elapsed_secs = state.elapsed().as_secs_f64(),
                    "{}",
                    state.format_progress()
                );
            }
        }

        state.failed_pages.extend(pending);
        state.failed_pages.sort_unstable();
        state.cancelled_pages.sort_unstable();

        OrchestratorReport {
            elapsed: state.elapsed(),
            records: state.records,
            total_pages,
            pages_completed: state.completed,
            failed_pages: state.failed_pages,
            cancelled_pages: state.cancelled_pages,
            attempts: state.attempts,
        }
    }
}
