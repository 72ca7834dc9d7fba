//! Catalog run executor
//!
//! Drives one run end to end: configuration check, page-count resolution,
//! gated page fetching, record transformation and the final write.

use chrono::{DateTime, Utc};
use indicatif::ProgressBar;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use crate::downloader::orchestrator::FetchOrchestrator;
use crate::downloader::{ConcurrencyGate, DownloadError, FetchConfig};
use crate::fetcher::{PageCountResolver, PageSource, RetryPolicy, RetryingRequester};
use crate::output::ProductsWriter;
use crate::record::ProductRecord;
use crate::shutdown::SharedShutdown;

/// Phase of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing started yet
    Idle,
    /// Waiting for the page count
    Resolving,
    /// Page tasks in flight
    Fetching,
    /// Handing records to the sink
    Aggregating,
    /// Every page produced an outcome and the sink closed
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Resolving => "resolving",
            Self::Fetching => "fetching",
            Self::Aggregating => "aggregating",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// Final report of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Items the API reported for the query
    pub total_items: u64,
    /// Pages in the run
    pub total_pages: u32,
    /// Pages that produced an outcome
    pub pages_completed: u32,
    /// Pages that exhausted every attempt, ascending
    pub failed_pages: Vec<u32>,
    /// Rows handed to the sink
    pub records_written: usize,
    /// Page attempts across the run
    pub attempts: u64,
    /// Most network calls in flight at once
    pub peak_in_flight: usize,
    /// Wall time from resolution to the closed sink
    pub elapsed_secs: f64,
    /// Completion timestamp
    pub finished_at: DateTime<Utc>,
}

impl RunSummary {
    /// Multi-line summary for terminals.
    pub fn format_human(&self) -> String {
        let mut lines = vec![
            format!(
                "Fetched {} products from {}/{} pages in {:.1}s",
                self.records_written, self.pages_completed, self.total_pages, self.elapsed_secs
            ),
            format!(
                "  API total: {} | attempts: {} | peak in flight: {}",
                self.total_items, self.attempts, self.peak_in_flight
            ),
        ];
        if self.failed_pages.is_empty() {
            lines.push("  No failed pages".to_string());
        } else {
            lines.push(format!(
                "  Failed pages ({}): {}",
                self.failed_pages.len(),
                self.failed_pages
                    .iter()
                    .map(u32::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
        lines.join("\n")
    }
}

/// Runs a full catalog fetch.
pub struct CatalogExecutor {
    config: FetchConfig,
    shutdown: Option<SharedShutdown>,
    progress_bar: Option<ProgressBar>,
}

impl CatalogExecutor {
    /// Create an executor for `config`.
    pub fn new(config: FetchConfig) -> Self {
        Self {
            config,
            shutdown: None,
            progress_bar: None,
        }
    }

    /// Attach a shared shutdown handle for graceful cancellation.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Show per-page progress on `bar`. Its length is set once the page count is known.
    pub fn with_progress_bar(mut self, bar: ProgressBar) -> Self {
        self.progress_bar = Some(bar);
        self
    }

    /// Configuration in effect.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Fetch every page from `source` and write the transformed records to `writer`.
    pub async fn execute<S, W>(&self, source: S, writer: W) -> Result<RunSummary, DownloadError>
    where
        S: PageSource + 'static,
        W: ProductsWriter,
    {
        self.config.validate()?;

        let span = tracing::info_span!(
            "catalog_run",
            category_id = self.config.query.category_id,
            per_page = self.config.query.per_page,
            concurrency = self.config.concurrency,
        );
        self.run(source, writer).instrument(span).await
    }

    async fn run<S, W>(&self, source: S, mut writer: W) -> Result<RunSummary, DownloadError>
    where
        S: PageSource + 'static,
        W: ProductsWriter,
    {
        let started = std::time::Instant::now();
        let mut phase = RunPhase::Idle;

        advance(&mut phase, RunPhase::Resolving);
        let resolver = PageCountResolver::new(&source);
        let resolve = resolver.resolve(&self.config.query);
        let resolved = match &self.shutdown {
            Some(shutdown) => shutdown.run_until_shutdown(resolve).await,
            None => Some(resolve.await),
        };
        let Some(resolved) = resolved else {
            warn!("Shutdown requested while resolving the page count");
            return Err(DownloadError::Cancelled {
                completed: 0,
                total: 0,
            });
        };
        let count = resolved.map_err(DownloadError::PageCount)?;

        if self.shutdown_requested() {
            return Err(DownloadError::Cancelled {
                completed: 0,
                total: count.total_pages,
            });
        }

        advance(&mut phase, RunPhase::Fetching);
        let gate = ConcurrencyGate::new(self.config.concurrency);
        let mut requester =
            RetryingRequester::new(source, gate.clone(), RetryPolicy::from_config(&self.config));
        if let Some(shutdown) = &self.shutdown {
            requester = requester.with_shutdown(Arc::clone(shutdown));
        }

        let mut orchestrator = FetchOrchestrator::new(
            Arc::new(requester),
            self.config.query.clone(),
            self.config.progress_interval,
        );
        if let Some(bar) = &self.progress_bar {
            bar.set_length(u64::from(count.total_pages));
            orchestrator = orchestrator.with_progress_bar(bar.clone());
        }

        let report = orchestrator
            .run_with(count.total_pages, |raw| ProductRecord::from_raw(&raw))
            .await;
        gate.close();
        if let Some(bar) = &self.progress_bar {
            bar.finish_and_clear();
        }

        if report.was_cancelled() {
            let completed = report.pages_completed - report.cancelled_pages.len() as u32;
            warn!(
                completed,
                total_pages = report.total_pages,
                "Shutdown requested; discarding partial results"
            );
            return Err(DownloadError::Cancelled {
                completed,
                total: report.total_pages,
            });
        }
        if !report.failed_pages.is_empty() {
            warn!(
                failed = report.failed_pages.len(),
                pages = ?report.failed_pages,
                "Some pages returned no records after exhausting retries"
            );
        }

        advance(&mut phase, RunPhase::Aggregating);
        writer.write_products(&report.records)?;
        writer.close()?;

        advance(&mut phase, RunPhase::Done);
        let summary = RunSummary {
            total_items: count.total_items,
            total_pages: report.total_pages,
            pages_completed: report.pages_completed,
            failed_pages: report.failed_pages,
            records_written: report.records.len(),
            attempts: report.attempts,
            peak_in_flight: gate.peak_in_flight(),
            elapsed_secs: started.elapsed().as_secs_f64(),
            finished_at: Utc::now(),
        };

        info!(
            records = summary.records_written,
            failed_pages = summary.failed_pages.len(),
            elapsed_secs = summary.elapsed_secs,
            "Done: {} products in {:.1}s",
            summary.records_written,
            summary.elapsed_secs
        );
        Ok(summary)
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }
}

fn advance(phase: &mut RunPhase, next: RunPhase) {
    tracing::debug!(from = %phase, to = %next, "Run phase");
    *phase = next;
}
