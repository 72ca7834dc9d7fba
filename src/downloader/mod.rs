//! Run orchestration and concurrency control
//!
//! # Overview
//!
//! A run moves through a fixed sequence of phases:
//!
//! 1. **Resolving**: one metadata request yields the page count ([`crate::fetcher::PageCountResolver`])
//! 2. **Fetching**: one task per page, gated by a [`gate::ConcurrencyGate`] and
//!    retried by [`crate::fetcher::RetryingRequester`], drained by [`orchestrator::FetchOrchestrator`]
//! 3. **Aggregating**: raw records are transformed and handed to the sink
//! 4. **Done**: a [`executor::RunSummary`] is returned
//!
//! # Quick Start
//!
//! ```no_run
//! use catalog_harvester::downloader::{CatalogExecutor, FetchConfig};
//! use catalog_harvester::fetcher::http::CatalogHttpClient;
//! use catalog_harvester::output::csv::CsvProductsWriter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let source = CatalogHttpClient::from_config(&config)?;
//! let writer = CsvProductsWriter::new("./clothes.csv")?;
//!
//! let summary = CatalogExecutor::new(config).execute(source, writer).await?;
//! println!("{}", summary.format_human());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Only failures that prevent a bounded run are errors here:
//! - page-count resolution failure (fatal, no retry)
//! - invalid configuration
//! - sink failures
//! - cancellation
//!
//! Individual page failures never surface as errors; they are retried and,
//! once exhausted, reported as failed pages in the summary.

pub mod config;
pub mod executor;
pub mod gate;
pub mod orchestrator;
pub mod progress;

pub use config::{CatalogQuery, FetchConfig};
pub use executor::{CatalogExecutor, RunPhase, RunSummary};
pub use gate::{ConcurrencyGate, GateError, GatePermit};
pub use orchestrator::{FetchOrchestrator, OrchestratorReport};
pub use progress::RunState;

use crate::fetcher::FetcherError;
use crate::output::OutputError;

/// Run-level errors
#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Page count could not be resolved; the run cannot be bounded
    #[error("failed to resolve page count: {0}")]
    PageCount(#[source] FetcherError),

    /// HTTP client could not be built
    #[error("client error: {0}")]
    Client(#[source] FetcherError),

    /// Configuration rejected before any request
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Sink failed to persist records
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Shutdown requested before every page finished
    #[error("run cancelled after {completed}/{total} pages")]
    Cancelled {
        /// Pages that reached a success or exhausted outcome
        completed: u32,
        /// Pages in the run
        total: u32,
    },
}
