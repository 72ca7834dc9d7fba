//! # Catalog Harvester Library
//!
//! Fetches every page of a paginated marketplace catalog API under a fixed
//! concurrency budget, retries transient failures with a constant delay and
//! aggregates the per-page results into one collection written as CSV.
//!
//! ## Quick Start
//!
//! ```no_run
//! use catalog_harvester::downloader::{CatalogExecutor, FetchConfig};
//! use catalog_harvester::fetcher::http::CatalogHttpClient;
//! use catalog_harvester::output::csv::CsvProductsWriter;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = FetchConfig::default();
//! let source = CatalogHttpClient::from_config(&config)?;
//! let writer = CsvProductsWriter::new("data/clothes.csv")?;
//!
//! let summary = CatalogExecutor::new(config).execute(source, writer).await?;
//! println!("{} products", summary.records_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`fetcher`] - upstream access: HTTP client, page-count resolution, retrying requester
//! - [`downloader`] - concurrency gate, fetch orchestration, progress and the run executor
//! - [`record`] - mapping of raw API records into the output schema
//! - [`output`] - record sinks (CSV)
//! - [`report`] - catalog summary analytics over a written CSV
//! - [`shutdown`] - cooperative cancellation
//!
//! Page results are consumed in completion order, so the order of records in
//! the output is not stable between runs.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Fetch orchestration and concurrency control
pub mod downloader;

/// Upstream catalog access
pub mod fetcher;

/// Observability metrics
pub mod metrics;

/// Record sinks
pub mod output;

/// Raw record transformation
pub mod record;

/// Catalog summary analytics
pub mod report;

/// Graceful shutdown coordination shared across tasks
pub mod shutdown;

pub use downloader::{CatalogQuery, FetchConfig};
pub use record::ProductRecord;

/// One upstream API item before transformation.
pub type RawRecord = serde_json::Value;

/// Request for a single catalog page.
///
/// Created once per page index and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// 1-based page index
    pub page: u32,
    /// Fixed query parameters shared by every page of a run
    pub query: CatalogQuery,
}

impl FetchRequest {
    /// Create a request for `page` with the run's query.
    pub fn new(page: u32, query: CatalogQuery) -> Self {
        Self { page, query }
    }

    /// Query string parameters in the order the API documents them.
    pub fn query_params(&self) -> [(&'static str, String); 4] {
        [
            ("page", self.page.to_string()),
            ("category_id", self.query.category_id.to_string()),
            ("per_page", self.query.per_page.to_string()),
            ("sort", self.query.sort.clone()),
        ]
    }
}

/// Terminal result of all attempts made for one page.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The page was fetched and parsed.
    Success {
        /// Raw records taken from the response body
        records: Vec<RawRecord>,
        /// Attempt that succeeded (1-based)
        attempts: u32,
    },
    /// Every attempt failed. Degrades to zero records.
    Exhausted {
        /// Number of attempts made
        attempts: u32,
        /// Description of the last failure
        last_error: String,
    },
    /// Shutdown was requested before the page finished.
    Cancelled {
        /// Attempts started before cancellation
        attempts: u32,
    },
}

impl FetchOutcome {
    /// Number of attempts this outcome took.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Success { attempts, .. }
            | Self::Exhausted { attempts, .. }
            | Self::Cancelled { attempts } => *attempts,
        }
    }

    /// Records contributed to the run. Empty unless the fetch succeeded.
    pub fn into_records(self) -> Vec<RawRecord> {
        match self {
            Self::Success { records, .. } => records,
            Self::Exhausted { .. } | Self::Cancelled { .. } => Vec::new(),
        }
    }
}

/// Outcome tagged with the page it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct PageOutcome {
    /// 1-based page index
    pub page: u32,
    /// What happened to the page
    pub outcome: FetchOutcome,
}
