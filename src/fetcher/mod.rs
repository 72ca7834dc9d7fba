//! Upstream catalog access

use crate::{FetchRequest, RawRecord};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

pub mod http;
pub mod page_count;
pub mod retry;

pub use page_count::{PageCount, PageCountResolver};
pub use retry::{FailureKind, RetryPolicy, RetryingRequester};

/// Fetcher errors
#[derive(Debug, thiserror::Error)]
pub enum FetcherError {
    /// Non-200 HTTP status
    #[error("HTTP status {status}")]
    Status {
        /// Status code returned by the server
        status: u16,
    },

    /// Call did not finish within the per-call timeout
    #[error("request timed out")]
    Timeout,

    /// Connection or transport failure
    #[error("network error: {0}")]
    NetworkError(String),

    /// Body was not the expected JSON
    #[error("parse error: {0}")]
    ParseError(String),

    /// Body parsed but lacks required data
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// HTTP client could not be constructed
    #[error("client build error: {0}")]
    ClientBuild(String),
}

/// Result type for fetcher operations
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Body of a products page.
///
/// Only `products` is read for a page fetch. `meta` stays untyped so a page
/// with odd or partial metadata still yields its records; the total is read
/// on demand by [`CatalogPage::total_items`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogPage {
    /// Raw product records; absent means none
    #[serde(default)]
    pub products: Vec<RawRecord>,
    /// Pagination metadata, present on page 1
    #[serde(default)]
    pub meta: Option<Value>,
}

impl CatalogPage {
    /// Parse a response body. The content type is not trusted.
    pub fn from_body(body: &str) -> FetcherResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| FetcherError::ParseError(format!("Failed to deserialize page: {e}")))
    }

    /// `meta.total` as an item count. Numeric strings are accepted.
    pub fn total_items(&self) -> Option<u64> {
        match self.meta.as_ref()?.get("total")? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

/// One HTTP call for one catalog page.
///
/// Implementations make exactly one attempt; retries, timeouts and the
/// concurrency budget are applied by [`RetryingRequester`].
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Fetch and parse a single page.
    async fn fetch_page(&self, request: &FetchRequest) -> FetcherResult<CatalogPage>;
}

#[async_trait]
impl<S: PageSource + ?Sized> PageSource for std::sync::Arc<S> {
    async fn fetch_page(&self, request: &FetchRequest) -> FetcherResult<CatalogPage> {
        (**self).fetch_page(request).await
    }
}
