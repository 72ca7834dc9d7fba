//! Fetch configuration and defaults

use std::time::Duration;

use super::DownloadError;

/// Catalog endpoint queried for product pages.
pub const DEFAULT_BASE_URL: &str = "https://mp-catalog.umico.az/api/v1/products";

/// Clothing category.
pub const DEFAULT_CATEGORY_ID: u64 = 3003;

/// Items per page requested from the API.
pub const DEFAULT_PER_PAGE: u32 = 24;

/// Sort key sent with every request.
pub const DEFAULT_SORT: &str = "global_popular_score";

/// Simultaneous in-flight requests across the whole run.
pub const DEFAULT_CONCURRENCY: usize = 20;

/// Upper bound accepted for concurrency.
pub const MAX_CONCURRENCY: usize = 64;

/// Attempts per page before it is given up.
pub const DEFAULT_RETRY_LIMIT: u32 = 3;

/// Constant pause between attempts of the same page.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Overall timeout of a single HTTP call.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed to establish a TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Emit a progress line every N completed pages.
pub const DEFAULT_PROGRESS_INTERVAL: u32 = 100;

/// Language sent in the locale headers.
pub const DEFAULT_LOCALE: &str = "az";

/// Storefront the API expects requests to originate from.
pub const DEFAULT_ORIGIN: &str = "https://birmarket.az";

/// Browser user agent; the API rejects obvious bots.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/145.0.0.0 Safari/537.36";

/// Fixed query parameters shared by every page of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogQuery {
    /// Category identifier
    pub category_id: u64,
    /// Page size
    pub per_page: u32,
    /// Sort key
    pub sort: String,
}

impl CatalogQuery {
    /// Build a query.
    pub fn new(category_id: u64, per_page: u32, sort: impl Into<String>) -> Self {
        Self {
            category_id,
            per_page,
            sort: sort.into(),
        }
    }
}

impl Default for CatalogQuery {
    fn default() -> Self {
        Self::new(DEFAULT_CATEGORY_ID, DEFAULT_PER_PAGE, DEFAULT_SORT)
    }
}

/// Everything a run needs to know about the upstream API and its budget.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Products endpoint
    pub base_url: String,
    /// Query sent with every page request
    pub query: CatalogQuery,
    /// Maximum simultaneous network calls
    pub concurrency: usize,
    /// Attempts per page
    pub retry_limit: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
    /// Per-call timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Pages between progress lines
    pub progress_interval: u32,
    /// Locale for the language headers
    pub locale: String,
    /// Accept invalid TLS certificates
    pub insecure: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query: CatalogQuery::default(),
            concurrency: DEFAULT_CONCURRENCY,
            retry_limit: DEFAULT_RETRY_LIMIT,
            retry_delay: DEFAULT_RETRY_DELAY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            locale: DEFAULT_LOCALE.to_string(),
            insecure: false,
        }
    }
}

impl FetchConfig {
    /// Check the configuration before any request is made.
    pub fn validate(&self) -> Result<(), DownloadError> {
        if self.base_url.trim().is_empty() {
            return Err(DownloadError::InvalidConfig(
                "base URL must not be empty".to_string(),
            ));
        }
        if self.concurrency == 0 || self.concurrency > MAX_CONCURRENCY {
            return Err(DownloadError::InvalidConfig(format!(
                "concurrency must be between 1 and {MAX_CONCURRENCY}, got {}",
                self.concurrency
            )));
        }
        if self.retry_limit == 0 {
            return Err(DownloadError::InvalidConfig(
                "retry limit must be at least 1".to_string(),
            ));
        }
        if self.query.per_page == 0 {
            return Err(DownloadError::InvalidConfig(
                "page size must be at least 1".to_string(),
            ));
        }
        if self.progress_interval == 0 {
            return Err(DownloadError::InvalidConfig(
                "progress interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Headers sent with every request.
    pub fn default_headers(&self) -> Vec<(&'static str, String)> {
        vec![
            ("accept", "application/json, text/plain, */*".to_string()),
            ("accept-language", self.locale.clone()),
            ("content-language", self.locale.clone()),
            ("http_accept_language", self.locale.clone()),
            ("http_content_language", self.locale.clone()),
            ("origin", DEFAULT_ORIGIN.to_string()),
            ("referer", format!("{DEFAULT_ORIGIN}/")),
            ("user-agent", DEFAULT_USER_AGENT.to_string()),
        ]
    }
}
