//! Retrying page requester
//!
//! Each attempt takes one concurrency permit, makes one bounded network call
//! and gives the permit back before any retry delay, so a page waiting to
//! retry never occupies a slot other pages could use. The delay between
//! attempts is constant. A page that fails every attempt degrades to zero
//! records instead of failing the run.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::downloader::config::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_RETRY_DELAY, DEFAULT_RETRY_LIMIT,
};
use crate::downloader::gate::ConcurrencyGate;
use crate::downloader::FetchConfig;
use crate::fetcher::{CatalogPage, FetcherError, FetcherResult, PageSource};
use crate::metrics::RequestMetrics;
use crate::shutdown::SharedShutdown;
use crate::{FetchOutcome, FetchRequest};

/// Classification of a failed attempt for logs and metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Per-call timeout elapsed
    Timeout,
    /// Connection or transport failure
    Network,
    /// Server answered with a non-200 status
    Status(u16),
    /// Body could not be parsed
    Parse,
    /// Body parsed but was unusable
    InvalidResponse,
}

impl FailureKind {
    /// Classify a fetcher error.
    pub fn from_error(err: &FetcherError) -> Self {
        match err {
            FetcherError::Timeout => Self::Timeout,
            FetcherError::Status { status } => Self::Status(*status),
            FetcherError::ParseError(_) => Self::Parse,
            FetcherError::InvalidResponse(_) => Self::InvalidResponse,
            FetcherError::NetworkError(_) | FetcherError::ClientBuild(_) => Self::Network,
        }
    }

    /// Short label used as a metrics dimension.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Network => "network_error",
            Self::Status(code) if (500..600).contains(code) => "server_error",
            Self::Status(429) => "rate_limited",
            Self::Status(_) => "client_error",
            Self::Parse => "parse_error",
            Self::InvalidResponse => "invalid_response",
        }
    }

    /// User-facing description.
    pub fn description(&self) -> String {
        match self {
            Self::Timeout => "request timed out".to_string(),
            Self::Network => "connection failed".to_string(),
            Self::Status(code) => format!("HTTP {code}"),
            Self::Parse => "malformed response body".to_string(),
            Self::InvalidResponse => "unusable response body".to_string(),
        }
    }
}

/// Bounded retry with a fixed inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first
    pub limit: u32,
    /// Constant pause between attempts
    pub delay: Duration,
    /// Timeout applied to each network call
    pub request_timeout: Duration,
}

impl RetryPolicy {
    /// Policy with `limit` attempts spaced by `delay`.
    pub fn new(limit: u32, delay: Duration) -> Self {
        Self {
            limit,
            delay,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Override the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Policy taken from a fetch configuration.
    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.retry_limit, config.retry_delay)
            .with_request_timeout(config.request_timeout)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_LIMIT, DEFAULT_RETRY_DELAY)
    }
}

/// Performs one logical page fetch with retries.
pub struct RetryingRequester<S> {
    source: S,
    gate: ConcurrencyGate,
    policy: RetryPolicy,
    shutdown: Option<SharedShutdown>,
}

impl<S: PageSource> RetryingRequester<S> {
    /// Create a requester drawing permits from `gate`.
    pub fn new(source: S, gate: ConcurrencyGate, policy: RetryPolicy) -> Self {
        Self {
            source,
            gate,
            policy,
            shutdown: None,
        }
    }

    /// Attach a shutdown handle checked at every suspension point.
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Gate shared by every fetch of this requester.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Retry policy in effect.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Underlying page source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Fetch one page, retrying failed attempts up to the policy limit.
    pub async fn fetch(&self, request: &FetchRequest) -> FetchOutcome {
        let page = request.page;
        let limit = self.policy.limit.max(1);
        let mut last_error = String::new();

        for attempt in 1..=limit {
            if self.shutdown_requested() {
                return FetchOutcome::Cancelled {
                    attempts: attempt - 1,
                };
            }

            let Some(result) = self.attempt(request, attempt).await else {
                return FetchOutcome::Cancelled { attempts: attempt };
            };

            match result {
                Ok(body) => {
                    if attempt > 1 {
                        info!(page, attempt, "[page {page}] succeeded on attempt {attempt}/{limit}");
                    }
                    return FetchOutcome::Success {
                        records: body.products,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    let kind = FailureKind::from_error(&err);
                    warn!(
                        page,
                        attempt,
                        max_attempts = limit,
                        error = %err,
                        "[page {page}] {}, attempt {attempt}/{limit}",
                        kind.description()
                    );
                    last_error = err.to_string();
                }
            }

            if attempt < limit {
                crate::metrics::record_retry_delay(self.policy.delay);
                debug!(page, delay_ms = self.policy.delay.as_millis(), "Waiting before retry");
                if !self.pause(self.policy.delay).await {
                    return FetchOutcome::Cancelled { attempts: attempt };
                }
            }
        }

        error!(page, attempts = limit, last_error = %last_error, "[page {page}] Giving up after {limit} attempts.");
        crate::metrics::record_exhausted_page();
        FetchOutcome::Exhausted {
            attempts: limit,
            last_error,
        }
    }

    /// One gated, timed network call. `None` when cancelled.
    async fn attempt(
        &self,
        request: &FetchRequest,
        attempt: u32,
    ) -> Option<FetcherResult<CatalogPage>> {
        let call = async {
            let _permit = match self.gate.acquire().await {
                Ok(permit) => permit,
                Err(e) => return Err(FetcherError::NetworkError(e.to_string())),
            };

            let metrics = RequestMetrics::start(request.page, attempt);
            let result: FetcherResult<CatalogPage> = tokio::time::timeout(
                self.policy.request_timeout,
                self.source.fetch_page(request),
            )
            .await
            .unwrap_or(Err(FetcherError::Timeout));
            metrics.record(&result);
            result
        };

        match &self.shutdown {
            Some(shutdown) => shutdown.run_until_shutdown(call).await,
            None => Some(call.await),
        }
    }

    async fn pause(&self, delay: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => shutdown.sleep(delay).await,
            None => {
                tokio::time::sleep(delay).await;
                true
            }
        }
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }
}
