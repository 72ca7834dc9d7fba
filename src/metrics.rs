//! Observability metrics for catalog runs
//!
//! Uses the `metrics` facade, so recording is a no-op until a recorder is
//! installed. [`init_metrics`] installs the Prometheus exporter with an HTTP
//! scrape endpoint.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::OnceCell;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::fetcher::{FailureKind, FetcherResult};

static METRICS_INITIALIZED: OnceCell<SocketAddr> = OnceCell::new();

/// Install the Prometheus exporter on `addr`.
///
/// Idempotent: later calls are ignored once an exporter is running.
pub fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(existing) = METRICS_INITIALIZED.get() {
        debug!(%existing, "Metrics already initialized, skipping");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "catalog_page_attempts_total",
        Unit::Count,
        "Page fetch attempts by result"
    );
    describe_histogram!(
        "catalog_request_duration_seconds",
        Unit::Seconds,
        "Duration of a single page request"
    );
    describe_counter!(
        "catalog_retries_total",
        Unit::Count,
        "Retry delays taken after failed attempts"
    );
    describe_counter!(
        "catalog_pages_exhausted_total",
        Unit::Count,
        "Pages that failed every attempt"
    );
    describe_gauge!(
        "catalog_requests_in_flight",
        Unit::Count,
        "Network calls currently holding a concurrency permit"
    );
    describe_counter!(
        "catalog_records_total",
        Unit::Count,
        "Records accumulated across completed pages"
    );

    let _ = METRICS_INITIALIZED.set(addr);
    info!(%addr, "Metrics exporter listening");
    Ok(())
}

/// Whether an exporter has been installed.
pub fn is_initialized() -> bool {
    METRICS_INITIALIZED.get().is_some()
}

/// Timing and result of one page request.
pub struct RequestMetrics {
    page: u32,
    attempt: u32,
    start_time: Instant,
}

impl RequestMetrics {
    /// Start timing an attempt.
    pub fn start(page: u32, attempt: u32) -> Self {
        Self {
            page,
            attempt,
            start_time: Instant::now(),
        }
    }

    /// Record how the attempt ended.
    pub fn record<T>(&self, result: &FetcherResult<T>) {
        let duration = self.start_time.elapsed();
        let outcome = match result {
            Ok(_) => "success",
            Err(err) => FailureKind::from_error(err).label(),
        };

        counter!("catalog_page_attempts_total", "outcome" => outcome).increment(1);
        histogram!("catalog_request_duration_seconds").record(duration.as_secs_f64());

        debug!(
            page = self.page,
            attempt = self.attempt,
            outcome,
            duration_ms = duration.as_millis(),
            "Page request finished"
        );
    }
}

/// Record a retry delay about to be taken.
pub fn record_retry_delay(delay: Duration) {
    counter!("catalog_retries_total").increment(1);
    histogram!("catalog_retry_delay_seconds").record(delay.as_secs_f64());
}

/// Record a page that exhausted its attempts.
pub fn record_exhausted_page() {
    counter!("catalog_pages_exhausted_total").increment(1);
}

/// Publish the number of calls currently in flight.
pub fn record_in_flight(in_flight: usize) {
    gauge!("catalog_requests_in_flight").set(in_flight as f64);
}

/// Record records accumulated from a completed page.
pub fn record_page_records(count: usize) {
    counter!("catalog_records_total").increment(count as u64);
}
