//! Shared test doubles

use async_trait::async_trait;
use catalog_harvester::fetcher::{CatalogPage, FetcherError, FetcherResult, PageSource};
use catalog_harvester::FetchRequest;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

/// In-memory catalog with scripted failures.
///
/// Page `p` holds `per_page` records (fewer on the last page). Every response
/// carries `meta.total`. Calls are timed with tokio's clock so paused-time
/// tests see virtual instants.
pub struct ScriptedSource {
    total_items: u64,
    per_page: u32,
    latency: Duration,
    failures: Mutex<HashMap<u32, u32>>,
    calls: Mutex<HashMap<u32, Vec<Instant>>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(total_items: u64, per_page: u32) -> Self {
        Self {
            total_items,
            per_page,
            latency: Duration::from_millis(10),
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    /// Simulated network time of each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the next `times` calls for `page` with HTTP 503.
    pub fn failing(self, page: u32, times: u32) -> Self {
        self.failures.lock().unwrap().insert(page, times);
        self
    }

    /// Records page `page` is expected to contribute.
    pub fn records_on(&self, page: u32) -> u64 {
        let start = u64::from(page - 1) * u64::from(self.per_page);
        self.total_items.saturating_sub(start).min(u64::from(self.per_page))
    }

    /// Instants at which `page` was requested.
    pub fn calls_for(&self, page: u32) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().map(Vec::len).sum()
    }

    /// Most calls observed in flight at once.
    pub fn peak_in_flight(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for ScriptedSource {
    async fn fetch_page(&self, request: &FetchRequest) -> FetcherResult<CatalogPage> {
        let page = request.page;
        self.calls
            .lock()
            .unwrap()
            .entry(page)
            .or_default()
            .push(Instant::now());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.latency).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let fail = {
            let mut failures = self.failures.lock().unwrap();
            match failures.get_mut(&page) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        };
        if fail {
            return Err(FetcherError::Status { status: 503 });
        }

        let products = (0..self.records_on(page))
            .map(|i| {
                json!({
                    "id": u64::from(page) * 1000 + i,
                    "name": format!("Product {page}-{i}"),
                    "slugged_name": format!("product-{page}-{i}"),
                    "default_offer": {"retail_price": 80, "old_price": 100}
                })
            })
            .collect();

        Ok(CatalogPage {
            products,
            meta: Some(json!({"total": self.total_items})),
        })
    }
}
