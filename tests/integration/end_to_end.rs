//! Full runs: resolve, fetch, transform, write.

use catalog_harvester::downloader::{CatalogExecutor, DownloadError};
use catalog_harvester::fetcher::http::CatalogHttpClient;
use catalog_harvester::output::csv::CsvProductsWriter;
use catalog_harvester::output::{OutputResult, OutputWriter, ProductsWriter};
use catalog_harvester::record::CSV_FIELDS;
use catalog_harvester::shutdown::ShutdownCoordinator;
use catalog_harvester::{FetchConfig, ProductRecord};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::support::ScriptedSource;

/// Collects rows in memory.
#[derive(Clone, Default)]
struct MemoryWriter {
    rows: Arc<Mutex<Vec<ProductRecord>>>,
    closed: Arc<Mutex<bool>>,
}

impl OutputWriter for MemoryWriter {
    fn flush(&mut self) -> OutputResult<()> {
        Ok(())
    }

    fn close(self) -> OutputResult<()> {
        *self.closed.lock().unwrap() = true;
        Ok(())
    }
}

impl ProductsWriter for MemoryWriter {
    fn write_product(&mut self, product: &ProductRecord) -> OutputResult<()> {
        self.rows.lock().unwrap().push(product.clone());
        Ok(())
    }
}

fn fast_config() -> FetchConfig {
    FetchConfig {
        concurrency: 2,
        retry_delay: Duration::from_secs(2),
        ..FetchConfig::default()
    }
}

fn product(id: u64) -> serde_json::Value {
    json!({
        "id": id,
        "name": format!("Product {id}"),
        "brand": "Nike",
        "category": {"name": "Kişi cinsləri"},
        "slugged_name": format!("product-{id}"),
        "default_offer": {"retail_price": 80, "old_price": 100, "avail_check": true}
    })
}

async fn mount_page(server: &MockServer, page: u32, ids: &[u64], total: u64) {
    let products: Vec<_> = ids.iter().map(|&id| product(id)).collect();
    Mock::given(method("GET"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": products,
            "meta": {"total": total}
        })))
        .mount(server)
        .await;
}

#[tokio::test(start_paused = true)]
async fn test_three_pages_with_flaky_middle_page() {
    let source = ScriptedSource::new(3 * 24, 24).failing(2, 2);
    let writer = MemoryWriter::default();

    let started = tokio::time::Instant::now();
    let summary = CatalogExecutor::new(fast_config())
        .execute(source, writer.clone())
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.total_items, 72);
    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.pages_completed, 3);
    assert_eq!(summary.records_written, 72);
    assert!(summary.failed_pages.is_empty());
    assert_eq!(summary.attempts, 5);
    assert!(summary.peak_in_flight <= 2);

    assert!(elapsed >= Duration::from_secs(4));
    assert!(elapsed < Duration::from_secs(6));

    let rows = writer.rows.lock().unwrap();
    assert_eq!(rows.len(), 72);
    assert!(rows.iter().all(|r| r.discount_pct == 20.0));
    assert!(*writer.closed.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_zero_items_writes_nothing_but_succeeds() {
    let writer = MemoryWriter::default();
    let summary = CatalogExecutor::new(fast_config())
        .execute(ScriptedSource::new(0, 24), writer.clone())
        .await
        .unwrap();

    assert_eq!(summary.total_pages, 0);
    assert_eq!(summary.records_written, 0);
    assert!(writer.rows.lock().unwrap().is_empty());
    assert!(*writer.closed.lock().unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_page_count_failure_is_fatal() {
    // The metadata request is not retried
    let source = ScriptedSource::new(48, 24).failing(1, 1);
    let writer = MemoryWriter::default();

    let err = CatalogExecutor::new(fast_config())
        .execute(source, writer.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::PageCount(_)));
    assert!(!*writer.closed.lock().unwrap());
}

#[tokio::test]
async fn test_invalid_config_rejected() {
    let config = FetchConfig {
        concurrency: 0,
        ..FetchConfig::default()
    };
    let err = CatalogExecutor::new(config)
        .execute(ScriptedSource::new(24, 24), MemoryWriter::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DownloadError::InvalidConfig(_)));
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_discards_results() {
    let shutdown = ShutdownCoordinator::shared();
    let source = ScriptedSource::new(10 * 24, 24).with_latency(Duration::from_secs(1));
    let writer = MemoryWriter::default();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(2500)).await;
        trigger.request_shutdown();
    });

    let err = CatalogExecutor::new(fast_config())
        .with_shutdown(shutdown)
        .execute(source, writer.clone())
        .await
        .unwrap_err();

    match err {
        DownloadError::Cancelled { completed, total } => {
            assert_eq!(total, 10);
            assert!(completed < 10);
        }
        other => panic!("expected cancellation, got {other:?}"),
    }
    assert!(writer.rows.lock().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancellation_during_page_count_returns_promptly() {
    let shutdown = ShutdownCoordinator::shared();
    let source = ScriptedSource::new(10 * 24, 24).with_latency(Duration::from_secs(60));
    let writer = MemoryWriter::default();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.request_shutdown();
    });

    let started = tokio::time::Instant::now();
    let err = CatalogExecutor::new(fast_config())
        .with_shutdown(shutdown)
        .execute(source, writer.clone())
        .await
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(matches!(
        err,
        DownloadError::Cancelled {
            completed: 0,
            total: 0
        }
    ));
    assert!(!*writer.closed.lock().unwrap());
}

#[tokio::test]
async fn test_http_run_writes_csv() {
    let server = MockServer::start().await;
    mount_page(&server, 1, &[1, 2], 5).await;
    mount_page(&server, 2, &[3, 4], 5).await;
    mount_page(&server, 3, &[5], 5).await;

    let config = FetchConfig {
        base_url: format!("{}/api/v1/products", server.uri()),
        query: catalog_harvester::CatalogQuery::new(3003, 2, "global_popular_score"),
        concurrency: 2,
        retry_delay: Duration::from_millis(10),
        ..FetchConfig::default()
    };

    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("data").join("clothes.csv");
    let source = CatalogHttpClient::from_config(&config).unwrap();
    let writer = CsvProductsWriter::new(&output).unwrap();

    let summary = CatalogExecutor::new(config)
        .execute(source, writer)
        .await
        .unwrap();
    assert_eq!(summary.total_pages, 3);
    assert_eq!(summary.records_written, 5);

    let mut reader = csv::Reader::from_path(&output).unwrap();
    assert_eq!(
        reader.headers().unwrap().iter().collect::<Vec<_>>(),
        CSV_FIELDS.to_vec()
    );
    let mut ids: Vec<String> = reader
        .deserialize::<ProductRecord>()
        .map(|row| row.unwrap().id.unwrap())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["1", "2", "3", "4", "5"]);
}

#[tokio::test]
async fn test_http_run_reports_failed_page() {
    let server = MockServer::start().await;
    mount_page(&server, 1, &[1, 2], 6).await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    mount_page(&server, 3, &[5, 6], 6).await;

    let config = FetchConfig {
        base_url: format!("{}/api/v1/products", server.uri()),
        query: catalog_harvester::CatalogQuery::new(3003, 2, "global_popular_score"),
        retry_delay: Duration::from_millis(10),
        ..FetchConfig::default()
    };
    let source = CatalogHttpClient::from_config(&config).unwrap();
    let writer = MemoryWriter::default();

    let summary = CatalogExecutor::new(config)
        .execute(source, writer.clone())
        .await
        .unwrap();

    assert_eq!(summary.failed_pages, vec![2]);
    assert_eq!(summary.pages_completed, 3);
    assert_eq!(summary.records_written, 4);
    assert_eq!(writer.rows.lock().unwrap().len(), 4);
}
