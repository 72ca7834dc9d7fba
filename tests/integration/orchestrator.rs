//! Orchestration properties: one outcome per page, bounded in-flight calls,
//! overlap of retry delays with other pages' work.

use catalog_harvester::downloader::{ConcurrencyGate, FetchOrchestrator};
use catalog_harvester::fetcher::{RetryPolicy, RetryingRequester};
use catalog_harvester::CatalogQuery;
use std::sync::Arc;
use std::time::Duration;

use crate::support::ScriptedSource;

fn orchestrator(
    source: ScriptedSource,
    concurrency: usize,
    retry_delay: Duration,
) -> (FetchOrchestrator<Arc<ScriptedSource>>, Arc<ScriptedSource>, ConcurrencyGate) {
    let source = Arc::new(source);
    let gate = ConcurrencyGate::new(concurrency);
    let requester = RetryingRequester::new(
        Arc::clone(&source),
        gate.clone(),
        RetryPolicy::new(3, retry_delay).with_request_timeout(Duration::from_secs(30)),
    );
    let orchestrator =
        FetchOrchestrator::new(Arc::new(requester), CatalogQuery::new(3003, 24, "x"), 100);
    (orchestrator, source, gate)
}

#[tokio::test(start_paused = true)]
async fn test_exactly_one_outcome_per_page() {
    for total_pages in 0..=12u32 {
        let items = u64::from(total_pages) * 24;
        let (orchestrator, source, _) =
            orchestrator(ScriptedSource::new(items, 24), 4, Duration::from_secs(2));

        let report = orchestrator.run(total_pages).await;

        assert_eq!(report.pages_completed, total_pages);
        assert_eq!(report.records.len() as u64, items);
        assert_eq!(source.total_calls(), total_pages as usize);
        for page in 1..=total_pages {
            assert_eq!(source.calls_for(page).len(), 1, "page {page} fetched once");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_never_exceeds_concurrency() {
    let (orchestrator, source, gate) = orchestrator(
        ScriptedSource::new(40 * 24, 24).with_latency(Duration::from_millis(50)),
        3,
        Duration::from_secs(2),
    );

    let report = orchestrator.run(40).await;

    assert_eq!(report.pages_completed, 40);
    assert!(source.peak_in_flight() <= 3);
    assert!(gate.peak_in_flight() <= 3);
    // 40 symmetric pages saturate the gate
    assert_eq!(source.peak_in_flight(), 3);
    assert_eq!(gate.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_retry_delay_overlaps_other_pages() {
    let retry_delay = Duration::from_secs(2);
    let (orchestrator, source, _) = orchestrator(
        ScriptedSource::new(3 * 24, 24).failing(2, 2),
        2,
        retry_delay,
    );

    let started = tokio::time::Instant::now();
    let report = orchestrator.run(3).await;
    let elapsed = started.elapsed();

    assert_eq!(report.records.len(), 72);
    assert!(report.failed_pages.is_empty());
    assert_eq!(source.calls_for(2).len(), 3);
    assert_eq!(source.calls_for(1).len(), 1);
    assert_eq!(source.calls_for(3).len(), 1);

    assert!(elapsed >= retry_delay * 2, "elapsed {elapsed:?}");
    assert!(elapsed < retry_delay * 3, "elapsed {elapsed:?}");

    // Page 3 ran while page 2 waited out its first delay
    let page3 = source.calls_for(3)[0];
    let page2_retry = source.calls_for(2)[1];
    assert!(page3 < page2_retry);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_page_reported_and_run_continues() {
    let (orchestrator, source, _) = orchestrator(
        ScriptedSource::new(5 * 24, 24).failing(4, u32::MAX),
        2,
        Duration::from_secs(1),
    );

    let report = orchestrator.run(5).await;

    assert_eq!(report.pages_completed, 5);
    assert_eq!(report.failed_pages, vec![4]);
    assert_eq!(report.records.len(), 4 * 24);
    assert_eq!(source.calls_for(4).len(), 3);
    assert_eq!(report.attempts, 4 + 3);
}

#[tokio::test(start_paused = true)]
async fn test_reruns_yield_equal_record_sets() {
    let mut runs = Vec::new();
    for _ in 0..2 {
        let (orchestrator, _, _) = orchestrator(
            ScriptedSource::new(7 * 24 - 5, 24).failing(3, 1),
            3,
            Duration::from_millis(200),
        );
        let report = orchestrator.run(7).await;
        let mut ids: Vec<u64> = report
            .records
            .iter()
            .map(|r| r["id"].as_u64().unwrap())
            .collect();
        ids.sort_unstable();
        runs.push(ids);
    }

    assert_eq!(runs[0].len(), 7 * 24 - 5);
    assert_eq!(runs[0], runs[1]);
}
