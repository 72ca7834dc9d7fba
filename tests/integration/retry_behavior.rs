//! Retry policy: attempt counts, constant spacing, stop on success.

use catalog_harvester::downloader::ConcurrencyGate;
use catalog_harvester::fetcher::{RetryPolicy, RetryingRequester};
use catalog_harvester::shutdown::ShutdownCoordinator;
use catalog_harvester::{CatalogQuery, FetchOutcome, FetchRequest};
use std::time::Duration;

use crate::support::ScriptedSource;

const DELAY: Duration = Duration::from_secs(2);

fn requester(source: ScriptedSource, limit: u32) -> RetryingRequester<ScriptedSource> {
    RetryingRequester::new(source, ConcurrencyGate::new(2), RetryPolicy::new(limit, DELAY))
}

fn page(n: u32) -> FetchRequest {
    FetchRequest::new(n, CatalogQuery::default())
}

#[tokio::test(start_paused = true)]
async fn test_always_failing_page_retried_exactly_limit_times() {
    let requester = requester(ScriptedSource::new(240, 24).failing(7, u32::MAX), 3);

    let outcome = requester.fetch(&page(7)).await;

    assert!(matches!(outcome, FetchOutcome::Exhausted { attempts: 3, .. }));
    assert!(outcome.into_records().is_empty());

    let calls = requester.source().calls_for(7);
    assert_eq!(calls.len(), 3);
    for pair in calls.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= DELAY, "gap {gap:?} shorter than the retry delay");
        assert!(gap < DELAY + Duration::from_millis(100), "gap {gap:?} is not constant");
    }
}

#[tokio::test(start_paused = true)]
async fn test_success_after_k_failures() {
    for k in 0..3u32 {
        let requester = requester(ScriptedSource::new(240, 24).failing(2, k), 3);

        let outcome = requester.fetch(&page(2)).await;

        assert_eq!(outcome.attempts(), k + 1);
        assert_eq!(outcome.into_records().len(), 24);
        assert_eq!(requester.source().calls_for(2).len(), (k + 1) as usize);
    }
}

#[tokio::test(start_paused = true)]
async fn test_retry_limit_is_configurable() {
    let requester = requester(ScriptedSource::new(240, 24).failing(1, u32::MAX), 5);

    let outcome = requester.fetch(&page(1)).await;

    assert_eq!(outcome.attempts(), 5);
    assert_eq!(requester.source().calls_for(1).len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_gate_free_while_waiting_to_retry() {
    let requester = requester(ScriptedSource::new(240, 24).failing(3, 1), 3);
    let gate = requester.gate().clone();

    let handle = tokio::spawn(async move { requester.fetch(&page(3)).await });
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(gate.in_flight(), 0);
    assert_eq!(gate.available(), 2);

    let outcome = handle.await.unwrap();
    assert_eq!(outcome.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_retries() {
    let shutdown = ShutdownCoordinator::shared();
    let requester =
        requester(ScriptedSource::new(240, 24).failing(4, u32::MAX), 3).with_shutdown(shutdown.clone());

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(3)).await;
        trigger.request_shutdown();
    });

    let outcome = requester.fetch(&page(4)).await;
    assert!(matches!(outcome, FetchOutcome::Cancelled { .. }));
    assert_eq!(requester.source().calls_for(4).len(), 2);
}
