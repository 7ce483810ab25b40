//! Worker pool integration tests.
//!
//! Tests verify:
//! - Overflow beyond workers + queue is rejected as `Saturated`
//! - The cache budget holds while many workers fill it
//! - Decode failures and timeouts are delivered, never retried

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;

use thumbgrid::thumbnail::{DeliverFn, Delivery};
use thumbgrid::{CellId, FailureKind, FetchError, FetchRequest, FetchWorkerPool, GridConfig, SubmitOutcome};

use super::test_utils::{grid_config, key, wait_until, MockImageFetcher};

type Results = Arc<Mutex<Vec<(usize, Delivery)>>>;

fn recorder(results: &Results, id: usize) -> DeliverFn {
    let results = Arc::clone(results);
    Box::new(move |delivery| results.lock().unwrap().push((id, delivery)))
}

#[tokio::test]
async fn test_overflow_is_rejected_as_saturated() {
    let mut fetcher = MockImageFetcher::new();
    let mut gates = Vec::new();
    for i in 0..20 {
        let name = format!("img{}", i);
        fetcher = fetcher.with_image(&name, i + 1);
        gates.push(fetcher.gate(&name));
    }
    let fetcher = Arc::new(fetcher);
    let pool = FetchWorkerPool::new(Arc::clone(&fetcher), &grid_config(3, 5));
    let results: Results = Arc::default();

    let mut rejected = 0;
    for i in 0..20 {
        let outcome = pool
            .submit(
                FetchRequest::new(CellId(i), key(&format!("img{}", i))),
                recorder(&results, i),
            )
            .await;
        if outcome == SubmitOutcome::Rejected {
            rejected += 1;
        }
        assert!(pool.active_count() <= 3);
        assert!(pool.queued_count() <= 5);
    }

    assert_eq!(rejected, 20 - 3 - 5);
    {
        let results = results.lock().unwrap();
        assert_eq!(results.len(), 12);
        assert!(results
            .iter()
            .all(|(_, d)| d.as_ref().unwrap_err().kind() == FailureKind::Saturated));
    }

    for gate in &gates {
        gate.add_permits(1);
    }
    assert!(wait_until(|| results.lock().unwrap().len() == 20).await);
    assert!(wait_until(|| pool.active_count() == 0).await);

    let ok: Vec<usize> = {
        let mut ok: Vec<usize> = results
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, d)| d.is_ok())
            .map(|(id, _)| *id)
            .collect();
        ok.sort();
        ok
    };
    assert_eq!(ok, (0..8).collect::<Vec<_>>());
    // Rejected requests were never fetched.
    assert_eq!(fetcher.calls().len(), 8);
}

#[tokio::test]
async fn test_cache_budget_respected_by_workers() {
    let mut fetcher = MockImageFetcher::new();
    for i in 0..30 {
        fetcher = fetcher.with_image(&format!("img{}", i), 10 + i);
    }
    // Decoded images are width * 4 bytes; budget fits only a handful.
    let config = GridConfig {
        cache_byte_budget: 400,
        ..grid_config(4, 30)
    };
    let pool = FetchWorkerPool::new(fetcher, &config);
    let results: Results = Arc::default();

    for i in 0..30 {
        pool.submit(
            FetchRequest::new(CellId(i as usize), key(&format!("img{}", i))),
            recorder(&results, i as usize),
        )
        .await;
        assert!(pool.cache().size().await <= 400);
    }

    assert!(wait_until(|| results.lock().unwrap().len() == 30).await);
    assert!(results.lock().unwrap().iter().all(|(_, d)| d.is_ok()));
    assert!(pool.cache().size().await <= 400);
    assert!(pool.cache().len().await > 0);
}

#[tokio::test]
async fn test_decode_failure_is_delivered() {
    let fetcher = MockImageFetcher::new();
    fetcher.set_body("broken", Bytes::from_static(b"<html>not an image</html>"));
    let pool = FetchWorkerPool::new(fetcher, &grid_config(1, 1));
    let results: Results = Arc::default();

    pool.submit(FetchRequest::new(CellId(0), key("broken")), recorder(&results, 0))
        .await;

    assert!(wait_until(|| results.lock().unwrap().len() == 1).await);
    assert!(!pool.cache().contains(&key("broken")).await);
    let results = results.lock().unwrap();
    assert_eq!(results[0].1.as_ref().unwrap_err().kind(), FailureKind::Decode);
}

#[tokio::test]
async fn test_timeout_frees_worker_for_queue() {
    let fetcher = MockImageFetcher::new()
        .with_image("slow", 3)
        .with_image("fast", 5);
    let _never_opened = fetcher.gate("slow");
    let config = GridConfig {
        fetch_timeout: Duration::from_millis(50),
        ..grid_config(1, 4)
    };
    let pool = FetchWorkerPool::new(fetcher, &config);
    let results: Results = Arc::default();

    assert_eq!(
        pool.submit(FetchRequest::new(CellId(0), key("slow")), recorder(&results, 0))
            .await,
        SubmitOutcome::Dispatched
    );
    assert_eq!(
        pool.submit(FetchRequest::new(CellId(1), key("fast")), recorder(&results, 1))
            .await,
        SubmitOutcome::Queued
    );

    assert!(wait_until(|| results.lock().unwrap().len() == 2).await);
    let results = results.lock().unwrap();
    assert_eq!(results[0].0, 0);
    assert_eq!(
        results[0].1.as_ref().unwrap_err(),
        &FetchError::Timeout(Duration::from_millis(50))
    );
    assert_eq!(results[1].0, 1);
    assert_eq!(results[1].1.as_ref().unwrap().width(), 5);
}

#[tokio::test]
async fn test_failures_are_not_retried() {
    let fetcher = Arc::new(
        MockImageFetcher::new().with_error("gone", FetchError::Network("connection reset".into())),
    );
    let pool = FetchWorkerPool::new(Arc::clone(&fetcher), &grid_config(2, 2));
    let results: Results = Arc::default();

    pool.submit(FetchRequest::new(CellId(0), key("gone")), recorder(&results, 0))
        .await;

    assert!(wait_until(|| pool.active_count() == 0).await);
    assert_eq!(results.lock().unwrap().len(), 1);
    assert_eq!(fetcher.call_count("gone"), 1);
}
