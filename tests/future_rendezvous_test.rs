//! Cross-process result handoff.
//!
//! Each `Coordinator` stands in for a separate process; they only share the
//! backing store.

use std::sync::Arc;
use std::time::Duration;

use cairn::AppConfig;
use cairn::CoordinationError;
use cairn::Coordinator;
use cairn::DeterministicKeyValueStore;
use cairn::KeyValueStore;
use serde::Deserialize;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Report {
    job: String,
    rows: u64,
}

fn two_processes() -> (Coordinator, Coordinator) {
    let config = AppConfig::from_toml_str(
        r#"
        [futures.reports]
        poll_interval_ms = 5
        timeout_ms = 2000
        "#,
    )
    .unwrap();
    let store: Arc<dyn KeyValueStore> = DeterministicKeyValueStore::new();
    (Coordinator::with_store(config.clone(), store.clone()), Coordinator::with_store(config, store))
}

#[tokio::test]
async fn test_waiter_receives_result_from_other_process() {
    let (waiter, worker) = two_processes();
    let pending = waiter.futures::<Report>("reports").create("report-17").unwrap();

    let report = Report {
        job: "job-42".into(),
        rows: 1200,
    };
    let producer = {
        let report = report.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            worker.futures::<Report>("reports").complete("report-17", &report).await
        })
    };

    assert_eq!(pending.await.unwrap(), report);
    producer.await.unwrap().unwrap();

    // Consumed exactly once.
    assert_eq!(waiter.futures::<Report>("reports").take("report-17").await.unwrap(), None);
}

#[tokio::test]
async fn test_result_completed_before_wait_is_collected() {
    let (waiter, worker) = two_processes();
    worker.futures::<u64>("reports").complete("early", &7).await.unwrap();
    let value = waiter.futures::<u64>("reports").create("early").unwrap().await.unwrap();
    assert_eq!(value, 7);
}

#[tokio::test]
async fn test_wait_times_out_without_producer() {
    let (waiter, _worker) = two_processes();
    let err = waiter
        .futures::<u64>("reports")
        .create_with_timeout("never", Duration::from_millis(40))
        .unwrap()
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinationError::Timeout { .. }));
}

#[tokio::test]
async fn test_two_waiters_on_one_key_only_one_wins() {
    let (first, second) = two_processes();
    let a = first.futures::<u64>("reports").create_with_timeout("shared", Duration::from_millis(300)).unwrap();
    let b = second.futures::<u64>("reports").create_with_timeout("shared", Duration::from_millis(300)).unwrap();

    first.futures::<u64>("reports").complete("shared", &1).await.unwrap();

    let (a, b) = tokio::join!(a, b);
    let winners = [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count();
    assert_eq!(winners, 1);
}
