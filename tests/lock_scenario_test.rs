//! End-to-end lock behaviour through a configured `Coordinator`.

use std::sync::Arc;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::time::Duration;

use cairn::AppConfig;
use cairn::CoordinationError;
use cairn::Coordinator;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_env_filter("cairn=debug").with_test_writer().try_init();
}

async fn coordinator() -> Coordinator {
    let config = AppConfig::from_toml_str(
        r#"
        [locks.jobs]
        auto_expire_ms = 200
        poll_interval_ms = 10
        "#,
    )
    .unwrap();
    Coordinator::connect(config).await.unwrap()
}

#[tokio::test]
async fn test_job_42_expiry_handover() {
    init_tracing();
    let coordinator = coordinator().await;
    let caller_a = coordinator.lock_manager("jobs");
    let caller_b = coordinator.lock_manager("jobs");

    let guard_a = caller_a.try_acquire("job-42").await.unwrap().expect("A acquires");
    assert!(caller_b.try_acquire("job-42").await.unwrap().is_none());

    tokio::time::sleep(Duration::from_millis(250)).await;

    let guard_b = caller_b.acquire("job-42", Some(Duration::from_secs(5))).await.unwrap();
    assert_ne!(guard_a.owner_id(), guard_b.owner_id());

    assert!(!guard_a.release().await.unwrap());
    assert!(guard_b.release().await.unwrap());
}

#[tokio::test]
async fn test_acquire_waits_for_release() {
    init_tracing();
    let coordinator = coordinator().await;
    let locks = coordinator.lock_manager("jobs");

    let guard = locks.try_acquire("job-7").await.unwrap().unwrap();
    let waiter = {
        let locks = locks.clone();
        tokio::spawn(async move { locks.acquire("job-7", Some(Duration::from_secs(2))).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(guard.release().await.unwrap());

    let second = waiter.await.unwrap().unwrap();
    assert!(second.release().await.unwrap());
}

#[tokio::test]
async fn test_acquire_timeout() {
    init_tracing();
    let coordinator = coordinator().await;
    let locks = coordinator.lock_manager("jobs");

    let _guard = locks.try_acquire("job-9").await.unwrap().unwrap();
    let err = locks.acquire("job-9", Some(Duration::from_millis(50))).await.unwrap_err();
    assert!(matches!(err, CoordinationError::Timeout { .. }));
}

#[tokio::test]
async fn test_with_lock_serialises_critical_sections() {
    init_tracing();
    let coordinator = coordinator().await;
    let locks = coordinator.lock_manager("jobs");
    let inside = Arc::new(AtomicU32::new(0));
    let max_inside = Arc::new(AtomicU32::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let locks = locks.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        tasks.push(tokio::spawn(async move {
            locks
                .with_lock("shared-resource", Some(Duration::from_secs(5)), || async move {
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await
        }));
    }

    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
}
