use batchpay::EngineConfig;
use batchpay::domain::money::Balance;
use rust_decimal_macros::dec;
use std::time::Duration;

mod common;
use common::{engine_with_ledger, request};

#[tokio::test]
async fn test_stats_track_totals_and_queue() {
    let (engine, ledger) = engine_with_ledger(EngineConfig::default());
    ledger.set_balance("A", "XAU", Balance::new(dec!(1000))).await;

    for _ in 0..3 {
        engine.submit(request("A", "B", dec!(10))).await.unwrap();
    }

    let before = engine.stats().await.unwrap();
    assert_eq!(before.total_transactions, 3);
    assert_eq!(before.queue_length, 3);
    assert_eq!(before.pending_transactions, 3);

    engine.dispatcher().run_tick().await.unwrap();

    let after = engine.stats().await.unwrap();
    assert_eq!(after.total_transactions, 3);
    assert_eq!(after.queue_length, 0);
    assert!(after.current_tps >= 3.0);
    assert!(after.max_tps >= 3.0);
}

#[tokio::test]
async fn test_success_rate_reflects_failures() {
    let (engine, ledger) = engine_with_ledger(EngineConfig::default());
    ledger.set_balance("A", "XAU", Balance::new(dec!(100))).await;

    // One covered transfer and one that exceeds the remaining balance.
    engine.submit(request("A", "B", dec!(100))).await.unwrap();
    engine.submit(request("A", "C", dec!(100))).await.unwrap();
    engine.dispatcher().run_tick().await.unwrap();

    assert_eq!(engine.metrics().success_rate(), 50.0);
    let (submitted, completed, failed) = engine.metrics().totals();
    assert_eq!((submitted, completed, failed), (2, 1, 1));
}

#[tokio::test]
async fn test_snapshot_loop_persists_samples() {
    let mut config = EngineConfig::default()
        .with_dispatch_interval(Duration::from_millis(10))
        .with_seed_balance(dec!(1000));
    config.metrics_interval = Duration::from_millis(50);
    let (engine, _ledger) = engine_with_ledger(config);

    let handle = engine.start();
    engine.submit(request("A", "B", dec!(10))).await.unwrap();

    // A couple of snapshot intervals.
    tokio::time::sleep(Duration::from_millis(160)).await;
    handle.shutdown().await;

    let report = engine.performance_metrics(1).await.unwrap();
    assert!(!report.samples.is_empty());
    assert_eq!(report.queue_length, 0);

    // Samples are append-only and inside the requested window.
    let cutoff = batchpay::domain::transaction::now_millis() - 3_600_000;
    assert!(report.samples.iter().all(|s| s.timestamp_bucket >= cutoff));
}

#[tokio::test]
async fn test_performance_metrics_accepts_huge_window() {
    let (engine, _ledger) = engine_with_ledger(EngineConfig::default());

    // An absurd window saturates to "everything" instead of overflowing.
    let report = engine.performance_metrics(u64::MAX).await.unwrap();
    assert!(report.samples.is_empty());
    assert_eq!(report.queue_length, 0);
}

#[tokio::test]
async fn test_average_processing_time_reported() {
    let (engine, ledger) = engine_with_ledger(EngineConfig::default());
    ledger.set_balance("A", "XAU", Balance::new(dec!(1000))).await;

    engine.submit(request("A", "B", dec!(1))).await.unwrap();
    engine.dispatcher().run_tick().await.unwrap();

    // In-memory execution is fast; the view just has to be non-negative and
    // consistent with a processed item.
    assert!(engine.metrics().average_processing_time() >= 0.0);
    let (_, completed, _) = engine.metrics().totals();
    assert_eq!(completed, 1);
}
