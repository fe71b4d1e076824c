//! Batch recovery sweep.

mod common;

use std::sync::Arc;
use std::time::Duration;

use certledger_core::{Confirmation, LogMetadata, TransactionStatus, UserId};
use certledger_mirror::RetryPolicy;
use certledger_store::TransactionLogStore;
use certledger_sync::{Reconciler, RecoverySweep, SweepOptions, SweepReport};
use chrono::Utc;

use common::{pending, scenario_tx, tx, wire, FakeMirror, FlakyStore, Reply};

fn sweep_for(store: &Arc<FlakyStore>, mirror: &Arc<FakeMirror>) -> RecoverySweep {
    let (dyn_store, dyn_mirror) = wire(store, mirror);
    let reconciler = Reconciler::new(Arc::clone(&dyn_store), dyn_mirror)
        .with_policy(RetryPolicy::new(3, Duration::from_millis(2000)));
    RecoverySweep::new(dyn_store, reconciler)
}

fn counts(synced: usize, failed: usize, skipped: usize) -> SweepReport {
    SweepReport {
        synced,
        failed,
        skipped,
    }
}

fn minutes_ago(minutes: i64) -> chrono::DateTime<Utc> {
    Utc::now() - chrono::Duration::minutes(minutes)
}

#[tokio::test(start_paused = true)]
async fn sweep_skips_records_younger_than_five_minutes() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let user = UserId::generate();

    store.insert(pending(tx(1), user)).await.unwrap();
    store.insert(pending(tx(2), user)).await.unwrap();
    store.insert(pending(tx(3), user)).await.unwrap();
    store.backdate(&tx(1), minutes_ago(10)).await;
    store.backdate(&tx(2), minutes_ago(4)).await;

    let report = sweep_for(&store, &mirror).retry_failed_transactions(50).await;

    assert_eq!(report, counts(1, 0, 0));
    assert_eq!(mirror.calls(), 1);
    assert_eq!(store.record(&tx(1)).await.status, TransactionStatus::Success);
    assert_eq!(store.record(&tx(2)).await.status, TransactionStatus::Pending);
    assert_eq!(store.record(&tx(3)).await.status, TransactionStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn sweep_counts_failures_and_continues() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(
        FakeMirror::always_success()
            .script_for(tx(2), vec![Reply::Missing])
            .script_for(tx(3), vec![Reply::Error]),
    );
    let user = UserId::generate();

    for n in 1..=4 {
        store.insert(pending(tx(n), user)).await.unwrap();
        store.backdate(&tx(n), minutes_ago(30)).await;
    }

    let report = sweep_for(&store, &mirror).retry_failed_transactions(50).await;

    assert_eq!(report, counts(2, 2, 0));
    assert_eq!(store.record(&tx(1)).await.status, TransactionStatus::Success);
    assert_eq!(store.record(&tx(2)).await.status, TransactionStatus::Pending);
    assert_eq!(store.record(&tx(3)).await.status, TransactionStatus::Pending);
    assert_eq!(store.record(&tx(4)).await.status, TransactionStatus::Success);

    let reconciled = store.record(&tx(4)).await;
    assert_eq!(reconciled.metadata.synced_from_mirror, Some(true));
    assert!(reconciled.metadata.synced_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn sweep_respects_limit_oldest_first() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let user = UserId::generate();

    for n in 1..=3 {
        store.insert(pending(tx(n), user)).await.unwrap();
        store
            .backdate(&tx(n), minutes_ago(10 + i64::from(n)))
            .await;
    }

    let report = sweep_for(&store, &mirror).retry_failed_transactions(2).await;

    assert_eq!(report.synced, 2);
    assert_eq!(store.record(&tx(3)).await.status, TransactionStatus::Success);
    assert_eq!(store.record(&tx(2)).await.status, TransactionStatus::Success);
    assert_eq!(store.record(&tx(1)).await.status, TransactionStatus::Pending);
}

#[tokio::test(start_paused = true)]
async fn failed_records_are_resynced_without_downgrade() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let user = UserId::generate();

    store.insert(pending(scenario_tx(), user)).await.unwrap();
    store
        .confirm(
            &scenario_tx(),
            &Confirmation {
                status: TransactionStatus::Failed,
                transaction_hash: None,
                metadata: LogMetadata::default(),
            },
        )
        .await
        .unwrap();
    store.backdate(&scenario_tx(), minutes_ago(20)).await;

    let report = sweep_for(&store, &mirror).retry_failed_transactions(10).await;

    assert_eq!(report, counts(0, 0, 1));
    assert_eq!(store.inner.len().await, 1);
    // Terminal records never change status.
    assert_eq!(
        store.record(&scenario_tx()).await.status,
        TransactionStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn concurrent_sweeps_converge_on_one_row() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::found_after(1, "SUCCESS"));
    let user = UserId::generate();

    store.insert(pending(scenario_tx(), user)).await.unwrap();
    store.backdate(&scenario_tx(), minutes_ago(15)).await;

    let first = sweep_for(&store, &mirror);
    let second = sweep_for(&store, &mirror);
    let (a, b) = tokio::join!(
        first.retry_failed_transactions(10),
        second.retry_failed_transactions(10)
    );

    assert_eq!(a, counts(1, 0, 0));
    assert_eq!(b, counts(1, 0, 0));
    assert_eq!(store.inner.len().await, 1);

    let record = store.record(&scenario_tx()).await;
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.transaction_hash.as_deref(), Some("abc123"));
}

#[tokio::test(start_paused = true)]
async fn sweep_survives_datastore_outage() {
    let store = Arc::new(FlakyStore::down());
    let mirror = Arc::new(FakeMirror::always_success());

    let report = sweep_for(&store, &mirror)
        .with_options(SweepOptions {
            min_age: Duration::from_secs(60),
            concurrency: 2,
        })
        .retry_failed_transactions(10)
        .await;

    assert_eq!(report, SweepReport::default());
    assert_eq!(mirror.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn settled_failures_do_not_crowd_out_pending_records() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let user = UserId::generate();

    let settled = Confirmation {
        status: TransactionStatus::Failed,
        transaction_hash: Some("def456".into()),
        metadata: LogMetadata {
            confirmed_from_mirror: Some(true),
            ..LogMetadata::default()
        },
    };
    for n in 1..=3 {
        store.insert(pending(tx(n), user)).await.unwrap();
        store.confirm(&tx(n), &settled).await.unwrap();
        store.backdate(&tx(n), minutes_ago(30)).await;
    }
    store.insert(pending(tx(4), user)).await.unwrap();
    store.backdate(&tx(4), minutes_ago(10)).await;

    let report = sweep_for(&store, &mirror).retry_failed_transactions(3).await;

    assert_eq!(report, counts(1, 0, 0));
    assert_eq!(mirror.calls(), 1);
    assert_eq!(store.record(&tx(4)).await.status, TransactionStatus::Success);
    for n in 1..=3 {
        assert_eq!(store.record(&tx(n)).await.status, TransactionStatus::Failed);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn sweep_runs_on_a_spawned_task() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());

    store
        .insert(pending(scenario_tx(), UserId::generate()))
        .await
        .unwrap();
    store.backdate(&scenario_tx(), minutes_ago(10)).await;

    let sweep = sweep_for(&store, &mirror);
    let report = tokio::spawn(async move { sweep.retry_failed_transactions(10).await })
        .await
        .unwrap();

    assert_eq!(report, counts(1, 0, 0));
    assert_eq!(
        store.record(&scenario_tx()).await.status,
        TransactionStatus::Success
    );
}
