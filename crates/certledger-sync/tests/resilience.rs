//! Reconciler and resilient executor behaviour under mirror lag and datastore
//! failures. Time is paused, so multi-second polling budgets run instantly.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use certledger_core::{
    AccountId, LogMetadata, TransactionId, TransactionSource, TransactionStatus, TransactionType,
    UserId,
};
use certledger_mirror::{MirrorQuery, RetryPolicy};
use certledger_store::TransactionLogStore;
use certledger_sync::{
    ExecuteOptions, ExecutionIssue, Reconciler, ResilientExecutor, SubmissionError,
};

use common::{scenario_tx, wire, FakeMirror, FlakyStore};

fn submit_ok(
    id: TransactionId,
) -> impl FnOnce() -> std::future::Ready<Result<TransactionId, SubmissionError>> + Send {
    move || std::future::ready(Ok(id))
}

fn submit_err(
    error: SubmissionError,
) -> impl FnOnce() -> std::future::Ready<Result<TransactionId, SubmissionError>> + Send {
    move || std::future::ready(Err(error))
}

// ============================================================================
// Mirror polling
// ============================================================================

#[tokio::test(start_paused = true)]
async fn wait_returns_record_after_n_misses() {
    let mirror = FakeMirror::found_after(3, "SUCCESS");

    let found = mirror
        .wait_for_transaction(&scenario_tx(), RetryPolicy::default())
        .await;

    assert!(found.is_some());
    assert_eq!(mirror.calls(), 4);
}

#[tokio::test(start_paused = true)]
async fn wait_exhausts_with_fixed_spacing() {
    let mirror = FakeMirror::never();
    let policy = RetryPolicy::default();

    let found = mirror.wait_for_transaction(&scenario_tx(), policy).await;

    assert!(found.is_none());
    assert_eq!(mirror.calls(), 10);

    let times = mirror.call_times();
    for pair in times.windows(2) {
        assert!(pair[1] - pair[0] >= policy.retry_delay);
    }
    // No trailing sleep after the last attempt.
    let elapsed = times[9] - times[0];
    assert!(elapsed >= policy.total_delay());
    assert!(elapsed < policy.total_delay() + policy.retry_delay);
}

// ============================================================================
// Reconciler
// ============================================================================

#[tokio::test(start_paused = true)]
async fn reconciler_inserts_terminal_record_from_mirror() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::found_after(2, "SUCCESS"));
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);
    let user = UserId::generate();

    let synced = reconciler
        .sync(
            &scenario_tx(),
            user,
            &TransactionType::TokenMint,
            LogMetadata::default(),
        )
        .await;

    assert!(synced);
    assert_eq!(mirror.calls(), 3);

    let record = store.record(&scenario_tx()).await;
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.transaction_hash.as_deref(), Some("abc123"));
    assert_eq!(record.user_id, user);
    assert_eq!(record.metadata.synced_from_mirror, Some(true));
    assert!(record.metadata.synced_at.is_some());
    assert_eq!(
        record.metadata.consensus_timestamp.as_deref(),
        Some("1700000005.000000000")
    );
}

#[tokio::test(start_paused = true)]
async fn reconciler_is_idempotent() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);
    let user = UserId::generate();

    for _ in 0..2 {
        assert!(
            reconciler
                .sync(
                    &scenario_tx(),
                    user,
                    &TransactionType::TokenMint,
                    LogMetadata::default()
                )
                .await
        );
    }

    assert_eq!(store.inner.len().await, 1);
    assert_eq!(store.guarded_inserts.load(Ordering::SeqCst), 1);
    // The second call short-circuits on the existence check.
    assert_eq!(mirror.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_syncs_leave_one_row() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::found_after(1, "SUCCESS"));
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);
    let user = UserId::generate();
    let tx_a = scenario_tx();
    let tx_b = scenario_tx();

    let (a, b) = tokio::join!(
        reconciler.sync(
            &tx_a,
            user,
            &TransactionType::TokenMint,
            LogMetadata::default()
        ),
        reconciler.sync(
            &tx_b,
            user,
            &TransactionType::TokenMint,
            LogMetadata::default()
        ),
    );

    assert!(a && b);
    assert_eq!(store.inner.len().await, 1);
}

#[tokio::test(start_paused = true)]
async fn reconciler_gives_up_after_budget() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::never());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);

    let synced = reconciler
        .sync(
            &scenario_tx(),
            UserId::generate(),
            &TransactionType::TopicMessageSubmit,
            LogMetadata::default(),
        )
        .await;

    assert!(!synced);
    assert_eq!(mirror.calls(), 15);
    assert!(store.inner.is_empty().await);
}

#[tokio::test(start_paused = true)]
async fn reconciler_records_failed_result() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::found_after(0, "INSUFFICIENT_PAYER_BALANCE"));
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);

    assert!(
        reconciler
            .sync(
                &scenario_tx(),
                UserId::generate(),
                &TransactionType::TokenAssociate,
                LogMetadata::default()
            )
            .await
    );
    assert_eq!(
        store.record(&scenario_tx()).await.status,
        TransactionStatus::Failed
    );
}

#[tokio::test(start_paused = true)]
async fn reconciler_reports_false_when_datastore_is_down() {
    let store = Arc::new(FlakyStore::down());
    let mirror = Arc::new(FakeMirror::always_success());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let reconciler = Reconciler::new(dyn_store, dyn_mirror);

    let synced = reconciler
        .sync(
            &scenario_tx(),
            UserId::generate(),
            &TransactionType::TokenMint,
            LogMetadata::default(),
        )
        .await;

    assert!(!synced);
}

// ============================================================================
// Resilient executor
// ============================================================================

#[tokio::test(start_paused = true)]
async fn direct_write_then_async_confirmation() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::found_after(1, "SUCCESS"));
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TokenMint,
            submit_ok(scenario_tx()),
            ExecuteOptions::default(),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.transaction_id, Some(scenario_tx()));
    assert!(result.error.is_none());
    assert!(!result.synced_from_mirror);

    // Visible immediately, still pending.
    let record = store.record(&scenario_tx()).await;
    assert_eq!(record.status, TransactionStatus::Pending);
    assert_eq!(record.metadata.source, Some(TransactionSource::Dapp));
    assert!(record.metadata.executed_at.is_some());
    assert_eq!(mirror.calls(), 0);

    // 5s delay plus one miss and one hit.
    tokio::time::sleep(Duration::from_secs(10)).await;

    let record = store.record(&scenario_tx()).await;
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.metadata.confirmed_from_mirror, Some(true));
    assert_eq!(record.transaction_hash.as_deref(), Some("abc123"));
    assert_eq!(mirror.calls(), 2);
    assert!(executor.confirmations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unconfirmed_transaction_stays_pending() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::never());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TokenMint,
            submit_ok(scenario_tx()),
            ExecuteOptions::default(),
        )
        .await;
    assert!(result.is_logged());

    tokio::time::sleep(Duration::from_secs(60)).await;

    assert_eq!(mirror.calls(), 5);
    assert_eq!(
        store.record(&scenario_tx()).await.status,
        TransactionStatus::Pending
    );
}

#[tokio::test(start_paused = true)]
async fn submission_failure_logs_nothing() {
    let store = Arc::new(FlakyStore::new());
    let mirror = Arc::new(FakeMirror::always_success());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TokenCreate,
            submit_err(SubmissionError::Precheck("INVALID_SIGNATURE".into())),
            ExecuteOptions::default(),
        )
        .await;

    assert!(!result.success);
    assert!(result.transaction_id.is_none());
    let error = result.error.expect("error");
    assert!(error.is_fatal());
    assert_eq!(
        error,
        ExecutionIssue::Submission(SubmissionError::Precheck("INVALID_SIGNATURE".into()))
    );
    assert!(store.inner.is_empty().await);
    assert!(executor.confirmations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_direct_write_falls_back_to_mirror() {
    let store = Arc::new(FlakyStore::failing_inserts());
    let mirror = Arc::new(FakeMirror::found_after(2, "SUCCESS"));
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TokenMint,
            submit_ok(scenario_tx()),
            ExecuteOptions::wallet(AccountId::new(0, 0, 4242)),
        )
        .await;

    assert!(result.success);
    assert!(result.synced_from_mirror);
    assert!(result.error.is_none());

    let record = store.record(&scenario_tx()).await;
    assert_eq!(record.status, TransactionStatus::Success);
    assert_eq!(record.metadata.synced_from_mirror, Some(true));
    assert_eq!(record.metadata.source, Some(TransactionSource::DappWallet));
    assert_eq!(
        record.metadata.signer_account_id,
        Some(AccountId::new(0, 0, 4242))
    );
    // Fallback path does not schedule a confirmation.
    assert!(executor.confirmations().is_empty());
}

#[tokio::test(start_paused = true)]
async fn exhausted_fallback_still_reports_ledger_success() {
    let store = Arc::new(FlakyStore::failing_inserts());
    let mirror = Arc::new(FakeMirror::never());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TopicMessageSubmit,
            submit_ok(scenario_tx()),
            ExecuteOptions::default(),
        )
        .await;

    assert!(result.success);
    assert_eq!(result.transaction_id, Some(scenario_tx()));
    assert!(!result.synced_from_mirror);
    assert_eq!(result.error, Some(ExecutionIssue::LoggingFailed));
    assert_eq!(
        result.error.unwrap().to_string(),
        "executed but logging failed"
    );
}

#[tokio::test(start_paused = true)]
async fn disabled_backup_skips_fallback_and_confirmation() {
    let store = Arc::new(FlakyStore::failing_inserts());
    let mirror = Arc::new(FakeMirror::always_success());
    let (dyn_store, dyn_mirror) = wire(&store, &mirror);
    let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

    let options = ExecuteOptions {
        enable_mirror_backup: false,
        ..ExecuteOptions::default()
    };
    let result = executor
        .execute(
            UserId::generate(),
            TransactionType::TokenMint,
            submit_ok(scenario_tx()),
            options,
        )
        .await;

    assert!(result.success);
    assert_eq!(result.error, Some(ExecutionIssue::LoggingFailed));
    assert_eq!(mirror.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn fallback_flag_matches_reconciliation_outcome() {
    for (mirror, expect_synced) in [
        (FakeMirror::always_success(), true),
        (FakeMirror::never(), false),
    ] {
        let store = Arc::new(FlakyStore::failing_inserts());
        let mirror = Arc::new(mirror);
        let (dyn_store, dyn_mirror) = wire(&store, &mirror);
        let executor = ResilientExecutor::new(dyn_store, dyn_mirror);

        let result = executor
            .execute(
                UserId::generate(),
                TransactionType::TokenMint,
                submit_ok(scenario_tx()),
                ExecuteOptions::default(),
            )
            .await;

        assert!(result.success);
        assert_eq!(result.synced_from_mirror, expect_synced);
        assert_eq!(
            store.inner.exists(&scenario_tx()).await.unwrap(),
            expect_synced
        );
    }
}
