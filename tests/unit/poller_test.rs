//! Status poller tests
//!
//! Timing-sensitive tests run with the paused tokio clock so backoff sleeps
//! auto-advance instead of burning wall time.

use chainpay::chain::{PollerConfig, SignatureStatusSnapshot, StatusPoller, TransactionRecord};
use chainpay::errors::EngineError;
use chainpay::test_utils::MockChainClient;
use chainpay::types::{ChainCommitment, FinalStatus};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn poller_over(mock: Arc<MockChainClient>, max_retries: u32) -> StatusPoller {
    let config = PollerConfig {
        max_retries,
        initial_delay_ms: 1000,
        max_delay_ms: 10_000,
        jitter_ms: 1000,
        corroborate: true,
    };
    StatusPoller::new(mock, config)
}

fn snapshot(commitment: ChainCommitment, err: Option<&str>) -> SignatureStatusSnapshot {
    SignatureStatusSnapshot {
        commitment,
        err: err.map(|e| e.to_string()),
    }
}

#[tokio::test(start_paused = true)]
async fn finalizes_after_several_unseen_polls() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Ok(None));
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Processed, None))));
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Confirmed, None))));
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));

    let poller = poller_over(mock.clone(), 30);
    let status = poller.poll_until_finalized("SIG_OK").await.unwrap();

    assert_eq!(status, FinalStatus::FinalizedOk);
    assert_eq!(mock.status_call_count(), 4);
    // Finalized status corroborated against the full record.
    assert_eq!(mock.record_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn finalized_with_error_stops_immediately() {
    let mock = Arc::new(MockChainClient::new());
    mock.finalized_err_after(2, "InstructionError(0, Custom(1))");

    let poller = poller_over(mock.clone(), 30);
    let status = poller.poll_until_finalized("SIG_FAIL").await.unwrap();

    assert_eq!(
        status,
        FinalStatus::FinalizedErr("InstructionError(0, Custom(1))".to_string())
    );
    assert_eq!(mock.status_call_count(), 3);
    // An errored status needs no corroboration.
    assert_eq!(mock.record_call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_is_timeout_not_error() {
    let mock = Arc::new(MockChainClient::new());

    let poller = poller_over(mock.clone(), 5);
    let status = poller.poll_until_finalized("SIG_SLOW").await.unwrap();

    assert_eq!(status, FinalStatus::Timeout);
    assert_eq!(mock.status_call_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn transient_query_errors_count_as_attempts() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Err(EngineError::rpc("connection reset")));
    mock.push_status(Err(EngineError::rpc("connection reset")));
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));

    let poller = poller_over(mock.clone(), 30);
    let status = poller.poll_until_finalized("SIG_OK").await.unwrap();

    assert_eq!(status, FinalStatus::FinalizedOk);
    assert_eq!(mock.status_call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn transient_error_on_last_attempt_propagates() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Err(EngineError::rpc("connection reset")));

    let poller = poller_over(mock, 1);
    let err = poller.poll_until_finalized("SIG_OK").await.unwrap_err();

    assert!(matches!(err, EngineError::Rpc(_)));
}

#[tokio::test(start_paused = true)]
async fn missing_record_fails_corroboration() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));
    mock.push_record(Ok(TransactionRecord::Missing));

    let poller = poller_over(mock, 30);
    let status = poller.poll_until_finalized("SIG_GHOST").await.unwrap();

    assert!(matches!(status, FinalStatus::FinalizedErr(_)));
}

#[tokio::test(start_paused = true)]
async fn errored_record_overrides_clean_status() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));
    mock.push_record(Ok(TransactionRecord::Present {
        err: Some("InstructionError(1, Custom(6000))".to_string()),
    }));

    let poller = poller_over(mock, 30);
    let status = poller.poll_until_finalized("SIG_BADREC").await.unwrap();

    assert_eq!(
        status,
        FinalStatus::FinalizedErr("InstructionError(1, Custom(6000))".to_string())
    );
}

#[tokio::test(start_paused = true)]
async fn transient_corroboration_failure_burns_attempt_and_retries() {
    let mock = Arc::new(MockChainClient::new());
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));
    mock.push_record(Err(EngineError::rpc("gateway timeout")));
    mock.push_status(Ok(Some(snapshot(ChainCommitment::Finalized, None))));
    mock.push_record(Ok(TransactionRecord::Present { err: None }));

    let poller = poller_over(mock.clone(), 30);
    let status = poller.poll_until_finalized("SIG_OK").await.unwrap();

    assert_eq!(status, FinalStatus::FinalizedOk);
    assert_eq!(mock.status_call_count(), 2);
    assert_eq!(mock.record_call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_between_attempts() {
    let mock = Arc::new(MockChainClient::new());

    let poller = Arc::new(poller_over(mock.clone(), 30));
    let cancel = Arc::new(AtomicBool::new(false));

    let task_poller = poller.clone();
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        task_poller
            .poll_until_finalized_with_cancel("SIG_SLOW", &task_cancel)
            .await
    });

    // Let a few attempts run, then cancel.
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    cancel.store(true, Ordering::Release);

    let result = task.await.unwrap();
    assert!(matches!(result, Err(EngineError::Cancelled)));
    assert!(mock.status_call_count() < 30);
}
