//! End-to-end confirmation flow scenarios
//!
//! The engine runs against scripted chain and verifier mocks under the
//! paused tokio clock, so polling schedules play out instantly.

use chainpay::chain::{BlockhashConfig, PollerConfig};
use chainpay::engine::{
    ConfirmationEngine, EngineConfig, CANCELLED_MSG, ON_CHAIN_FAILURE_MSG,
};
use chainpay::registry::SignatureRegistry;
use chainpay::test_utils::{MockChainClient, MockVerifier, StatusRecorder};
use chainpay::types::{
    ConfirmationRequest, ExpectedDetails, PaymentReference, VerificationOutcome,
};
use std::sync::Arc;

struct Harness {
    chain: Arc<MockChainClient>,
    verifier: Arc<MockVerifier>,
    registry: Arc<SignatureRegistry>,
    engine: ConfirmationEngine,
}

fn harness(verifier: MockVerifier) -> Harness {
    harness_with_poller(verifier, PollerConfig::default())
}

fn harness_with_poller(verifier: MockVerifier, poller: PollerConfig) -> Harness {
    let chain = Arc::new(MockChainClient::new());
    let verifier = Arc::new(verifier);
    let registry = Arc::new(SignatureRegistry::new());
    let engine = ConfirmationEngine::new(
        chain.clone(),
        verifier.clone(),
        registry.clone(),
        BlockhashConfig::default(),
        poller,
        EngineConfig {
            settle_delay_ms: 1000,
        },
    );
    Harness {
        chain,
        verifier,
        registry,
        engine,
    }
}

fn request(signature: &str) -> ConfirmationRequest {
    ConfirmationRequest::new(PaymentReference::OnChain(signature.to_string()))
        .with_order_id("order-1")
        .with_expected(ExpectedDetails {
            amount_lamports: 5_000_000,
            buyer: "Buyer1111111111111111111111111111111111111".to_string(),
            recipient: "Merch1111111111111111111111111111111111111".to_string(),
        })
}

#[tokio::test(start_paused = true)]
async fn verified_payment_confirms() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));
    h.chain.finalized_ok_after(2);

    let recorder = StatusRecorder::new();
    let terminal = h.engine.confirm(request("SIG_OK"), recorder.callback()).await;

    assert!(terminal.success);
    assert!(terminal.payment_confirmed);
    assert!(!terminal.processing);
    assert_eq!(terminal.signature, "SIG_OK");
    assert_eq!(h.verifier.call_count(), 1);

    // Initial processing update precedes the terminal update.
    let updates = recorder.updates();
    assert!(updates.first().map(|s| s.processing).unwrap_or(false));
    assert_eq!(recorder.terminal_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn on_chain_failure_never_reaches_verifier() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));
    h.chain.finalized_err_after(1, "InstructionError(0, Custom(1))");

    let recorder = StatusRecorder::new();
    let terminal = h
        .engine
        .confirm(request("SIG_FAIL"), recorder.callback())
        .await;

    assert!(!terminal.success);
    assert!(!terminal.payment_confirmed);
    assert_eq!(terminal.error.as_deref(), Some(ON_CHAIN_FAILURE_MSG));
    assert_eq!(h.verifier.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn polling_timeout_directs_to_explorer() {
    let poller = PollerConfig {
        max_retries: 5,
        ..PollerConfig::default()
    };
    let h = harness_with_poller(
        MockVerifier::returning(VerificationOutcome::Verified),
        poller,
    );
    // Status queue stays empty: every poll reports the signature unseen.

    let recorder = StatusRecorder::new();
    let terminal = h
        .engine
        .confirm(request("SIG_SLOW"), recorder.callback())
        .await;

    assert!(!terminal.success);
    let error = terminal.error.unwrap_or_default();
    assert!(error.contains("timed out"), "unexpected message: {error}");
    assert!(error.contains("block explorer"), "unexpected message: {error}");
    assert_eq!(h.verifier.call_count(), 0);
    assert_eq!(h.chain.status_call_count(), 5);
}

#[tokio::test(start_paused = true)]
async fn backend_rejection_fails_despite_finality() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Rejected {
        reason: "amount mismatch".to_string(),
    }));
    h.chain.finalized_ok_after(0);

    let terminal = h
        .engine
        .confirm(request("SIG_BAD"), chainpay::types::noop_status_callback())
        .await;

    assert!(!terminal.success);
    assert!(!terminal.payment_confirmed);
    assert_eq!(terminal.error.as_deref(), Some("amount mismatch"));
    assert_eq!(h.verifier.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn unavailable_backend_accepts_network_confirmation() {
    let h = harness(MockVerifier::returning(
        VerificationOutcome::DelegateUnavailable,
    ));
    h.chain.finalized_ok_after(0);

    let terminal = h
        .engine
        .confirm(request("SIG_OK"), chainpay::types::noop_status_callback())
        .await;

    assert!(terminal.success);
    assert!(terminal.payment_confirmed);
    assert_eq!(h.verifier.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn temp_approved_counts_as_confirmed() {
    let h = harness(MockVerifier::returning(
        VerificationOutcome::TemporarilyApproved {
            warning: "queued for reconciliation".to_string(),
        },
    ));
    h.chain.finalized_ok_after(0);

    let terminal = h
        .engine
        .confirm(request("SIG_OK"), chainpay::types::noop_status_callback())
        .await;

    assert!(terminal.success);
    assert!(terminal.payment_confirmed);
}

#[tokio::test(start_paused = true)]
async fn duplicate_submissions_run_pipeline_once() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));
    h.chain.finalized_ok_after(3);

    let first_recorder = StatusRecorder::new();
    let second_recorder = StatusRecorder::new();

    let first = h.engine.submit(request("SIG_DUP"), first_recorder.callback());
    let second = h
        .engine
        .submit(request("SIG_DUP"), second_recorder.callback());

    let (a, b) = tokio::join!(first.wait(), second.wait());

    assert!(a.success);
    assert_eq!(a, b);
    // The pipeline ran once: one verification, one polling sequence.
    assert_eq!(h.verifier.call_count(), 1);
    assert_eq!(h.chain.status_call_count(), 4);
    assert_eq!(h.registry.len(), 1);

    // The duplicate receives the terminal status through its callback too.
    // The paused clock only advances once every task is idle, so this sleep
    // guarantees the watcher task has delivered.
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    assert_eq!(second_recorder.terminal_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn resubmission_after_completion_short_circuits() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));
    h.chain.finalized_ok_after(0);

    let first = h
        .engine
        .confirm(request("SIG_ONCE"), chainpay::types::noop_status_callback())
        .await;
    assert!(first.success);

    let again = h
        .engine
        .confirm(request("SIG_ONCE"), chainpay::types::noop_status_callback())
        .await;

    assert_eq!(first, again);
    assert_eq!(h.verifier.call_count(), 1);
    assert_eq!(h.chain.status_call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn external_receipt_resolves_without_chain_access() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));

    let recorder = StatusRecorder::new();
    let terminal = h
        .engine
        .confirm(
            ConfirmationRequest::new(PaymentReference::from_raw("pi_3abc")),
            recorder.callback(),
        )
        .await;

    assert!(terminal.success);
    assert!(terminal.payment_confirmed);
    assert_eq!(terminal.signature, "pi_3abc");
    assert_eq!(h.chain.status_call_count(), 0);
    assert_eq!(h.verifier.call_count(), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn free_order_resolves_immediately() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));

    let terminal = h
        .engine
        .confirm(
            ConfirmationRequest::new(PaymentReference::Free).with_order_id("order-free"),
            chainpay::types::noop_status_callback(),
        )
        .await;

    assert!(terminal.success);
    assert_eq!(h.chain.status_call_count(), 0);
    assert!(h.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn distinct_free_orders_do_not_collide() {
    let h = harness(MockVerifier::returning(VerificationOutcome::Verified));

    let a = h
        .engine
        .confirm(
            ConfirmationRequest::new(PaymentReference::Free).with_order_id("order-a"),
            chainpay::types::noop_status_callback(),
        )
        .await;
    let b = h
        .engine
        .confirm(
            ConfirmationRequest::new(PaymentReference::Free).with_order_id("order-b"),
            chainpay::types::noop_status_callback(),
        )
        .await;

    assert!(a.success);
    assert!(b.success);
    // Free orders never enter the registry, so nothing short-circuits.
    assert!(h.registry.is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_finality_fails_the_flow() {
    let poller = PollerConfig {
        max_retries: 30,
        ..PollerConfig::default()
    };
    let h = harness_with_poller(
        MockVerifier::returning(VerificationOutcome::Verified),
        poller,
    );
    // Signature stays unseen forever.

    let handle = h
        .engine
        .submit(request("SIG_CANCEL"), chainpay::types::noop_status_callback());

    // Let a few poll attempts pass, then cancel.
    tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    handle.cancel();

    let handle = h
        .engine
        .submit(request("SIG_CANCEL"), chainpay::types::noop_status_callback());
    let terminal = handle.wait().await;

    assert!(!terminal.success);
    assert_eq!(terminal.error.as_deref(), Some(CANCELLED_MSG));
    assert_eq!(h.verifier.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn verifier_hard_error_fails_the_payment() {
    let h = harness(MockVerifier::failing(
        chainpay::errors::EngineError::DelegateHttp {
            status: 500,
            body: "internal error".to_string(),
        },
    ));
    h.chain.finalized_ok_after(0);

    let terminal = h
        .engine
        .confirm(request("SIG_OK"), chainpay::types::noop_status_callback())
        .await;

    assert!(!terminal.success);
    assert!(terminal
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("verification failed"));
    assert_eq!(h.verifier.call_count(), 1);
}
