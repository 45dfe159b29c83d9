//! Confirmation orchestrator
//!
//! Drives a payment reference from submission to exactly one terminal
//! status: admit into the processed-signature registry, wait for the
//! signature to finalize on-chain, verify the payment with the trusted
//! backend, and publish the result to the caller and to every duplicate
//! watcher.
//!
//! Order of authority is strict: on-chain finality is necessary but not
//! sufficient. The backend verdict decides `paymentConfirmed`, except when
//! the backend is unreachable, in which case network finality alone is
//! accepted and reconciliation is deferred.

use crate::chain::{
    BlockhashConfig, BlockhashProvider, ChainClient, PollerConfig, StatusPoller,
    TransactionPreparer, TxSource,
};
use crate::errors::EngineError;
use crate::metrics::{metrics, Timer};
use crate::observability::FlowContext;
use crate::registry::{Admission, CompletionSlot, SignatureRegistry, TerminalWatch};
use crate::types::{
    ConfirmationRequest, FinalStatus, PaymentReference, StatusCallback, TransactionStatus,
    VerificationOutcome,
};
use crate::verifier::VerifyBackend;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Terminal error message for transactions that finalized with an
/// execution error.
pub const ON_CHAIN_FAILURE_MSG: &str = "Transaction failed on chain";

/// Terminal error message when the polling budget runs out. The transaction
/// may still finalize after we stop watching, so the user is directed to a
/// block explorer instead of being told the payment definitely failed.
pub const TIMEOUT_MSG: &str =
    "Transaction confirmation timed out. Please check a block explorer to verify whether the transaction landed.";

/// Terminal error message for flows cancelled before finalization.
pub const CANCELLED_MSG: &str = "Confirmation cancelled before the transaction finalized";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Pause between admission and the first status query, giving the
    /// network a moment to propagate the transaction
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

/// Handle to an in-flight confirmation
///
/// Cancellation is cooperative: it is honored only between poll attempts
/// and ignored once the flow has finalized, so a cancel racing the terminal
/// transition loses cleanly.
pub struct ConfirmationHandle {
    signature: String,
    cancel: Arc<AtomicBool>,
    watch: TerminalWatch,
}

impl ConfirmationHandle {
    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// Request cancellation of the polling phase
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Terminal status if already published
    pub fn current(&self) -> Option<TransactionStatus> {
        self.watch.current()
    }

    /// Wait for the single terminal status
    pub async fn wait(self) -> TransactionStatus {
        self.watch.wait().await
    }
}

/// The confirmation engine
///
/// Cheap to clone; all collaborators are shared behind `Arc`.
#[derive(Clone)]
pub struct ConfirmationEngine {
    poller: Arc<StatusPoller>,
    verifier: Arc<dyn VerifyBackend>,
    registry: Arc<SignatureRegistry>,
    blockhash: Arc<BlockhashProvider>,
    preparer: Arc<TransactionPreparer>,
    config: EngineConfig,
}

impl ConfirmationEngine {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        verifier: Arc<dyn VerifyBackend>,
        registry: Arc<SignatureRegistry>,
        blockhash_config: BlockhashConfig,
        poller_config: PollerConfig,
        config: EngineConfig,
    ) -> Self {
        let blockhash = Arc::new(BlockhashProvider::new(chain.clone(), blockhash_config));
        let poller = Arc::new(StatusPoller::new(chain, poller_config));
        let preparer = Arc::new(TransactionPreparer::new(blockhash.clone()));
        Self {
            poller,
            verifier,
            registry,
            blockhash,
            preparer,
            config,
        }
    }

    /// Shared blockhash provider, exposed for wallet integrations that sign
    /// against the same cached blockhash the preparer uses
    pub fn blockhash_provider(&self) -> Arc<BlockhashProvider> {
        self.blockhash.clone()
    }

    /// Build an unsigned transaction ready for wallet signing, with a fresh
    /// finalized blockhash
    pub async fn prepare_transaction(
        &self,
        source: TxSource,
        fee_payer: &Pubkey,
    ) -> Result<Transaction, EngineError> {
        self.preparer.prepare(source, fee_payer).await
    }

    /// Submit a payment reference for confirmation and return immediately.
    ///
    /// The flow runs as a detached task; `on_status` receives an initial
    /// processing update and exactly one terminal update. Duplicate
    /// submissions for an already-admitted signature never re-run the
    /// pipeline; they observe the original flow's terminal status.
    pub fn submit(&self, request: ConfirmationRequest, on_status: StatusCallback) -> ConfirmationHandle {
        let identifier = request.reference.identifier().to_string();

        if !request.reference.is_on_chain() {
            return self.resolve_non_chain(&request, on_status);
        }

        match self.registry.admit(&identifier) {
            Admission::Duplicate(watch) => {
                metrics().duplicates_short_circuited.inc();
                info!(signature = %identifier, "Duplicate submission, attaching to existing flow");
                let watcher = watch.clone();
                tokio::spawn(async move {
                    let terminal = watcher.wait().await;
                    on_status(terminal);
                });
                ConfirmationHandle {
                    signature: identifier,
                    // Duplicates cannot cancel the original flow.
                    cancel: Arc::new(AtomicBool::new(false)),
                    watch,
                }
            }
            Admission::Admitted(slot) => {
                let watch = slot.watch();
                let cancel = Arc::new(AtomicBool::new(false));
                let engine = self.clone();
                let task_cancel = cancel.clone();
                tokio::spawn(async move {
                    engine.run_confirmation(request, slot, on_status, task_cancel).await;
                });
                ConfirmationHandle {
                    signature: identifier,
                    cancel,
                    watch,
                }
            }
        }
    }

    /// Submit and wait for the terminal status
    pub async fn confirm(
        &self,
        request: ConfirmationRequest,
        on_status: StatusCallback,
    ) -> TransactionStatus {
        self.submit(request, on_status).wait().await
    }

    /// External receipts and free orders carry no on-chain transaction, so
    /// there is nothing to poll or guard against replay. They resolve
    /// immediately without touching the registry.
    fn resolve_non_chain(
        &self,
        request: &ConfirmationRequest,
        on_status: StatusCallback,
    ) -> ConfirmationHandle {
        let identifier = request.reference.identifier().to_string();
        metrics().non_chain_resolved.inc();
        match request.reference {
            PaymentReference::ExternalReceipt(_) => {
                info!(reference = %identifier, "External receipt accepted without chain confirmation")
            }
            PaymentReference::Free => {
                info!(order_id = ?request.order_id, "Free order accepted without payment")
            }
            PaymentReference::OnChain(_) => unreachable!("checked by caller"),
        }
        let terminal = TransactionStatus::confirmed(&identifier);
        on_status(terminal.clone());
        ConfirmationHandle {
            signature: identifier,
            cancel: Arc::new(AtomicBool::new(false)),
            watch: TerminalWatch::resolved(terminal),
        }
    }

    async fn run_confirmation(
        self,
        request: ConfirmationRequest,
        slot: CompletionSlot,
        on_status: StatusCallback,
        cancel: Arc<AtomicBool>,
    ) {
        let signature = slot.signature().to_string();
        let flow = FlowContext::new("confirm_payment");
        metrics().confirmations_total.inc();
        metrics().inflight_confirmations.inc();
        let timer = Timer::new();

        info!(
            signature = %signature,
            flow_id = %flow.flow_id,
            correlation_id = %flow.correlation_id,
            order_id = ?request.order_id,
            "Confirmation flow started"
        );
        on_status(TransactionStatus::processing(&signature));

        // Give the cluster a moment to propagate before the first query.
        if self.config.settle_delay_ms > 0 {
            sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
        }

        let terminal = match self
            .poller
            .poll_until_finalized_with_cancel(&signature, &cancel)
            .await
        {
            Ok(FinalStatus::FinalizedOk) => self.verify_finalized(&signature, &request).await,
            Ok(FinalStatus::FinalizedErr(chain_err)) => {
                warn!(signature = %signature, error = %chain_err, "Transaction failed on chain");
                metrics().confirmations_rejected.inc();
                TransactionStatus::failed(&signature, ON_CHAIN_FAILURE_MSG)
            }
            Ok(FinalStatus::Timeout) => {
                metrics().confirmations_timeout.inc();
                TransactionStatus::failed(&signature, TIMEOUT_MSG)
            }
            Err(EngineError::Cancelled) => {
                info!(signature = %signature, "Confirmation cancelled");
                TransactionStatus::failed(&signature, CANCELLED_MSG)
            }
            Err(e) => {
                warn!(signature = %signature, error = %e, "Confirmation aborted");
                TransactionStatus::failed(&signature, e.to_string())
            }
        };

        timer.observe_duration(&metrics().confirm_latency);
        metrics().inflight_confirmations.dec();
        info!(
            signature = %signature,
            flow_id = %flow.flow_id,
            success = terminal.success,
            duration_secs = timer.elapsed_secs(),
            "Confirmation flow finished"
        );

        // Publish to duplicate watchers first, then the submitting caller.
        slot.complete(terminal.clone());
        on_status(terminal);
    }

    /// Backend verification, invoked at most once per signature and only
    /// after on-chain finality.
    async fn verify_finalized(
        &self,
        signature: &str,
        request: &ConfirmationRequest,
    ) -> TransactionStatus {
        let timer = Timer::new();
        let outcome = self
            .verifier
            .verify(signature, request.expected.as_ref(), request.order_id.as_deref())
            .await;
        timer.observe_duration(&metrics().verify_latency);

        match outcome {
            Ok(VerificationOutcome::Verified) => {
                metrics().confirmations_success.inc();
                TransactionStatus::confirmed(signature)
            }
            Ok(VerificationOutcome::TemporarilyApproved { warning }) => {
                warn!(signature = %signature, warning = %warning, "Payment approved pending reconciliation");
                metrics().confirmations_success.inc();
                TransactionStatus::confirmed(signature)
            }
            Ok(VerificationOutcome::DelegateUnavailable) => {
                warn!(
                    signature = %signature,
                    "Verification backend unavailable, accepting network confirmation"
                );
                metrics().delegate_unavailable_total.inc();
                metrics().confirmations_success.inc();
                TransactionStatus::confirmed(signature)
            }
            Ok(VerificationOutcome::Rejected { reason }) => {
                warn!(signature = %signature, reason = %reason, "Payment rejected by backend");
                metrics().confirmations_rejected.inc();
                TransactionStatus::failed(signature, reason)
            }
            Err(e) => {
                warn!(signature = %signature, error = %e, "Payment verification failed hard");
                metrics().confirmations_rejected.inc();
                TransactionStatus::failed(signature, format!("Payment verification failed: {e}"))
            }
        }
    }
}
