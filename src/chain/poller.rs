//! Signature status poller
//!
//! Polls the network for the confirmation status of a submitted signature
//! until it finalizes, fails on-chain, or the retry budget runs out.
//!
//! Per-attempt state machine:
//! 1. Query status (single-signature batch, history search on).
//! 2. Absent or below finalized commitment: schedule next attempt.
//! 3. Finalized with an execution error: `FinalizedErr`, stop immediately.
//! 4. Finalized clean: optionally corroborate via the full transaction
//!    record, then `FinalizedOk`.
//! 5. Query-level transient error: counts as a failed attempt; propagated
//!    only if it was the last allowed attempt.
//!
//! `Timeout` is a distinct outcome, not an error: the transaction may still
//! finalize after we stop watching, so the caller must direct the user to a
//! block explorer rather than claim definite failure.

use crate::chain::client::{ChainClient, TransactionRecord};
use crate::errors::EngineError;
use crate::metrics::metrics;
use crate::retry::PollBackoff;
use crate::types::{ChainCommitment, ConfirmationAttempt, FinalStatus};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    /// Corroborate a clean finalized status with a full transaction lookup
    /// before declaring success
    #[serde(default = "default_corroborate")]
    pub corroborate: bool,
}

fn default_max_retries() -> u32 {
    30
}
fn default_initial_delay_ms() -> u64 {
    1_000
}
fn default_max_delay_ms() -> u64 {
    10_000
}
fn default_jitter_ms() -> u64 {
    1_000
}
fn default_corroborate() -> bool {
    true
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_ms: default_jitter_ms(),
            corroborate: default_corroborate(),
        }
    }
}

pub struct StatusPoller {
    client: Arc<dyn ChainClient>,
    config: PollerConfig,
    backoff: PollBackoff,
}

impl StatusPoller {
    pub fn new(client: Arc<dyn ChainClient>, config: PollerConfig) -> Self {
        let backoff = PollBackoff::new(
            config.initial_delay_ms,
            config.max_delay_ms,
            config.jitter_ms,
        );
        Self {
            client,
            config,
            backoff,
        }
    }

    /// Poll until the signature reaches a terminal chain state or the
    /// attempt budget is exhausted.
    pub async fn poll_until_finalized(
        &self,
        signature: &str,
    ) -> Result<FinalStatus, EngineError> {
        self.poll_inner(signature, None).await
    }

    /// Like [`Self::poll_until_finalized`], honoring a cancellation flag
    /// between attempts. Cancellation cannot interrupt an attempt already
    /// in flight.
    pub async fn poll_until_finalized_with_cancel(
        &self,
        signature: &str,
        cancel: &AtomicBool,
    ) -> Result<FinalStatus, EngineError> {
        self.poll_inner(signature, Some(cancel)).await
    }

    async fn poll_inner(
        &self,
        signature: &str,
        cancel: Option<&AtomicBool>,
    ) -> Result<FinalStatus, EngineError> {
        for attempt in 0..self.config.max_retries {
            if let Some(flag) = cancel {
                if flag.load(Ordering::Acquire) {
                    return Err(EngineError::Cancelled);
                }
            }

            let last_attempt = attempt + 1 == self.config.max_retries;

            match self.client.signature_status(signature).await {
                Ok(Some(snapshot)) if snapshot.commitment == ChainCommitment::Finalized => {
                    if let Some(chain_err) = snapshot.err {
                        info!(signature, error = %chain_err, "Transaction finalized with error");
                        metrics().poll_attempts.observe((attempt + 1) as f64);
                        return Ok(FinalStatus::FinalizedErr(chain_err));
                    }
                    match self.corroborate(signature, last_attempt).await? {
                        Some(final_status) => {
                            metrics().poll_attempts.observe((attempt + 1) as f64);
                            return Ok(final_status);
                        }
                        // Corroboration hit a transient fault; burn the
                        // attempt and poll again.
                        None => {
                            let cycle = ConfirmationAttempt::new(
                                attempt,
                                ChainCommitment::Finalized,
                                Some("corroboration query failed".to_string()),
                            );
                            debug!(signature, attempt = cycle.attempt, "Retrying corroboration");
                        }
                    }
                }
                Ok(observed) => {
                    let commitment = observed
                        .map(|s| s.commitment)
                        .unwrap_or(ChainCommitment::Unseen);
                    let cycle = ConfirmationAttempt::new(attempt, commitment, None);
                    debug!(
                        signature,
                        attempt = cycle.attempt,
                        observed = ?cycle.observed,
                        "Signature not yet finalized"
                    );
                }
                Err(e) if e.is_retryable() && !last_attempt => {
                    let cycle =
                        ConfirmationAttempt::new(attempt, ChainCommitment::Unseen, Some(e.to_string()));
                    warn!(
                        signature,
                        attempt = cycle.attempt,
                        error = %e,
                        "Status query failed, counting as a failed attempt"
                    );
                }
                Err(e) => return Err(e),
            }

            if !last_attempt {
                sleep(self.backoff.delay_for(attempt)).await;
            }
        }

        info!(
            signature,
            attempts = self.config.max_retries,
            "Signature never finalized within the polling budget"
        );
        metrics().poll_attempts.observe(self.config.max_retries as f64);
        Ok(FinalStatus::Timeout)
    }

    /// Secondary check of the full transaction record. Returns:
    /// - `Some(FinalizedOk)` when the record is present and clean
    /// - `Some(FinalizedErr)` when the record is missing or errored
    /// - `None` when the lookup itself failed transiently (retry the cycle)
    async fn corroborate(
        &self,
        signature: &str,
        last_attempt: bool,
    ) -> Result<Option<FinalStatus>, EngineError> {
        if !self.config.corroborate {
            return Ok(Some(FinalStatus::FinalizedOk));
        }

        match self.client.finalized_transaction(signature).await {
            Ok(TransactionRecord::Present { err: None }) => Ok(Some(FinalStatus::FinalizedOk)),
            Ok(TransactionRecord::Present { err: Some(e) }) => {
                Ok(Some(FinalStatus::FinalizedErr(e)))
            }
            Ok(TransactionRecord::Missing) => Ok(Some(FinalStatus::FinalizedErr(
                "finalized status reported but transaction record missing".to_string(),
            ))),
            Err(e) if e.is_retryable() && !last_attempt => Ok(None),
            Err(e) => Err(e),
        }
    }
}
