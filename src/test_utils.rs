//! Test utilities
//!
//! Scripted mocks for the chain seam and the verification backend, plus a
//! status recorder. Compiled unconditionally so integration tests can use
//! them; nothing here is reachable from production paths.

use crate::chain::{BlockhashInfo, ChainClient, SignatureStatusSnapshot, TransactionRecord};
use crate::errors::EngineError;
use crate::types::{
    ChainCommitment, ExpectedDetails, StatusCallback, TransactionStatus, VerificationOutcome,
};
use crate::verifier::VerifyBackend;
use async_trait::async_trait;
use parking_lot::Mutex;
use solana_sdk::hash::Hash;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

type StatusResult = Result<Option<SignatureStatusSnapshot>, EngineError>;
type BlockhashResult = Result<BlockhashInfo, EngineError>;
type RecordResult = Result<TransactionRecord, EngineError>;

/// Scripted [`ChainClient`]
///
/// Responses are consumed front-to-back from per-method queues. An empty
/// queue falls back to a benign default: signature unseen, a fresh unique
/// blockhash, a clean transaction record.
pub struct MockChainClient {
    statuses: Mutex<VecDeque<StatusResult>>,
    blockhashes: Mutex<VecDeque<BlockhashResult>>,
    records: Mutex<VecDeque<RecordResult>>,
    pub status_calls: AtomicU32,
    pub blockhash_calls: AtomicU32,
    pub record_calls: AtomicU32,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            statuses: Mutex::new(VecDeque::new()),
            blockhashes: Mutex::new(VecDeque::new()),
            records: Mutex::new(VecDeque::new()),
            status_calls: AtomicU32::new(0),
            blockhash_calls: AtomicU32::new(0),
            record_calls: AtomicU32::new(0),
        }
    }

    pub fn push_status(&self, response: StatusResult) {
        self.statuses.lock().push_back(response);
    }

    pub fn push_blockhash(&self, response: BlockhashResult) {
        self.blockhashes.lock().push_back(response);
    }

    pub fn push_record(&self, response: RecordResult) {
        self.records.lock().push_back(response);
    }

    /// Script `not_seen` unseen polls followed by a clean finalized status
    pub fn finalized_ok_after(&self, not_seen: u32) {
        for _ in 0..not_seen {
            self.push_status(Ok(None));
        }
        self.push_status(Ok(Some(SignatureStatusSnapshot {
            commitment: ChainCommitment::Finalized,
            err: None,
        })));
    }

    /// Script `not_seen` unseen polls followed by a finalized status
    /// carrying an execution error
    pub fn finalized_err_after(&self, not_seen: u32, err: &str) {
        for _ in 0..not_seen {
            self.push_status(Ok(None));
        }
        self.push_status(Ok(Some(SignatureStatusSnapshot {
            commitment: ChainCommitment::Finalized,
            err: Some(err.to_string()),
        })));
    }

    pub fn status_call_count(&self) -> u32 {
        self.status_calls.load(Ordering::SeqCst)
    }

    pub fn record_call_count(&self) -> u32 {
        self.record_calls.load(Ordering::SeqCst)
    }

    pub fn blockhash_call_count(&self) -> u32 {
        self.blockhash_calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn signature_status(&self, _signature: &str) -> StatusResult {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        self.statuses.lock().pop_front().unwrap_or(Ok(None))
    }

    async fn latest_blockhash(&self) -> BlockhashResult {
        self.blockhash_calls.fetch_add(1, Ordering::SeqCst);
        self.blockhashes.lock().pop_front().unwrap_or_else(|| {
            Ok(BlockhashInfo {
                blockhash: Hash::new_unique(),
                last_valid_block_height: 100,
            })
        })
    }

    async fn finalized_transaction(&self, _signature: &str) -> RecordResult {
        self.record_calls.fetch_add(1, Ordering::SeqCst);
        self.records
            .lock()
            .pop_front()
            .unwrap_or(Ok(TransactionRecord::Present { err: None }))
    }
}

/// Scripted [`VerifyBackend`] returning a fixed outcome and counting calls
pub struct MockVerifier {
    outcome: Mutex<Result<VerificationOutcome, EngineError>>,
    pub calls: AtomicU32,
}

impl MockVerifier {
    pub fn returning(outcome: VerificationOutcome) -> Self {
        Self {
            outcome: Mutex::new(Ok(outcome)),
            calls: AtomicU32::new(0),
        }
    }

    pub fn failing(error: EngineError) -> Self {
        Self {
            outcome: Mutex::new(Err(error)),
            calls: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VerifyBackend for MockVerifier {
    async fn verify(
        &self,
        _signature: &str,
        _expected: Option<&ExpectedDetails>,
        _order_id: Option<&str>,
    ) -> Result<VerificationOutcome, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().clone()
    }
}

/// Records every status update delivered through a [`StatusCallback`]
#[derive(Default)]
pub struct StatusRecorder {
    updates: Mutex<Vec<TransactionStatus>>,
}

impl StatusRecorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn callback(self: &Arc<Self>) -> StatusCallback {
        let recorder = self.clone();
        Arc::new(move |status| {
            recorder.updates.lock().push(status);
        })
    }

    pub fn updates(&self) -> Vec<TransactionStatus> {
        self.updates.lock().clone()
    }

    pub fn terminal(&self) -> Option<TransactionStatus> {
        self.updates.lock().iter().find(|s| s.is_terminal()).cloned()
    }

    pub fn terminal_count(&self) -> usize {
        self.updates.lock().iter().filter(|s| s.is_terminal()).count()
    }
}
