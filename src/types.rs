//! Common types used throughout the engine

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Prefix that marks an externally issued payment receipt (no on-chain
/// transaction behind it). Must match the backend's wire convention.
pub const EXTERNAL_RECEIPT_PREFIX: &str = "pi_";

/// Sentinel for orders that require no payment at all.
pub const FREE_ORDER_SENTINEL: &str = "free";

/// How a payment is identified at the submit boundary
///
/// The caller decides the variant explicitly; [`PaymentReference::from_raw`]
/// exists only for callers still speaking the string-prefix wire convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentReference {
    /// Base58 signature of a submitted on-chain transaction
    OnChain(String),
    /// Externally issued receipt reference, e.g. a card processor intent ID
    ExternalReceipt(String),
    /// No payment required for this order
    Free,
}

impl PaymentReference {
    /// Classify a raw identifier string using the legacy prefix convention
    pub fn from_raw(raw: &str) -> Self {
        if raw.starts_with(EXTERNAL_RECEIPT_PREFIX) {
            Self::ExternalReceipt(raw.to_string())
        } else if raw == FREE_ORDER_SENTINEL || raw.starts_with("free_") {
            Self::Free
        } else {
            Self::OnChain(raw.to_string())
        }
    }

    /// Identifier used for status reporting and registry keys
    pub fn identifier(&self) -> &str {
        match self {
            Self::OnChain(sig) => sig,
            Self::ExternalReceipt(id) => id,
            Self::Free => FREE_ORDER_SENTINEL,
        }
    }

    pub fn is_on_chain(&self) -> bool {
        matches!(self, Self::OnChain(_))
    }
}

/// Payment details the backend uses for authorization checks
///
/// The engine never interprets these itself; the trusted backend re-derives
/// whether amount and recipient match the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedDetails {
    /// Expected payment amount in lamports
    #[serde(rename = "amount")]
    pub amount_lamports: u64,
    /// Paying wallet address
    pub buyer: String,
    /// Merchant wallet address
    pub recipient: String,
}

/// Immutable input to the orchestrator, one per checkout attempt
#[derive(Debug, Clone)]
pub struct ConfirmationRequest {
    pub reference: PaymentReference,
    pub expected: Option<ExpectedDetails>,
    pub order_id: Option<String>,
}

impl ConfirmationRequest {
    pub fn new(reference: PaymentReference) -> Self {
        Self {
            reference,
            expected: None,
            order_id: None,
        }
    }

    pub fn with_expected(mut self, expected: ExpectedDetails) -> Self {
        self.expected = Some(expected);
        self
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

/// On-chain commitment level observed for a signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainCommitment {
    /// Signature not yet seen by the queried node
    Unseen,
    Processed,
    Confirmed,
    Finalized,
}

/// One polling cycle, discarded after the cycle; never persisted
#[derive(Debug, Clone)]
pub struct ConfirmationAttempt {
    /// 0-indexed attempt number
    pub attempt: u32,
    /// Unix epoch milliseconds at the start of the cycle
    pub at_epoch_ms: u64,
    /// Last observed on-chain status
    pub observed: ChainCommitment,
    /// Query-level error for this cycle, if any
    pub last_error: Option<String>,
}

impl ConfirmationAttempt {
    pub fn new(attempt: u32, observed: ChainCommitment, last_error: Option<String>) -> Self {
        Self {
            attempt,
            at_epoch_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0),
            observed,
            last_error,
        }
    }
}

/// Terminal result of the polling phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalStatus {
    /// Finalized without an execution error
    FinalizedOk,
    /// Finalized with an on-chain execution error
    FinalizedErr(String),
    /// Never reached finalization within the retry budget; the transaction
    /// may still finalize after we stop watching
    Timeout,
}

/// Result of backend verification for a finalized payment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// Authoritative success; durable state updated by the backend
    Verified,
    /// Network-confirmed, backend verification deferred to a background
    /// reconciliation job; order optimistically marked paid
    TemporarilyApproved { warning: String },
    /// Backend determined the payment invalid despite on-chain finality
    Rejected { reason: String },
    /// Backend unreachable; network confirmation alone treated as success
    /// with reconciliation deferred
    DelegateUnavailable,
}

/// The public result contract observed by callers
///
/// Emitted at least twice per confirmation: an initial processing update
/// and exactly one terminal state. Once `processing` is false the status is
/// terminal and no further side effect runs for the signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionStatus {
    pub processing: bool,
    pub success: bool,
    pub error: Option<String>,
    pub signature: String,
    pub payment_confirmed: bool,
}

impl TransactionStatus {
    /// Initial non-terminal update
    pub fn processing(signature: impl Into<String>) -> Self {
        Self {
            processing: true,
            success: false,
            error: None,
            signature: signature.into(),
            payment_confirmed: false,
        }
    }

    /// Terminal success with payment confirmed
    pub fn confirmed(signature: impl Into<String>) -> Self {
        Self {
            processing: false,
            success: true,
            error: None,
            signature: signature.into(),
            payment_confirmed: true,
        }
    }

    /// Terminal failure
    pub fn failed(signature: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            processing: false,
            success: false,
            error: Some(error.into()),
            signature: signature.into(),
            payment_confirmed: false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !self.processing
    }
}

/// Caller-supplied sink for status updates
///
/// May be invoked more than once with the same terminal payload; callers
/// must treat any `processing == false` call as terminal and ignore
/// duplicate-identical terminal calls.
pub type StatusCallback = Arc<dyn Fn(TransactionStatus) + Send + Sync>;

/// No-op status callback for callers that only await the returned status
pub fn noop_status_callback() -> StatusCallback {
    Arc::new(|_| {})
}
