//! Error types for the confirmation engine
//!
//! Every component translates its internal failures into [`EngineError`]
//! before they reach the orchestrator; the orchestrator in turn converts the
//! error into a terminal `TransactionStatus`, so no raw error ever escapes
//! to a caller.

use thiserror::Error;

/// Error taxonomy for the confirmation pipeline
///
/// Covers the full lifecycle:
/// - Blockhash acquisition
/// - Transaction assembly and validation
/// - Signature status polling
/// - Backend verification
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Blockhash fetch retries exhausted
    ///
    /// Fatal for the current confirmation attempt but not for the process.
    #[error("Blockhash unavailable: {0}")]
    BlockhashUnavailable(String),

    /// Transaction failed structural validation
    ///
    /// Missing blockhash, missing fee payer, or an empty instruction list.
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Malformed signature string
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Transient RPC transport failure
    ///
    /// Timeouts, connection resets, malformed responses. Retried with
    /// backoff up to component-specific limits.
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Verification backend returned an HTTP error outside the
    /// infrastructure-unavailable set
    #[error("Verification endpoint error (status={status}): {body}")]
    DelegateHttp { status: u16, body: String },

    /// Confirmation cancelled via its handle before finalization
    #[error("Confirmation cancelled")]
    Cancelled,

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal invariant violation or unexpected state
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Check if this error is potentially retryable
    ///
    /// Only transport-level failures may succeed on retry; everything else
    /// is a fact about the transaction or the configuration.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Rpc(_))
    }

    /// Error category for metrics and log fields
    pub fn category(&self) -> &'static str {
        match self {
            Self::BlockhashUnavailable(_) => "blockhash",
            Self::InvalidTransaction(_) => "validation",
            Self::InvalidSignature(_) => "validation",
            Self::Rpc(_) => "rpc",
            Self::DelegateHttp { .. } => "delegate",
            Self::Cancelled => "cancelled",
            Self::Configuration(_) => "config",
            Self::Internal(_) => "internal",
        }
    }

    /// Create an RPC error from any displayable source
    pub fn rpc(reason: impl std::fmt::Display) -> Self {
        Self::Rpc(reason.to_string())
    }

    /// Create an internal error
    pub fn internal(reason: impl Into<String>) -> Self {
        Self::Internal(reason.into())
    }
}
