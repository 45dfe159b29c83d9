//! Chainpay - Solana payment confirmation and verification engine
//!
//! Watches a submitted payment transaction until it finalizes on-chain,
//! then verifies the payment with a trusted backend before reporting a
//! single authoritative terminal status. A processed-signature registry
//! makes confirmation idempotent per signature.

pub mod chain;
pub mod config;
pub mod endpoints;
pub mod engine;
pub mod errors;
pub mod metrics;
pub mod observability;
pub mod registry;
pub mod retry;
pub mod test_utils;
pub mod types;
pub mod verifier;

pub use chain::{
    BlockhashConfig, BlockhashInfo, BlockhashProvider, ChainClient, PollerConfig, RpcChainClient,
    StatusPoller, TransactionPreparer, TxSource,
};
pub use config::Config;
pub use engine::{ConfirmationEngine, ConfirmationHandle, EngineConfig};
pub use errors::EngineError;
pub use registry::SignatureRegistry;
pub use types::{
    ConfirmationRequest, ExpectedDetails, FinalStatus, PaymentReference, StatusCallback,
    TransactionStatus, VerificationOutcome,
};
pub use verifier::{VerificationDelegate, VerifierConfig, VerifyBackend};
