//! Chain-facing components: RPC client seam, blockhash provider,
//! transaction preparation, and the signature status poller.

pub mod blockhash;
pub mod client;
pub mod poller;
pub mod prepare;

pub use blockhash::{BlockhashConfig, BlockhashProvider};
pub use client::{BlockhashInfo, ChainClient, RpcChainClient, SignatureStatusSnapshot, TransactionRecord};
pub use poller::{PollerConfig, StatusPoller};
pub use prepare::{TransactionPreparer, TxSource};
