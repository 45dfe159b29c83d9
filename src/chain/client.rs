//! Chain access seam
//!
//! [`ChainClient`] is the trait boundary between the engine and the Solana
//! RPC surface; [`RpcChainClient`] is the production implementation over the
//! nonblocking client. Tests substitute scripted mocks.

use crate::errors::EngineError;
use crate::types::ChainCommitment;
use async_trait::async_trait;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_rpc_client_api::config::RpcTransactionConfig;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::hash::Hash;
use solana_sdk::signature::Signature;
use solana_transaction_status::{TransactionConfirmationStatus, UiTransactionEncoding};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Latest blockhash plus the height after which it expires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockhashInfo {
    pub blockhash: Hash,
    pub last_valid_block_height: u64,
}

/// Snapshot of a signature's confirmation state as reported by one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureStatusSnapshot {
    pub commitment: ChainCommitment,
    /// On-chain execution error, present only for failed transactions
    pub err: Option<String>,
}

/// Result of looking up a finalized transaction record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionRecord {
    Present { err: Option<String> },
    Missing,
}

/// Network operations the engine depends on
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Signature status with transaction-history search enabled, so
    /// signatures already dropped from the recent-status cache are still
    /// found. `None` means the node has not seen the signature.
    async fn signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatusSnapshot>, EngineError>;

    /// Latest blockhash at finalized commitment
    async fn latest_blockhash(&self) -> Result<BlockhashInfo, EngineError>;

    /// Full transaction record at finalized commitment, used to
    /// corroborate a finalized status before declaring success
    async fn finalized_transaction(
        &self,
        signature: &str,
    ) -> Result<TransactionRecord, EngineError>;
}

/// Production [`ChainClient`] over the nonblocking Solana RPC client
pub struct RpcChainClient {
    rpc: Arc<RpcClient>,
}

impl RpcChainClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let rpc = RpcClient::new_with_timeout_and_commitment(
            endpoint.into(),
            timeout,
            CommitmentConfig::finalized(),
        );
        Self { rpc: Arc::new(rpc) }
    }

    pub fn from_rpc(rpc: Arc<RpcClient>) -> Self {
        Self { rpc }
    }

    fn parse_signature(signature: &str) -> Result<Signature, EngineError> {
        Signature::from_str(signature)
            .map_err(|e| EngineError::InvalidSignature(format!("{signature}: {e}")))
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn signature_status(
        &self,
        signature: &str,
    ) -> Result<Option<SignatureStatusSnapshot>, EngineError> {
        let sig = Self::parse_signature(signature)?;

        let response = self
            .rpc
            .get_signature_statuses_with_history(&[sig])
            .await
            .map_err(EngineError::rpc)?;

        let status = match response.value.into_iter().next().flatten() {
            Some(status) => status,
            None => return Ok(None),
        };

        let commitment = match status.confirmation_status {
            Some(TransactionConfirmationStatus::Finalized) => ChainCommitment::Finalized,
            Some(TransactionConfirmationStatus::Confirmed) => ChainCommitment::Confirmed,
            Some(TransactionConfirmationStatus::Processed) | None => ChainCommitment::Processed,
        };

        Ok(Some(SignatureStatusSnapshot {
            commitment,
            err: status.err.map(|e| e.to_string()),
        }))
    }

    async fn latest_blockhash(&self) -> Result<BlockhashInfo, EngineError> {
        let (blockhash, last_valid_block_height) = self
            .rpc
            .get_latest_blockhash_with_commitment(CommitmentConfig::finalized())
            .await
            .map_err(EngineError::rpc)?;

        Ok(BlockhashInfo {
            blockhash,
            last_valid_block_height,
        })
    }

    async fn finalized_transaction(
        &self,
        signature: &str,
    ) -> Result<TransactionRecord, EngineError> {
        let sig = Self::parse_signature(signature)?;

        let config = RpcTransactionConfig {
            encoding: Some(UiTransactionEncoding::Json),
            commitment: Some(CommitmentConfig::finalized()),
            max_supported_transaction_version: Some(0),
        };

        match self.rpc.get_transaction_with_config(&sig, config).await {
            Ok(record) => {
                let err = record
                    .transaction
                    .meta
                    .as_ref()
                    .and_then(|meta| meta.err.as_ref())
                    .map(|e| e.to_string());
                Ok(TransactionRecord::Present { err })
            }
            Err(e) => {
                // The RPC surfaces a missing transaction as an error rather
                // than a null result; distinguish it from transport faults.
                let message = e.to_string();
                if message.contains("not found") || message.contains("invalid type: null") {
                    debug!(signature, "Finalized transaction record missing");
                    Ok(TransactionRecord::Missing)
                } else {
                    Err(EngineError::Rpc(message))
                }
            }
        }
    }
}
