//! Transaction preparation
//!
//! Assembles or refreshes a transaction before submission: a prebuilt
//! transaction gets a fresh blockhash, a raw instruction list becomes a new
//! unsigned transaction. Structural completeness is validated before
//! return; an incomplete transaction never proceeds silently.

use crate::chain::blockhash::BlockhashProvider;
use crate::errors::EngineError;
use solana_sdk::hash::Hash;
use solana_sdk::instruction::Instruction;
use solana_sdk::message::Message;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::transaction::Transaction;
use std::sync::Arc;
use tracing::debug;

/// Input to [`TransactionPreparer::prepare`]
pub enum TxSource {
    /// Already-constructed transaction whose blockhash is refreshed in place
    Prebuilt(Transaction),
    /// Ordered instruction list from which a new transaction is assembled
    Instructions(Vec<Instruction>),
}

pub struct TransactionPreparer {
    blockhash: Arc<BlockhashProvider>,
}

impl TransactionPreparer {
    pub fn new(blockhash: Arc<BlockhashProvider>) -> Self {
        Self { blockhash }
    }

    /// Prepare a transaction for submission
    ///
    /// The caller retains ownership; only the blockhash (and, for the
    /// instruction path, the fee payer slot) is the preparer's to set.
    pub async fn prepare(
        &self,
        source: TxSource,
        fee_payer: &Pubkey,
    ) -> Result<Transaction, EngineError> {
        let hash_info = self.blockhash.latest().await?;

        let tx = match source {
            TxSource::Prebuilt(mut tx) => {
                if tx.message.instructions.is_empty() {
                    return Err(EngineError::InvalidTransaction(
                        "transaction has no instructions".to_string(),
                    ));
                }
                let payer = tx.message.account_keys.first().ok_or_else(|| {
                    EngineError::InvalidTransaction("transaction has no fee payer".to_string())
                })?;
                if payer != fee_payer {
                    return Err(EngineError::InvalidTransaction(format!(
                        "fee payer mismatch: transaction pays with {payer}, expected {fee_payer}"
                    )));
                }
                tx.message.recent_blockhash = hash_info.blockhash;
                tx
            }
            TxSource::Instructions(instructions) => {
                if instructions.is_empty() {
                    return Err(EngineError::InvalidTransaction(
                        "instruction list is empty".to_string(),
                    ));
                }
                let message = Message::new_with_blockhash(
                    &instructions,
                    Some(fee_payer),
                    &hash_info.blockhash,
                );
                Transaction::new_unsigned(message)
            }
        };

        validate_structure(&tx)?;

        debug!(
            fee_payer = %fee_payer,
            instructions = tx.message.instructions.len(),
            blockhash = %tx.message.recent_blockhash,
            "Prepared transaction"
        );

        Ok(tx)
    }
}

fn validate_structure(tx: &Transaction) -> Result<(), EngineError> {
    if tx.message.recent_blockhash == Hash::default() {
        return Err(EngineError::InvalidTransaction(
            "missing recent blockhash".to_string(),
        ));
    }
    if tx.message.account_keys.is_empty() {
        return Err(EngineError::InvalidTransaction(
            "missing fee payer".to_string(),
        ));
    }
    if tx.message.instructions.is_empty() {
        return Err(EngineError::InvalidTransaction(
            "no instructions".to_string(),
        ));
    }
    Ok(())
}
