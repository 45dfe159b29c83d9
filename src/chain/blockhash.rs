//! Blockhash provider with retry and a short-TTL cache
//!
//! Fetches the latest blockhash at finalized commitment, retrying transient
//! failures with exponential backoff and jitter. An empty/default blockhash
//! in the response is treated as a transient error, not a fatal one.
//!
//! The cache TTL is deliberately far below the ~60s blockhash lifetime;
//! entries carry `last_valid_block_height` so callers can still reject
//! expiry, and `refresh()` bypasses the cache entirely.

use crate::chain::client::{BlockhashInfo, ChainClient};
use crate::errors::EngineError;
use crate::retry::{retry_with_backoff, RetryConfig};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use solana_sdk::hash::Hash;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockhashConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_jitter_ms")]
    pub jitter_ms: u64,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    500
}
fn default_jitter_ms() -> u64 {
    1_000
}
fn default_cache_ttl_ms() -> u64 {
    10_000
}

impl Default for BlockhashConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
            jitter_ms: default_jitter_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

struct CachedBlockhash {
    info: BlockhashInfo,
    fetched_at: Instant,
}

pub struct BlockhashProvider {
    client: Arc<dyn ChainClient>,
    config: BlockhashConfig,
    cache: Mutex<Option<CachedBlockhash>>,
}

impl BlockhashProvider {
    pub fn new(client: Arc<dyn ChainClient>, config: BlockhashConfig) -> Self {
        Self {
            client,
            config,
            cache: Mutex::new(None),
        }
    }

    /// Latest blockhash, served from cache when fresh
    pub async fn latest(&self) -> Result<BlockhashInfo, EngineError> {
        {
            let cache = self.cache.lock();
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at.elapsed().as_millis() < self.config.cache_ttl_ms as u128 {
                    debug!(blockhash = %cached.info.blockhash, "Serving cached blockhash");
                    return Ok(cached.info);
                }
            }
        }
        self.refresh().await
    }

    /// Fetch a fresh blockhash, bypassing the cache
    pub async fn refresh(&self) -> Result<BlockhashInfo, EngineError> {
        let retry = RetryConfig {
            max_attempts: self.config.max_retries,
            base_delay_ms: self.config.base_delay_ms,
            max_delay_ms: self.config.base_delay_ms << self.config.max_retries.min(16),
            jitter_ms: self.config.jitter_ms,
        };

        let client = self.client.clone();
        let result = retry_with_backoff(
            "latest_blockhash",
            &retry,
            EngineError::is_retryable,
            || {
                let client = client.clone();
                async move {
                    let info = client.latest_blockhash().await?;
                    if info.blockhash == Hash::default() {
                        // Null/empty blockhash from a lagging node; worth retrying
                        return Err(EngineError::rpc("empty blockhash in RPC response"));
                    }
                    Ok(info)
                }
            },
        )
        .await
        .map_err(|e| match e {
            EngineError::Rpc(message) => EngineError::BlockhashUnavailable(message),
            other => other,
        })?;

        debug!(
            blockhash = %result.blockhash,
            last_valid_block_height = result.last_valid_block_height,
            "Fetched fresh blockhash"
        );

        *self.cache.lock() = Some(CachedBlockhash {
            info: result,
            fetched_at: Instant::now(),
        });

        Ok(result)
    }
}
