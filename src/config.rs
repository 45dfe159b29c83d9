//! Configuration module for the confirmation engine
//!
//! This module handles all configuration loading from TOML files,
//! environment variables, and provides structured configuration types.

use crate::chain::{BlockhashConfig, PollerConfig};
use crate::engine::EngineConfig;
use crate::verifier::VerifierConfig;
use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// RPC endpoint configuration
    pub rpc: RpcConfig,

    /// Blockhash provider configuration
    pub blockhash: BlockhashConfig,

    /// Status poller configuration
    pub poller: PollerConfig,

    /// Verification backend configuration
    pub verifier: VerifierConfig,

    /// Orchestrator configuration
    pub engine: EngineConfig,

    /// Monitoring and logging
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// RPC endpoint URL
    pub endpoint: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.mainnet-beta.solana.com".to_string(),
            timeout_secs: default_rpc_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    /// Emit logs as JSON instead of text
    pub log_json: bool,

    /// Expose prometheus metrics
    pub enable_metrics: bool,

    /// Port for the metrics endpoint
    pub metrics_port: u16,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            log_json: false,
            enable_metrics: true,
            metrics_port: 9090,
        }
    }
}

fn default_rpc_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn from_file_with_env(path: &str) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let mut config = Self::from_file(path)?;
        if let Ok(endpoint) = std::env::var("CHAINPAY_RPC_ENDPOINT") {
            config.rpc.endpoint = endpoint;
        }
        if let Ok(endpoint) = std::env::var("CHAINPAY_VERIFIER_ENDPOINT") {
            config.verifier.endpoint = endpoint;
        }
        Ok(config)
    }
}
