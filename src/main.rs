//! Chainpay CLI
//!
//! Confirms a submitted Solana payment from the command line: polls the
//! signature until it finalizes, verifies the payment with the configured
//! backend, and prints the terminal status as JSON. Exit code 0 means the
//! payment was confirmed.

use anyhow::{Context, Result};
use chainpay::config::Config;
use chainpay::engine::ConfirmationEngine;
use chainpay::registry::SignatureRegistry;
use chainpay::types::{ConfirmationRequest, ExpectedDetails, PaymentReference, StatusCallback};
use chainpay::verifier::VerificationDelegate;
use chainpay::RpcChainClient;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Payment reference: a transaction signature, an external receipt
    /// ID ("pi_..."), or "free"
    reference: String,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Order ID forwarded to the verification backend
    #[arg(long)]
    order_id: Option<String>,

    /// Expected payment amount in lamports
    #[arg(long)]
    amount: Option<u64>,

    /// Paying wallet address
    #[arg(long)]
    buyer: Option<String>,

    /// Merchant wallet address
    #[arg(long)]
    recipient: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args.config)?;
    init_logging(args.verbose, config.monitoring.log_json)?;

    info!("Starting payment confirmation");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(endpoint = %config.rpc.endpoint, "RPC endpoint");

    if config.monitoring.enable_metrics {
        let metrics_port = config.monitoring.metrics_port;
        tokio::spawn(async move {
            if let Err(e) = chainpay::endpoints::endpoint_server(metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    }

    let chain = Arc::new(RpcChainClient::new(
        config.rpc.endpoint.clone(),
        Duration::from_secs(config.rpc.timeout_secs),
    ));
    let verifier = Arc::new(
        VerificationDelegate::new(config.verifier.clone())
            .context("Failed to build verification client")?,
    );
    let registry = Arc::new(SignatureRegistry::new());

    let engine = ConfirmationEngine::new(
        chain,
        verifier,
        registry,
        config.blockhash.clone(),
        config.poller.clone(),
        config.engine.clone(),
    );

    let expected = match (args.amount, args.buyer, args.recipient) {
        (Some(amount_lamports), Some(buyer), Some(recipient)) => Some(ExpectedDetails {
            amount_lamports,
            buyer,
            recipient,
        }),
        (None, None, None) => None,
        _ => anyhow::bail!("--amount, --buyer and --recipient must be given together"),
    };

    let mut request = ConfirmationRequest::new(PaymentReference::from_raw(&args.reference));
    if let Some(expected) = expected {
        request = request.with_expected(expected);
    }
    if let Some(order_id) = args.order_id {
        request = request.with_order_id(order_id);
    }

    let on_status: StatusCallback = Arc::new(|status| {
        if let Ok(json) = serde_json::to_string(&status) {
            println!("{json}");
        }
    });

    let terminal = engine.confirm(request, on_status).await;

    if terminal.success {
        info!(signature = %terminal.signature, "Payment confirmed");
        Ok(())
    } else {
        warn!(
            signature = %terminal.signature,
            error = ?terminal.error,
            "Payment not confirmed"
        );
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, json: bool) -> Result<()> {
    let env_filter = if verbose {
        "chainpay=debug,info"
    } else {
        "chainpay=info,warn,error"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| env_filter.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json().with_target(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .init();
    }

    Ok(())
}

/// Load configuration from file with fallback to defaults
fn load_config(path: &str) -> Result<Config> {
    if std::path::Path::new(path).exists() {
        Config::from_file_with_env(path)
            .with_context(|| format!("Failed to load config from {}", path))
    } else {
        Ok(Config::default())
    }
}
