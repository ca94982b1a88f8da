//! Allowlist Service
//!
//! REST API over the Merkle allowlist, publishing roots to the NFT contract.

mod api;
mod state;
mod submitter;

use allowlist_core::{AllowlistContract, AllowlistManager, AllowlistStore, JsonFileBackend};
use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use submitter::{Submitter, SubmitterConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "allowlist-service")]
#[command(about = "Merkle allowlist service for allowlist-gated NFT minting")]
struct Args {
    /// JSON-RPC URL
    #[arg(long, env = "RPC_URL", default_value = "http://localhost:8545")]
    rpc_url: String,

    /// NFT contract address
    #[arg(long, env = "CONTRACT_ADDRESS")]
    contract_address: String,

    /// Owner private key for transaction signing (hex, `0x` optional).
    /// Without it the service is read-only.
    #[arg(long, env = "PRIVATE_KEY")]
    private_key: Option<String>,

    /// Directory holding the allowlist JSON files
    #[arg(long, env = "STORE_DIR", default_value = "./data")]
    store_dir: PathBuf,

    /// Storage namespace (file name within the store directory)
    #[arg(long, env = "STORE_NAMESPACE", default_value = allowlist_core::DEFAULT_NAMESPACE)]
    namespace: String,

    /// API listen address
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen: String,

    /// Metrics listen address
    #[arg(long, default_value = "0.0.0.0:9090")]
    metrics_listen: String,

    /// Confirmations to wait for on root updates
    #[arg(long, default_value_t = 1)]
    confirmations: u64,

    /// Refuse to send transactions above this gas price
    #[arg(long, default_value_t = 100)]
    max_gas_price_gwei: u64,

    /// Root publications kept for `/publications`
    #[arg(long, env = "PUBLICATION_LOG_SIZE", default_value_t = state::DEFAULT_PUBLICATION_LOG_SIZE)]
    publication_log_size: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from .env if present
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!("Starting allowlist service");
    tracing::info!(rpc_url = %args.rpc_url, contract = %args.contract_address, "Contract");
    tracing::info!(listen = %args.listen, "API server");

    let metrics_addr: SocketAddr = args
        .metrics_listen
        .parse()
        .context("Invalid metrics listen address")?;
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .context("Failed to install Prometheus exporter")?;
    tracing::info!(listen = %metrics_addr, "Metrics exporter");

    let config = SubmitterConfig {
        rpc_url: args.rpc_url.clone(),
        contract_address: args.contract_address.clone(),
        private_key: args.private_key.clone(),
        max_gas_price_gwei: args.max_gas_price_gwei,
        confirmations: args.confirmations,
    };
    let submitter = if config.private_key.is_some() {
        Submitter::with_signer(config)?
    } else {
        tracing::warn!("No private key configured; admin operations will be rejected");
        Submitter::new(config)?
    };

    let backend = JsonFileBackend::new(&args.store_dir, &args.namespace)
        .context("Failed to open store directory")?;
    tracing::info!(path = %backend.path().display(), "Allowlist storage");
    let store = AllowlistStore::open(backend).context("Failed to load allowlist")?;
    tracing::info!(members = store.len(), "Loaded allowlist");

    // Initialize application state
    let app_state = state::AppState::with_publication_log_size(
        AllowlistManager::new(store, submitter),
        args.publication_log_size,
    );
    app_state.refresh_gauges();
    log_owner_check(&app_state).await;

    // Start API server
    let api_handle = tokio::spawn(api::run_server(args.listen.clone(), app_state.clone()));

    // Wait for shutdown
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal");
        }
        result = api_handle => {
            match result {
                Ok(Err(e)) => tracing::error!(error = %e, "API server error"),
                Err(e) => tracing::error!(error = %e, "API server task failed"),
                Ok(Ok(())) => {}
            }
        }
    }

    Ok(())
}

/// Report reconciliation state and whether the signer can administer
async fn log_owner_check<C: AllowlistContract>(state: &state::AppState<C>) {
    match state.manager().sync_report().await {
        Ok(report) => tracing::info!(
            status = ?report.status,
            onchain_root = %report.onchain_root,
            "Initial reconciliation"
        ),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read on-chain root");
            state.set_error(Some(e.to_string()));
        }
    }

    if state.manager().contract().signer().is_some() {
        if let Err(e) = state.manager().ensure_owner().await {
            tracing::warn!(error = %e, "Signer is not the contract owner");
        }
    }
}
