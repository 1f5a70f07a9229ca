// src/main.rs

//! # Certificate NFT System - Main Entry Point
//!
//! Issues and verifies academic/professional certificates as
//! non-transferable NFTs on Polygon Amoy, fronted by a REST API.
//!
//! ## Architecture Overview
//! 1. **Blockchain Layer**: `ChainClient` plus gas policy, transaction
//!    submitter and event decoder for the Certificate contract
//! 2. **Services Layer**: certificate engine, batch coordinator,
//!    verification query surface, outbound notification queue
//! 3. **API Layer**: Axum REST surface mapping one-to-one onto the engine
//!
//! ## Environment Variables
//! - `CONTRACT_ADDRESS`: deployed Certificate contract address (required)
//! - `RPC_URL`: JSON-RPC endpoint (default: Polygon Amoy public RPC)
//! - `PRIVATE_KEY`: signer key; omit for a read-only deployment
//! - `CONFIRMATIONS`, `TX_TIMEOUT_SECS`, `BIND_ADDRESS`,
//!   `SCAN_WINDOW_BLOCKS`, `BATCH_CONCURRENCY`: optional tuning

use crate::blockchain::chain_client::ChainClient;
use crate::config::Settings;
use crate::services::api_server::ApiServer;
use crate::services::batch::BatchCoordinator;
use crate::services::certificate_engine::CertificateEngine;
use crate::services::notifier::{CertificateNotifier, LogSink};
use crate::services::query::VerificationQuery;
use dotenv::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

// Module declarations (organized by functional domain)
mod blockchain; // chain client, gas policy, submitter, event decoder
mod config; // environment-backed settings
mod error; // domain error taxonomy
mod models; // data structures
mod services; // business logic and API

/// Main application entry point
///
/// # Initialization Sequence
/// 1. Load environment configuration
/// 2. Connect to the chain and validate the ABI against the live contract
/// 3. Wire engine, batch coordinator, query surface and notifier
/// 4. Start the API server
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let settings = Settings::load()?;
    let read_only = settings.private_key.is_none();

    let chain = Arc::new(ChainClient::connect(&settings).await?);

    // One known read against the deployed contract; an ABI mismatch fails
    // the boot instead of surfacing as decode errors under load.
    let total_supply = chain.validate_abi().await?;
    log::info!(
        "bound Certificate contract at 0x{:x} (total supply {})",
        chain.contract_address(),
        total_supply
    );

    let notifier = CertificateNotifier::spawn(Arc::new(LogSink));
    let engine = Arc::new(CertificateEngine::new(
        chain,
        notifier,
        settings.confirmations,
        settings.tx_timeout(),
        settings.scan_window_blocks,
    ));
    let query = Arc::new(VerificationQuery::new(engine.clone()));
    let batch = Arc::new(BatchCoordinator::new(
        engine.clone(),
        query.clone(),
        settings.batch_concurrency,
    ));

    let addr: SocketAddr = settings.bind_address.parse()?;
    log::info!("API server running at http://{}", addr);
    ApiServer::new(engine, batch, query, read_only).run(addr).await;
    Ok(())
}
