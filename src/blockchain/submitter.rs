// src/blockchain/submitter.rs
//! Transaction submission and confirmation wait.
//!
//! Sends a prepared write with the gas limit the policy computed, then
//! blocks until the requested confirmation count is reached or the timeout
//! fires. No retry happens here: resubmitting a mutation without confirming
//! the first attempt truly failed risks duplicate mints, so retries are the
//! caller's decision.

use crate::blockchain::chain_client::WriteCall;
use crate::error::EngineError;
use ethers::providers::JsonRpcClient;
use ethers::types::{Log, TxHash, U256, U64};
use std::time::Duration;

/// Receipt data for one confirmed transaction.
#[derive(Debug, Clone)]
pub struct TxReceiptData {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub gas_used: U256,
    pub logs: Vec<Log>,
}

/// Submits `call` with `gas_limit` and waits for `confirmations` blocks.
///
/// The wait is bounded by `timeout`; on expiry the operation reports
/// `NetworkError`, though the underlying transaction may still confirm
/// later out-of-band. A receipt with a failed status maps to
/// `ContractCallFailed`, a dropped transaction to `NetworkError`.
pub async fn submit<P: JsonRpcClient>(
    call: WriteCall<P>,
    gas_limit: U256,
    confirmations: usize,
    timeout: Duration,
) -> Result<TxReceiptData, EngineError> {
    let call = call.gas(gas_limit);
    let pending = call
        .send()
        .await
        .map_err(|e| EngineError::classify_chain(e.to_string()))?;
    let tx_hash = *pending;
    log::debug!(
        "submitted tx {:?} gas_limit={} confirmations={}",
        tx_hash,
        gas_limit,
        confirmations
    );

    let receipt = tokio::time::timeout(timeout, pending.confirmations(confirmations))
        .await
        .map_err(|_| {
            EngineError::NetworkError(format!(
                "transaction {:?} not confirmed within {}s",
                tx_hash,
                timeout.as_secs()
            ))
        })?
        .map_err(|e| EngineError::classify_chain(e.to_string()))?
        .ok_or_else(|| {
            EngineError::NetworkError(format!("transaction {:?} dropped before inclusion", tx_hash))
        })?;

    if receipt.status != Some(U64::one()) {
        return Err(EngineError::ContractCallFailed(format!(
            "transaction {:?} reverted on-chain",
            tx_hash
        )));
    }

    let block_number = receipt.block_number.unwrap_or_default().as_u64();
    let gas_used = receipt.gas_used.unwrap_or_default();
    log::info!(
        "confirmed tx {:?} block={} gas_used={}",
        tx_hash,
        block_number,
        gas_used
    );

    Ok(TxReceiptData {
        transaction_hash: receipt.transaction_hash,
        block_number,
        gas_used,
        logs: receipt.logs,
    })
}
