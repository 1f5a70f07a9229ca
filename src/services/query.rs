// src/services/query.rs
//! Verification Query Surface
//!
//! Public read path: authenticity by token ID, and holdings/issuance by
//! address. The address lookups linearly scan token IDs from 1 to the
//! current total supply, one `getCertificate` per ID, because no off-chain
//! index exists. That is O(supply) per query and acceptable only at modest
//! certificate volumes; scale-up requires an external event indexer, which
//! is a known limitation of this surface, not something it papers over.

use crate::error::EngineError;
use crate::models::certificate::{CertificateRecord, VerificationResult};
use crate::services::certificate_engine::CertificateEngine;
use ethers::types::{Address, U256};
use std::sync::Arc;

/// Which address field a scan matches against.
enum ScanField {
    Recipient,
    Issuer,
}

/// Read-only query service over one certificate contract.
pub struct VerificationQuery {
    engine: Arc<CertificateEngine>,
}

impl VerificationQuery {
    pub fn new(engine: Arc<CertificateEngine>) -> Self {
        VerificationQuery { engine }
    }

    /// Full verification answer for one token: existence, validity and the
    /// record snapshot. Never errors; lookups that fail for any reason
    /// report as not found, since this surface serves untrusted public
    /// callers.
    pub async fn verify_token(&self, token_id: U256) -> VerificationResult {
        match self.engine.get(token_id).await {
            Ok(record) => VerificationResult::found(record),
            Err(EngineError::CertificateNotFound(_)) => VerificationResult::not_found(),
            Err(e) => {
                log::warn!("verification lookup for token {} failed: {}", token_id, e);
                VerificationResult::not_found()
            }
        }
    }

    /// Certificates owned by `recipient`.
    pub async fn held_by(&self, recipient: Address) -> Result<Vec<CertificateRecord>, EngineError> {
        self.scan(recipient, ScanField::Recipient).await
    }

    /// Certificates minted by `issuer`, found by full scan rather than the
    /// engine's windowed log query, so older issuance is included.
    pub async fn issued_by(&self, issuer: Address) -> Result<Vec<CertificateRecord>, EngineError> {
        self.scan(issuer, ScanField::Issuer).await
    }

    async fn scan(
        &self,
        address: Address,
        field: ScanField,
    ) -> Result<Vec<CertificateRecord>, EngineError> {
        let total: U256 = self.engine.chain().read("totalSupply", ()).await?;
        let highest = total.low_u64();

        let mut matches = Vec::new();
        for id in 1..=highest {
            let token_id = U256::from(id);
            match self.engine.get(token_id).await {
                Ok(record) => {
                    // Address equality is byte-level, so mixed-case inputs
                    // already normalized at parse time compare correctly.
                    let hit = match field {
                        ScanField::Recipient => record.recipient == address,
                        ScanField::Issuer => record.issuer == address,
                    };
                    if hit {
                        matches.push(record);
                    }
                }
                Err(e) => {
                    log::debug!("skipping token {} during address scan: {}", token_id, e);
                }
            }
        }
        Ok(matches)
    }
}
