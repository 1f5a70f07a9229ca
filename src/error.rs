// src/error.rs
//! Domain error taxonomy for the certificate engine.
//!
//! Every chain-level failure is mapped onto one of these variants before it
//! leaves the blockchain layer, so the services and the API surface never
//! have to inspect raw provider errors. The HTTP status mapping lives next
//! to the taxonomy to keep the two in sync.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors produced by the certificate engine and its blockchain layer.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Input failed the EVM address-format check. Rejected before any
    /// network call is made.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The caller lacks permission for the requested mutation.
    #[error("authorization error: {0}")]
    AuthorizationError(String),

    /// The chain reports no certificate for the requested token ID.
    #[error("certificate not found: token {0}")]
    CertificateNotFound(String),

    /// Gas estimation failed, meaning the call would revert. The send is
    /// never attempted in this case.
    #[error("gas estimation failed: {0}")]
    GasEstimationFailed(String),

    /// The signer balance cannot cover gas for the transaction.
    #[error("insufficient funds for gas")]
    InsufficientFunds,

    /// The transaction was mined but reverted on-chain.
    #[error("contract call failed: {0}")]
    ContractCallFailed(String),

    /// RPC endpoint unreachable, request timed out, or the transaction was
    /// dropped before confirmation. Retryable by the caller.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A confirmed mutation produced no matching certificate event. This
    /// indicates an ABI/contract mismatch and is never swallowed.
    #[error("no certificate event found in confirmed transaction {0}")]
    MintEventNotFound(String),

    /// A write operation was requested on a deployment configured without a
    /// signing key.
    #[error("no signer configured: deployment is read-only")]
    NoSignerConfigured,

    /// A batch request exceeded the per-request item limit.
    #[error("batch too large: {requested} items, maximum {max}")]
    BatchTooLarge { requested: usize, max: usize },

    /// ABI-level failure (unknown method, encode/decode mismatch).
    #[error("abi error: {0}")]
    Abi(String),
}

impl EngineError {
    /// Short machine-readable kind tag, used in API error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::InvalidAddress(_) => "invalid_address",
            EngineError::AuthorizationError(_) => "authorization_error",
            EngineError::CertificateNotFound(_) => "certificate_not_found",
            EngineError::GasEstimationFailed(_) => "gas_estimation_failed",
            EngineError::InsufficientFunds => "insufficient_funds",
            EngineError::ContractCallFailed(_) => "contract_call_failed",
            EngineError::NetworkError(_) => "network_error",
            EngineError::MintEventNotFound(_) => "mint_event_not_found",
            EngineError::NoSignerConfigured => "no_signer_configured",
            EngineError::BatchTooLarge { .. } => "batch_too_large",
            EngineError::Abi(_) => "abi_error",
        }
    }

    /// HTTP status the API surface reports for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            EngineError::InvalidAddress(_) => StatusCode::BAD_REQUEST,
            EngineError::AuthorizationError(_) => StatusCode::FORBIDDEN,
            EngineError::CertificateNotFound(_) => StatusCode::NOT_FOUND,
            EngineError::GasEstimationFailed(_) => StatusCode::BAD_REQUEST,
            EngineError::InsufficientFunds => StatusCode::BAD_REQUEST,
            EngineError::ContractCallFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::NetworkError(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::MintEventNotFound(_) => StatusCode::INTERNAL_SERVER_ERROR,
            EngineError::NoSignerConfigured => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::BatchTooLarge { .. } => StatusCode::BAD_REQUEST,
            EngineError::Abi(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a provider/contract failure during submission or estimation to
    /// the taxonomy, keyed off the node's error text.
    ///
    /// Node implementations are not uniform in how they phrase failures, so
    /// classification is substring-based: balance failures and reverts have
    /// stable markers across geth/erigon/bor, everything else is treated as
    /// a network-level fault.
    pub fn classify_chain(message: impl Into<String>) -> EngineError {
        let message = message.into();
        let lowered = message.to_lowercase();
        if lowered.contains("insufficient funds") || lowered.contains("insufficient balance") {
            EngineError::InsufficientFunds
        } else if lowered.contains("revert") {
            EngineError::ContractCallFailed(revert_reason(&message).unwrap_or(message))
        } else {
            EngineError::NetworkError(message)
        }
    }
}

/// Extracts the human-readable revert reason from a node error message such
/// as `"execution reverted: CertificateNotFound"`. Returns `None` when the
/// node supplied no reason string.
pub fn revert_reason(message: &str) -> Option<String> {
    // ASCII lowering preserves byte length, so `pos` indexes `message`
    // correctly even when the node text carries non-ASCII characters.
    let lowered = message.to_ascii_lowercase();
    let pos = lowered.find("revert")?;
    let tail = &message[pos..];
    let reason = tail.split_once(':').map(|(_, r)| r.trim())?;
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_insufficient_funds() {
        let err = EngineError::classify_chain(
            "insufficient funds for gas * price + value: balance 0, tx cost 21000",
        );
        assert!(matches!(err, EngineError::InsufficientFunds));
    }

    #[test]
    fn test_classify_revert_with_reason() {
        let err = EngineError::classify_chain("execution reverted: NotAuthorizedIssuer");
        match err {
            EngineError::ContractCallFailed(reason) => {
                assert_eq!(reason, "NotAuthorizedIssuer")
            }
            other => panic!("expected ContractCallFailed, got {:?}", other),
        }
    }

    #[test]
    fn test_classify_connection_failure() {
        let err = EngineError::classify_chain("error sending request for url: connection refused");
        assert!(matches!(err, EngineError::NetworkError(_)));
    }

    #[test]
    fn test_revert_reason_with_non_ascii_prefix() {
        // "İ" lowercases to two code points under full Unicode lowering,
        // which would shift the marker offset into the original string.
        assert_eq!(
            revert_reason("İstanbul node: execution reverted: BadInput"),
            Some("BadInput".to_string())
        );
    }

    #[test]
    fn test_revert_reason_absent() {
        assert_eq!(revert_reason("execution reverted"), None);
        assert_eq!(revert_reason("connection reset by peer"), None);
    }

    #[test]
    fn test_status_codes_match_taxonomy() {
        assert_eq!(
            EngineError::InvalidAddress("0x12".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            EngineError::AuthorizationError("not an issuer".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            EngineError::CertificateNotFound("7".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            EngineError::MintEventNotFound("0xabc".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            EngineError::BatchTooLarge {
                requested: 51,
                max: 50
            }
            .status_code(),
            StatusCode::BAD_REQUEST
        );
    }
}
