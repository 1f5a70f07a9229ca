// src/models/certificate.rs
//! Certificate data model.
//!
//! The chain is the unit of truth for every field here; these structs are
//! snapshots decoded from contract calls and receipts, never a cache. Token
//! IDs serialize as decimal strings and addresses as 0x-prefixed lowercase
//! hex so API consumers never deal with chain-native encodings.

use ethers::types::{Address, TxHash, U256};
use serde::{Deserialize, Serialize, Serializer};

/// Serializes a `U256` as a decimal string.
pub fn serialize_u256_dec<S: Serializer>(value: &U256, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&value.to_string())
}

fn serialize_u256_dec_seq<S: Serializer>(ids: &[U256], s: S) -> Result<S::Ok, S::Error> {
    s.collect_seq(ids.iter().map(|id| id.to_string()))
}

/// Serializes an `Address` as `0x` + 40 lowercase hex chars.
pub fn serialize_address<S: Serializer>(addr: &Address, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format!("0x{:x}", addr))
}

/// One certificate NFT as recorded on-chain.
///
/// Append-only after minting except for the one-way valid -> revoked
/// transition; ownership never changes because the token is
/// non-transferable.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRecord {
    /// Chain-assigned identifier. Never assigned client-side, and callers
    /// must not assume sequential IDs are gap-free.
    #[serde(serialize_with = "serialize_u256_dec")]
    pub token_id: U256,

    /// Address that submitted the mint transaction.
    #[serde(serialize_with = "serialize_address")]
    pub issuer: Address,

    /// Address that owns the certificate.
    #[serde(serialize_with = "serialize_address")]
    pub recipient: Address,

    pub recipient_name: String,
    pub course_name: String,
    pub institution_name: String,

    /// Block timestamp at mint time, seconds since epoch.
    pub issue_date: u64,

    /// Optional pointer to off-chain descriptive metadata.
    pub metadata_uri: String,

    /// False once the certificate has been revoked.
    pub is_valid: bool,
}

/// Return tuple of the contract's `getCertificate` view, in ABI order.
pub type CertificateTuple = (String, String, String, U256, Address, Address, bool, String);

impl CertificateRecord {
    /// Builds a record from the `getCertificate` return tuple.
    pub fn from_chain(token_id: U256, parts: CertificateTuple) -> Self {
        let (
            recipient_name,
            course_name,
            institution_name,
            issue_date,
            recipient,
            issuer,
            is_valid,
            metadata_uri,
        ) = parts;
        CertificateRecord {
            token_id,
            issuer,
            recipient,
            recipient_name,
            course_name,
            institution_name,
            issue_date: issue_date.as_u64(),
            metadata_uri,
            is_valid,
        }
    }
}

/// Receipt data for one confirmed mutation. Ephemeral: reported to the
/// caller and discarded, never persisted here.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionOutcome {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    #[serde(serialize_with = "serialize_u256_dec")]
    pub gas_used: U256,
    /// Token IDs decoded from the certificate events in the receipt.
    #[serde(serialize_with = "serialize_u256_dec_seq")]
    pub token_ids: Vec<U256>,
}

impl TransactionOutcome {
    /// The single token ID this mutation concerns, when exactly one event
    /// was decoded.
    pub fn token_id(&self) -> Option<U256> {
        self.token_ids.first().copied()
    }
}

/// Answer to one authenticity query. Recomputed on every call since
/// validity can change between calls through revocation.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationResult {
    pub exists: bool,
    pub is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate: Option<CertificateRecord>,
}

impl VerificationResult {
    pub fn not_found() -> Self {
        VerificationResult {
            exists: false,
            is_valid: false,
            certificate: None,
        }
    }

    pub fn found(certificate: CertificateRecord) -> Self {
        VerificationResult {
            exists: true,
            is_valid: certificate.is_valid,
            certificate: Some(certificate),
        }
    }
}

/// Input for one certificate mint, as received from the API surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintRequest {
    pub recipient: String,
    pub recipient_name: String,
    pub course_name: String,
    pub institution_name: String,
    #[serde(default)]
    pub metadata_uri: String,
}

/// Flat payload handed to the notification dispatcher after a successful
/// mint.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedCertificateNotice {
    #[serde(serialize_with = "serialize_u256_dec")]
    pub token_id: U256,
    pub recipient_name: String,
    pub course_name: String,
    pub institution_name: String,
    #[serde(serialize_with = "serialize_address")]
    pub issuer: Address,
    pub issue_date: u64,
    pub transaction_hash: TxHash,
}

/// Payload for the QR/verification-URL collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationLink {
    #[serde(serialize_with = "serialize_u256_dec")]
    pub token_id: U256,
    #[serde(serialize_with = "serialize_address")]
    pub contract_address: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_record_from_chain_tuple() {
        let issuer = Address::from_str("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap();
        let recipient = Address::from_str("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap();
        let record = CertificateRecord::from_chain(
            U256::from(7u64),
            (
                "Ada Lovelace".to_string(),
                "Algorithms".to_string(),
                "Poly U".to_string(),
                U256::from(1_700_000_000u64),
                recipient,
                issuer,
                true,
                String::new(),
            ),
        );
        assert_eq!(record.token_id, U256::from(7u64));
        assert_eq!(record.issuer, issuer);
        assert_eq!(record.recipient, recipient);
        assert_eq!(record.issue_date, 1_700_000_000);
        assert!(record.is_valid);
    }

    #[test]
    fn test_record_serializes_chain_types_as_strings() {
        let record = CertificateRecord {
            token_id: U256::from(42u64),
            issuer: Address::from_str("0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB").unwrap(),
            recipient: Address::zero(),
            recipient_name: "Ada Lovelace".to_string(),
            course_name: "Algorithms".to_string(),
            institution_name: "Poly U".to_string(),
            issue_date: 1_700_000_000,
            metadata_uri: String::new(),
            is_valid: true,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["token_id"], "42");
        assert_eq!(json["issuer"], "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
        assert_eq!(json["is_valid"], true);
    }

    #[test]
    fn test_verification_result_not_found_shape() {
        let result = VerificationResult::not_found();
        assert!(!result.exists);
        assert!(!result.is_valid);
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("certificate").is_none());
    }

    #[test]
    fn test_mint_request_metadata_defaults_empty() {
        let request: MintRequest = serde_json::from_str(
            r#"{
                "recipient": "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa",
                "recipient_name": "Ada Lovelace",
                "course_name": "Algorithms",
                "institution_name": "Poly U"
            }"#,
        )
        .unwrap();
        assert_eq!(request.metadata_uri, "");
    }
}
