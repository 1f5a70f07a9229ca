// src/blockchain/events.rs
//! Decoding of certificate events from receipt logs.
//!
//! A confirmed mutation must carry a `CertificateIssued` or
//! `CertificateRevoked` event; a receipt with neither means the ABI and the
//! deployed contract disagree, which is surfaced as `MintEventNotFound`
//! rather than silently ignored.

use crate::error::EngineError;
use ethers::abi::{Abi, RawLog};
use ethers::types::{Address, Log, TxHash, H256, U256};

/// Which certificate event a log decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateEventKind {
    Issued,
    Revoked,
}

/// Typed fields of one decoded certificate event.
#[derive(Debug, Clone)]
pub struct DecodedCertificateEvent {
    pub kind: CertificateEventKind,
    pub token_id: U256,
    pub issuer: Address,
    /// Present on `CertificateIssued` only.
    pub recipient: Option<Address>,
}

/// Encodes an address as a 32-byte indexed-event topic.
pub fn address_topic(address: Address) -> H256 {
    let mut bytes = [0u8; 32];
    bytes[12..].copy_from_slice(address.as_bytes());
    H256::from(bytes)
}

/// Encodes a uint256 as a 32-byte indexed-event topic.
#[allow(dead_code)]
pub fn uint_topic(value: U256) -> H256 {
    let mut bytes = [0u8; 32];
    value.to_big_endian(&mut bytes);
    H256::from(bytes)
}

/// Topic0 hash of `CertificateIssued`.
pub fn issued_signature(abi: &Abi) -> Result<H256, EngineError> {
    Ok(abi
        .event("CertificateIssued")
        .map_err(|e| EngineError::Abi(e.to_string()))?
        .signature())
}

/// Decodes every certificate event in `logs`, skipping logs whose topic0
/// matches neither signature.
pub fn decode_certificate_events(
    abi: &Abi,
    logs: &[Log],
) -> Result<Vec<DecodedCertificateEvent>, EngineError> {
    let issued = abi
        .event("CertificateIssued")
        .map_err(|e| EngineError::Abi(e.to_string()))?;
    let revoked = abi
        .event("CertificateRevoked")
        .map_err(|e| EngineError::Abi(e.to_string()))?;
    let issued_sig = issued.signature();
    let revoked_sig = revoked.signature();

    let mut decoded = Vec::new();
    for log in logs {
        let topic0 = match log.topics.first() {
            Some(topic) => *topic,
            None => continue,
        };
        let (event, kind) = if topic0 == issued_sig {
            (issued, CertificateEventKind::Issued)
        } else if topic0 == revoked_sig {
            (revoked, CertificateEventKind::Revoked)
        } else {
            continue;
        };

        let raw = RawLog {
            topics: log.topics.clone(),
            data: log.data.to_vec(),
        };
        let parsed = event
            .parse_log(raw)
            .map_err(|e| EngineError::Abi(format!("undecodable certificate event: {}", e)))?;

        let mut token_id = None;
        let mut issuer = None;
        let mut recipient = None;
        for param in parsed.params {
            match param.name.as_str() {
                "tokenId" => token_id = param.value.into_uint(),
                "issuer" => issuer = param.value.into_address(),
                "recipient" => recipient = param.value.into_address(),
                _ => {}
            }
        }
        let (token_id, issuer) = match (token_id, issuer) {
            (Some(t), Some(i)) => (t, i),
            _ => {
                return Err(EngineError::Abi(
                    "certificate event missing tokenId or issuer".to_string(),
                ))
            }
        };
        decoded.push(DecodedCertificateEvent {
            kind,
            token_id,
            issuer,
            recipient,
        });
    }
    Ok(decoded)
}

/// Like `decode_certificate_events`, but a confirmed transaction with zero
/// matching events is a fatal inconsistency.
pub fn require_certificate_events(
    abi: &Abi,
    logs: &[Log],
    tx_hash: TxHash,
) -> Result<Vec<DecodedCertificateEvent>, EngineError> {
    let decoded = decode_certificate_events(abi, logs)?;
    if decoded.is_empty() {
        return Err(EngineError::MintEventNotFound(format!("{:?}", tx_hash)));
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Bytes;
    use std::str::FromStr;

    fn abi() -> Abi {
        Abi::load(include_bytes!("../abi/Certificate.json") as &[u8]).unwrap()
    }

    fn issuer() -> Address {
        Address::from_str("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap()
    }

    fn recipient() -> Address {
        Address::from_str("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa").unwrap()
    }

    fn issued_log(abi: &Abi, token_id: u64) -> Log {
        Log {
            topics: vec![
                issued_signature(abi).unwrap(),
                uint_topic(U256::from(token_id)),
                address_topic(issuer()),
                address_topic(recipient()),
            ],
            data: Bytes::default(),
            ..Default::default()
        }
    }

    fn revoked_log(abi: &Abi, token_id: u64) -> Log {
        let sig = abi.event("CertificateRevoked").unwrap().signature();
        Log {
            topics: vec![
                sig,
                uint_topic(U256::from(token_id)),
                address_topic(issuer()),
            ],
            data: Bytes::default(),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_issued_event() {
        let abi = abi();
        let decoded = decode_certificate_events(&abi, &[issued_log(&abi, 42)]).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].kind, CertificateEventKind::Issued);
        assert_eq!(decoded[0].token_id, U256::from(42u64));
        assert_eq!(decoded[0].issuer, issuer());
        assert_eq!(decoded[0].recipient, Some(recipient()));
    }

    #[test]
    fn test_decode_revoked_event_has_no_recipient() {
        let abi = abi();
        let decoded = decode_certificate_events(&abi, &[revoked_log(&abi, 7)]).unwrap();
        assert_eq!(decoded[0].kind, CertificateEventKind::Revoked);
        assert_eq!(decoded[0].token_id, U256::from(7u64));
        assert_eq!(decoded[0].recipient, None);
    }

    #[test]
    fn test_unrelated_logs_are_skipped() {
        let abi = abi();
        let unrelated = Log {
            topics: vec![H256::repeat_byte(0xfe)],
            data: Bytes::default(),
            ..Default::default()
        };
        let decoded =
            decode_certificate_events(&abi, &[unrelated, issued_log(&abi, 3)]).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].token_id, U256::from(3u64));
    }

    #[test]
    fn test_zero_matching_logs_is_fatal() {
        let abi = abi();
        let tx_hash = TxHash::repeat_byte(0xab);
        let result = require_certificate_events(&abi, &[], tx_hash);
        assert!(matches!(result, Err(EngineError::MintEventNotFound(_))));
    }
}
