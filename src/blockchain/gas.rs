// src/blockchain/gas.rs
//! Gas policy for contract writes.
//!
//! The limit is always the node's live estimate plus a 20% margin. Writes
//! carrying several string fields have been observed to land close to the
//! raw estimate, so the margin is applied unconditionally. When estimation
//! itself fails the call would revert, and the send is never attempted.

use crate::error::{revert_reason, EngineError};
use ethers::abi::Detokenize;
use ethers::contract::ContractCall;
use ethers::providers::Middleware;
use ethers::types::U256;

/// Applies the 20% safety margin: `ceil(estimate * 1.2)` in integer
/// arithmetic.
pub fn with_margin(estimate: U256) -> U256 {
    (estimate * U256::from(12u64) + U256::from(9u64)) / U256::from(10u64)
}

/// Obtains a live gas estimate for `call` and returns the margined limit.
///
/// An estimation failure is surfaced as `GasEstimationFailed` carrying the
/// revert reason when the node supplies one; the margin is never computed
/// from a failed estimate.
pub async fn limit_for<M, D>(call: &ContractCall<M, D>) -> Result<U256, EngineError>
where
    M: Middleware,
    D: Detokenize,
{
    let estimate = call.estimate_gas().await.map_err(|e| {
        let message = e.to_string();
        if message.to_lowercase().contains("insufficient funds") {
            EngineError::InsufficientFunds
        } else {
            EngineError::GasEstimationFailed(revert_reason(&message).unwrap_or(message))
        }
    })?;
    Ok(with_margin(estimate))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_margin_is_exact_on_multiples_of_ten() {
        assert_eq!(with_margin(U256::from(100u64)), U256::from(120u64));
        assert_eq!(with_margin(U256::from(250_000u64)), U256::from(300_000u64));
    }

    #[test]
    fn test_margin_rounds_up() {
        // ceil(1 * 1.2) = 2, ceil(101 * 1.2) = 122, ceil(21001 * 1.2) = 25202
        assert_eq!(with_margin(U256::from(1u64)), U256::from(2u64));
        assert_eq!(with_margin(U256::from(101u64)), U256::from(122u64));
        assert_eq!(with_margin(U256::from(21_001u64)), U256::from(25_202u64));
    }

    #[test]
    fn test_margin_of_zero_is_zero() {
        assert_eq!(with_margin(U256::zero()), U256::zero());
    }
}
