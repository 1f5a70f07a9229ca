// src/config.rs
//! Runtime settings for the certificate engine.
//!
//! Settings are loaded from environment variables (layered on top of the
//! defaults below), with `.env` support via dotenv in `main`. The only
//! required variable is `CONTRACT_ADDRESS`; a deployment without
//! `PRIVATE_KEY` comes up in read-only mode, able to serve every
//! verification route but rejecting mints and revocations.

use config::builder::{ConfigBuilder, DefaultState};
use config::{Config, ConfigError, Environment};
use serde::Deserialize;
use std::time::Duration;

/// Polygon Amoy public RPC endpoint, used when RPC_URL is not set.
const DEFAULT_RPC_URL: &str = "https://rpc-amoy.polygon.technology";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// JSON-RPC endpoint of the chain node.
    pub rpc_url: String,

    /// Address of the deployed Certificate contract.
    pub contract_address: String,

    /// Hex-encoded signing key. Absent in read-only deployments.
    #[serde(default)]
    pub private_key: Option<String>,

    /// Blocks mined on top before a mutation is considered final. Amoy sees
    /// occasional reorgs of depth 1, so the default waits for 2.
    pub confirmations: usize,

    /// Upper bound on how long one mutation may wait for confirmation.
    pub tx_timeout_secs: u64,

    /// Socket address the API server binds to.
    pub bind_address: String,

    /// Rolling block window scanned by the issuer event-log query.
    pub scan_window_blocks: u64,

    /// Bounded parallelism for batch verification lookups.
    pub batch_concurrency: usize,
}

impl Settings {
    /// Loads settings from the process environment on top of defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::builder()?
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Config::builder()
            .set_default("rpc_url", DEFAULT_RPC_URL)?
            .set_default("confirmations", 2_i64)?
            .set_default("tx_timeout_secs", 120_i64)?
            .set_default("bind_address", "127.0.0.1:3000")?
            .set_default("scan_window_blocks", 10_000_i64)?
            .set_default("batch_concurrency", 8_i64)
    }

    /// Confirmation-wait timeout as a `Duration`.
    pub fn tx_timeout(&self) -> Duration {
        Duration::from_secs(self.tx_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings_with(contract: &str) -> Settings {
        Settings::builder()
            .unwrap()
            .set_override("contract_address", contract)
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let settings = settings_with("0x5FbDB2315678afecb367f032d93F642f64180aa3");
        assert_eq!(settings.rpc_url, DEFAULT_RPC_URL);
        assert_eq!(settings.confirmations, 2);
        assert_eq!(settings.tx_timeout(), Duration::from_secs(120));
        assert_eq!(settings.scan_window_blocks, 10_000);
        assert_eq!(settings.batch_concurrency, 8);
        assert!(settings.private_key.is_none());
    }

    #[test]
    fn test_contract_address_required() {
        let result = Settings::builder()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize::<Settings>();
        assert!(result.is_err());
    }
}
