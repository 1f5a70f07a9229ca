// src/blockchain/chain_client.rs
//! Chain client for the Certificate contract.
//!
//! Holds one JSON-RPC connection and one contract binding (address + ABI),
//! with an optional signing key. Reads never require a signer and work in
//! read-only deployments; writes fail with `NoSignerConfigured` when no
//! private key was supplied. Every address that enters this layer passes
//! the EVM format check before any network call is made.

use crate::config::Settings;
use crate::error::EngineError;
use ethers::abi::{Abi, Detokenize, Tokenize};
use ethers::contract::{Contract, ContractCall};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, JsonRpcClient, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Filter, Log, U256};
use std::sync::Arc;
use std::time::Duration;

/// Certificate contract ABI, fixed at compile time. Validated against the
/// live contract at boot via `validate_abi`.
const CERTIFICATE_ABI: &[u8] = include_bytes!("../abi/Certificate.json");

/// How often pending transactions are polled for a receipt.
const POLL_INTERVAL: Duration = Duration::from_millis(2_000);

/// Middleware stack used for signed writes.
pub type SignerClient<P = Http> = SignerMiddleware<Provider<P>, LocalWallet>;

/// A prepared, not-yet-sent write against the Certificate contract.
pub type WriteCall<P = Http> = ContractCall<SignerClient<P>, ()>;

/// Client for the Certificate contract on one EVM chain.
///
/// Generic over the JSON-RPC transport so tests can drive the stack through
/// an in-memory mock; production code uses the `Http` default throughout.
///
/// The provider and signer are shared, read-mostly resources; no locking is
/// needed because the node's nonce sequencing serializes writes from one
/// signer. Run one engine instance per signer address.
pub struct ChainClient<P: JsonRpcClient = Http> {
    provider: Provider<P>,
    /// Read-bound contract instance; usable without a signer.
    contract: Contract<Provider<P>>,
    /// Signer-bound contract instance, present only when a key was supplied.
    signer_contract: Option<Contract<SignerClient<P>>>,
    signer_address: Option<Address>,
    contract_address: Address,
    abi: Abi,
}

impl ChainClient {
    /// Connects to the RPC endpoint and binds the Certificate contract.
    ///
    /// When `settings.private_key` is present the chain ID is fetched from
    /// the node and a signing middleware is layered on; otherwise the client
    /// comes up read-only.
    pub async fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let provider = Provider::<Http>::try_from(settings.rpc_url.as_str())?
            .interval(POLL_INTERVAL);
        let contract_address = Self::parse_address(&settings.contract_address)?;
        let abi = Abi::load(CERTIFICATE_ABI)?;

        let contract = Contract::new(contract_address, abi.clone(), Arc::new(provider.clone()));

        let (signer_contract, signer_address) = match &settings.private_key {
            Some(key) => {
                let chain_id = provider.get_chainid().await?.as_u64();
                let wallet: LocalWallet =
                    key.trim_start_matches("0x").parse::<LocalWallet>()?.with_chain_id(chain_id);
                let signer_address = wallet.address();
                let middleware = SignerMiddleware::new(provider.clone(), wallet);
                let signer_contract =
                    Contract::new(contract_address, abi.clone(), Arc::new(middleware));
                log::info!(
                    "chain client connected chain_id={} signer=0x{:x}",
                    chain_id,
                    signer_address
                );
                (Some(signer_contract), Some(signer_address))
            }
            None => {
                log::info!("chain client connected in read-only mode (no PRIVATE_KEY)");
                (None, None)
            }
        };

        Ok(ChainClient {
            provider,
            contract,
            signer_contract,
            signer_address,
            contract_address,
            abi,
        })
    }

    /// Checks the EVM address format, failing fast with `InvalidAddress`
    /// before anything touches the network.
    pub fn parse_address(input: &str) -> Result<Address, EngineError> {
        input
            .parse::<Address>()
            .map_err(|_| EngineError::InvalidAddress(input.to_string()))
    }

    /// Builds a read-only client without touching the network. Test-only:
    /// the provider points at an unreachable endpoint.
    #[cfg(test)]
    pub fn read_only_for_tests(contract_address: Address) -> Self {
        let provider = Provider::<Http>::try_from("http://localhost:0").unwrap();
        let abi = Abi::load(CERTIFICATE_ABI).unwrap();
        let contract = Contract::new(contract_address, abi.clone(), Arc::new(provider.clone()));
        ChainClient {
            provider,
            contract,
            signer_contract: None,
            signer_address: None,
            contract_address,
            abi,
        }
    }
}

#[cfg(test)]
impl ChainClient<ethers::providers::MockProvider> {
    /// Builds a signer-bound client over an in-memory transport. Returns the
    /// mock handle so tests can queue responses; an exhausted queue fails
    /// the next request, so a test that queues only its expected reads also
    /// proves nothing further was sent.
    pub fn mocked_with_signer() -> (Self, ethers::providers::MockProvider) {
        let (provider, mock) = Provider::<ethers::providers::MockProvider>::mocked();
        let abi = Abi::load(CERTIFICATE_ABI).unwrap();
        let contract_address = Address::from_low_u64_be(0xCE47);
        let contract = Contract::new(contract_address, abi.clone(), Arc::new(provider.clone()));
        let wallet: LocalWallet =
            "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"
                .parse()
                .unwrap();
        let signer_address = wallet.address();
        let middleware = SignerMiddleware::new(provider.clone(), wallet);
        let signer_contract = Contract::new(contract_address, abi.clone(), Arc::new(middleware));
        let client = ChainClient {
            provider,
            contract,
            signer_contract: Some(signer_contract),
            signer_address: Some(signer_address),
            contract_address,
            abi,
        };
        (client, mock)
    }
}

impl<P: JsonRpcClient> ChainClient<P> {
    /// Address of the configured signer, if any.
    pub fn signer_address(&self) -> Option<Address> {
        self.signer_address
    }

    pub fn contract_address(&self) -> Address {
        self.contract_address
    }

    pub fn abi(&self) -> &Abi {
        &self.abi
    }

    /// Calls a read-only contract method.
    pub async fn read<T: Tokenize, R: Detokenize>(
        &self,
        method: &str,
        args: T,
    ) -> Result<R, EngineError> {
        let call = self
            .contract
            .method::<T, R>(method, args)
            .map_err(|e| EngineError::Abi(e.to_string()))?;
        call.call()
            .await
            .map_err(|e| EngineError::classify_chain(e.to_string()))
    }

    /// Prepares a write call against the signer-bound contract. The call is
    /// not sent; gas policy and submission are the caller's next steps.
    pub fn write_call<T: Tokenize>(
        &self,
        method: &str,
        args: T,
    ) -> Result<WriteCall<P>, EngineError> {
        let contract = self
            .signer_contract
            .as_ref()
            .ok_or(EngineError::NoSignerConfigured)?;
        contract
            .method::<T, ()>(method, args)
            .map_err(|e| EngineError::Abi(e.to_string()))
    }

    /// Validates the compiled-in ABI against the live contract by invoking
    /// one known read. Called once at boot so an ABI/deployment mismatch
    /// fails fast instead of surfacing as decode errors under load.
    pub async fn validate_abi(&self) -> Result<U256, EngineError> {
        self.read::<_, U256>("totalSupply", ()).await
    }

    /// Latest block number the node knows about.
    pub async fn latest_block(&self) -> Result<u64, EngineError> {
        self.provider
            .get_block_number()
            .await
            .map(|n| n.as_u64())
            .map_err(|e| EngineError::NetworkError(e.to_string()))
    }

    /// Fetches event logs matching `filter`.
    pub async fn logs(&self, filter: &Filter) -> Result<Vec<Log>, EngineError> {
        self.provider
            .get_logs(filter)
            .await
            .map_err(|e| EngineError::NetworkError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address_accepts_mixed_case() {
        let lower = ChainClient::parse_address("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        let mixed = ChainClient::parse_address("0xAaAaAAaaaaAAAAaaaaAaaaaaaaAAaaaaaaAaaaaA");
        assert_eq!(lower.unwrap(), mixed.unwrap());
    }

    #[test]
    fn test_parse_address_rejects_malformed_input() {
        for bad in ["", "0x12", "not-an-address", "0xZZaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaZZ"] {
            match ChainClient::parse_address(bad) {
                Err(EngineError::InvalidAddress(input)) => assert_eq!(input, bad),
                other => panic!("expected InvalidAddress for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn test_write_without_signer_is_rejected() {
        let client = ChainClient::read_only_for_tests(Address::zero());
        let result = client.write_call("revokeCertificate", U256::from(1u64));
        assert!(matches!(result, Err(EngineError::NoSignerConfigured)));
    }

    #[test]
    fn test_compiled_abi_loads() {
        let abi = Abi::load(CERTIFICATE_ABI).unwrap();
        assert!(abi.function("mintCertificate").is_ok());
        assert!(abi.function("getCertificate").is_ok());
        assert!(abi.event("CertificateIssued").is_ok());
        assert!(abi.event("CertificateRevoked").is_ok());
    }
}
