//! Transaction Submitter
//!
//! alloy-backed [`AllowlistContract`] for the deployed NFT contract.
//! Reads go through a plain HTTP provider; writes are signed locally and
//! only resolve once the receipt has the configured confirmations.

use allowlist_core::{AllowlistContract, ContractError, Proof, Root, TxReceipt};
use alloy::{
    network::EthereumWallet,
    primitives::{Address as EthAddress, B256, U256},
    providers::{Provider, ProviderBuilder},
    signers::local::PrivateKeySigner,
    sol,
};
use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

// Generate contract bindings from ABI
sol! {
    #[sol(rpc)]
    contract AllowlistNft {
        function owner() external view returns (address);
        function whitelistOnly() external view returns (bool);
        function merkleRoot() external view returns (bytes32);
        function setMerkleRoot(bytes32 root) external;
        function setWhitelistOnly(bool enabled) external;
        function isWhitelisted(address account, bytes32[] calldata proof) external view returns (bool);
    }
}

/// Submitter configuration
#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    /// JSON-RPC URL
    pub rpc_url: String,
    /// Contract address
    pub contract_address: String,
    /// Private key for signing transactions (hex, `0x` optional)
    pub private_key: Option<String>,
    /// Max gas price in Gwei
    pub max_gas_price_gwei: u64,
    /// Confirmations to wait for before a write resolves
    pub confirmations: u64,
}

/// Contract client
#[derive(Debug)]
pub struct Submitter {
    config: SubmitterConfig,
    rpc_url: reqwest::Url,
    contract_address: EthAddress,
    signer: Option<PrivateKeySigner>,
}

fn rpc_error(e: impl std::fmt::Display) -> ContractError {
    ContractError::Rpc(e.to_string())
}

fn to_core_address(address: EthAddress) -> allowlist_core::Address {
    allowlist_core::Address::new(address.0 .0)
}

fn to_eth_address(address: allowlist_core::Address) -> EthAddress {
    EthAddress::from(address.into_bytes())
}

impl Submitter {
    /// Create a read-only submitter (no signer)
    pub fn new(config: SubmitterConfig) -> Result<Self> {
        let contract_address: EthAddress = config
            .contract_address
            .parse()
            .context("Invalid contract address")?;
        let rpc_url: reqwest::Url = config.rpc_url.parse().context("Invalid RPC URL")?;

        Ok(Self {
            config,
            rpc_url,
            contract_address,
            signer: None,
        })
    }

    /// Create a submitter with a signer (can submit transactions)
    pub fn with_signer(config: SubmitterConfig) -> Result<Self> {
        let private_key = config
            .private_key
            .clone()
            .context("Private key required for signing")?;

        let key_bytes = private_key.strip_prefix("0x").unwrap_or(&private_key);
        let signer: PrivateKeySigner = key_bytes.parse().context("Invalid private key")?;

        info!(
            address = %signer.address(),
            "Submitter initialized with signer"
        );

        let mut submitter = Self::new(config)?;
        submitter.signer = Some(signer);
        Ok(submitter)
    }

    /// Get the signer address (if configured)
    pub fn signer_address(&self) -> Option<EthAddress> {
        self.signer.as_ref().map(PrivateKeySigner::address)
    }

    fn max_gas_price_wei(&self) -> U256 {
        U256::from(self.config.max_gas_price_gwei) * U256::from(1_000_000_000u64)
    }

    /// Send a signed write and wait for its receipt.
    async fn send_write(&self, call: WriteCall) -> Result<TxReceipt, ContractError> {
        let signer = self.signer.as_ref().ok_or(ContractError::NoSigner)?;

        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());

        let gas_price = provider.get_gas_price().await.map_err(rpc_error)?;
        if U256::from(gas_price) > self.max_gas_price_wei() {
            return Err(ContractError::TransactionFailed(format!(
                "gas price {} gwei exceeds maximum {} gwei",
                gas_price / 1_000_000_000,
                self.config.max_gas_price_gwei
            )));
        }

        let contract = AllowlistNft::new(self.contract_address, &provider);
        let pending_tx = match call {
            WriteCall::SetMerkleRoot(root) => {
                contract.setMerkleRoot(B256::from(root)).send().await
            }
            WriteCall::SetWhitelistOnly(enabled) => {
                contract.setWhitelistOnly(enabled).send().await
            }
        }
        .map_err(|e| ContractError::TransactionFailed(e.to_string()))?;

        let tx_hash = *pending_tx.tx_hash();
        info!(tx_hash = %tx_hash, "Transaction submitted");

        let confirmations = self.config.confirmations.max(1);
        debug!(confirmations, "Waiting for confirmations");
        let receipt = pending_tx
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(rpc_error)?;

        if receipt.status() {
            info!(
                tx_hash = %tx_hash,
                gas_used = receipt.gas_used,
                "Transaction confirmed"
            );
        } else {
            warn!(tx_hash = %tx_hash, "Transaction reverted");
        }

        Ok(TxReceipt {
            tx_hash: tx_hash.0,
            success: receipt.status(),
        })
    }
}

enum WriteCall {
    SetMerkleRoot(Root),
    SetWhitelistOnly(bool),
}

impl AllowlistContract for Submitter {
    fn signer(&self) -> Option<allowlist_core::Address> {
        self.signer_address().map(to_core_address)
    }

    #[instrument(skip(self))]
    async fn owner(&self) -> Result<allowlist_core::Address, ContractError> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = AllowlistNft::new(self.contract_address, &provider);
        let owner: EthAddress = contract.owner().call().await.map_err(rpc_error)?;
        Ok(to_core_address(owner))
    }

    #[instrument(skip(self))]
    async fn whitelist_only(&self) -> Result<bool, ContractError> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = AllowlistNft::new(self.contract_address, &provider);
        let enabled: bool = contract.whitelistOnly().call().await.map_err(rpc_error)?;
        Ok(enabled)
    }

    #[instrument(skip(self))]
    async fn merkle_root(&self) -> Result<Root, ContractError> {
        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = AllowlistNft::new(self.contract_address, &provider);
        let root: B256 = contract.merkleRoot().call().await.map_err(rpc_error)?;
        Ok(root.0)
    }

    #[instrument(skip(self, root), fields(root = %allowlist_core::to_hex(&root)))]
    async fn set_merkle_root(&self, root: Root) -> Result<TxReceipt, ContractError> {
        self.send_write(WriteCall::SetMerkleRoot(root)).await
    }

    #[instrument(skip(self))]
    async fn set_whitelist_only(&self, enabled: bool) -> Result<TxReceipt, ContractError> {
        self.send_write(WriteCall::SetWhitelistOnly(enabled)).await
    }

    #[instrument(skip(self, proof), fields(proof_len = proof.len()))]
    async fn is_whitelisted(
        &self,
        address: allowlist_core::Address,
        proof: &Proof,
    ) -> Result<bool, ContractError> {
        let siblings: Vec<B256> = proof.siblings().iter().copied().map(B256::from).collect();

        let provider = ProviderBuilder::new().connect_http(self.rpc_url.clone());
        let contract = AllowlistNft::new(self.contract_address, &provider);
        let verdict: bool = contract
            .isWhitelisted(to_eth_address(address), siblings)
            .call()
            .await
            .map_err(rpc_error)?;

        debug!(%address, verdict, "Checked on-chain membership");
        Ok(verdict)
    }
}
