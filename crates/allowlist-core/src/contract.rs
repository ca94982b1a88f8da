//! Contract Port
//!
//! The capabilities the allowlist needs from the deployed NFT contract.
//! Transport, signing and gas policy live in the implementation.
//!
//! Implementations:
//! - `EthereumContract` in the service crate (alloy)
//! - [`MockContract`](crate::mock_contract::MockContract) for tests and demos

use crate::address::Address;
use crate::leaf::Root;
use crate::proof::Proof;
use std::future::Future;

/// Outcome of a confirmed (or definitively failed) transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: [u8; 32],
    pub success: bool,
}

/// Port for the allowlist-gated NFT contract.
///
/// Write methods resolve only once the transaction is confirmed or has
/// definitively failed; a caller can rely on that for ordering.
pub trait AllowlistContract: Send + Sync {
    /// Account that signs write transactions, if any
    fn signer(&self) -> Option<Address>;

    /// Privileged administrator
    fn owner(&self) -> impl Future<Output = Result<Address, ContractError>> + Send;

    /// Whether allowlist gating is enforced
    fn whitelist_only(&self) -> impl Future<Output = Result<bool, ContractError>> + Send;

    /// Currently authoritative root
    fn merkle_root(&self) -> impl Future<Output = Result<Root, ContractError>> + Send;

    /// Replace the authoritative root (owner only)
    fn set_merkle_root(
        &self,
        root: Root,
    ) -> impl Future<Output = Result<TxReceipt, ContractError>> + Send;

    /// Toggle enforcement (owner only)
    fn set_whitelist_only(
        &self,
        enabled: bool,
    ) -> impl Future<Output = Result<TxReceipt, ContractError>> + Send;

    /// Authoritative membership check
    fn is_whitelisted(
        &self,
        address: Address,
        proof: &Proof,
    ) -> impl Future<Output = Result<bool, ContractError>> + Send;
}

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("no signer configured for write transactions")]
    NoSigner,

    #[error("transaction {0} reverted")]
    Reverted(String),

    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    #[error("RPC error: {0}")]
    Rpc(String),
}
