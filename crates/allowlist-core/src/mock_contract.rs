//! Mock Contract
//!
//! In-process [`AllowlistContract`] used by the manager and service tests.

use crate::address::Address;
use crate::contract::{AllowlistContract, ContractError, TxReceipt};
use crate::leaf::{keccak256, Root, ZERO_ROOT};
use crate::proof::{verify_address, Proof};
use parking_lot::Mutex;

/// In-process stand-in for the NFT contract.
///
/// Enforces owner-only writes the way the contract would (by reverting) and
/// verifies membership with the same sorted-pair fold. Failure injection
/// lets tests exercise the unpublished and diverged paths.
#[derive(Debug)]
pub struct MockContract {
    signer: Option<Address>,
    state: Mutex<MockState>,
}

#[derive(Debug)]
struct MockState {
    owner: Address,
    whitelist_only: bool,
    merkle_root: Root,
    root_history: Vec<Root>,
    fail_next_write: bool,
    nonce: u64,
}

impl MockContract {
    /// Deployed by `owner`, signing as `signer`, gating enabled, zero root
    #[must_use]
    pub fn new(owner: Address, signer: Option<Address>) -> Self {
        Self {
            signer,
            state: Mutex::new(MockState {
                owner,
                whitelist_only: true,
                merkle_root: ZERO_ROOT,
                root_history: Vec::new(),
                fail_next_write: false,
                nonce: 0,
            }),
        }
    }

    /// Contract where the signer is the owner
    #[must_use]
    pub fn owned_by(owner: Address) -> Self {
        Self::new(owner, Some(owner))
    }

    /// Overwrite the stored root directly (another client, a redeploy)
    pub fn force_root(&self, root: Root) {
        self.state.lock().merkle_root = root;
    }

    /// Make the next write transaction fail
    pub fn fail_next_write(&self) {
        self.state.lock().fail_next_write = true;
    }

    /// Every root set through `set_merkle_root`, in confirmation order
    #[must_use]
    pub fn root_history(&self) -> Vec<Root> {
        self.state.lock().root_history.clone()
    }

    /// Current stored root without going through the port
    #[must_use]
    pub fn stored_root(&self) -> Root {
        self.state.lock().merkle_root
    }

    fn write(&self, apply: impl FnOnce(&mut MockState)) -> Result<TxReceipt, ContractError> {
        let sender = self.signer.ok_or(ContractError::NoSigner)?;
        let mut state = self.state.lock();

        state.nonce += 1;
        let tx_hash = keccak256(&state.nonce.to_be_bytes());

        if std::mem::take(&mut state.fail_next_write) {
            return Err(ContractError::TransactionFailed("injected failure".into()));
        }
        if sender != state.owner {
            return Err(ContractError::Reverted(crate::leaf::to_hex(&tx_hash)));
        }

        apply(&mut state);
        Ok(TxReceipt {
            tx_hash,
            success: true,
        })
    }
}

impl AllowlistContract for MockContract {
    fn signer(&self) -> Option<Address> {
        self.signer
    }

    async fn owner(&self) -> Result<Address, ContractError> {
        Ok(self.state.lock().owner)
    }

    async fn whitelist_only(&self) -> Result<bool, ContractError> {
        Ok(self.state.lock().whitelist_only)
    }

    async fn merkle_root(&self) -> Result<Root, ContractError> {
        Ok(self.state.lock().merkle_root)
    }

    async fn set_merkle_root(&self, root: Root) -> Result<TxReceipt, ContractError> {
        tokio::task::yield_now().await;
        self.write(|state| {
            state.merkle_root = root;
            state.root_history.push(root);
        })
    }

    async fn set_whitelist_only(&self, enabled: bool) -> Result<TxReceipt, ContractError> {
        self.write(|state| state.whitelist_only = enabled)
    }

    async fn is_whitelisted(&self, address: Address, proof: &Proof) -> Result<bool, ContractError> {
        let root = self.state.lock().merkle_root;
        Ok(verify_address(&address, proof, &root))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[tokio::test]
    async fn test_owner_can_set_root() {
        let contract = MockContract::owned_by(addr(1));
        let receipt = contract.set_merkle_root([9; 32]).await.unwrap();

        assert!(receipt.success);
        assert_eq!(contract.merkle_root().await.unwrap(), [9; 32]);
        assert_eq!(contract.root_history(), vec![[9; 32]]);
    }

    #[tokio::test]
    async fn test_non_owner_write_reverts() {
        let contract = MockContract::new(addr(1), Some(addr(2)));
        let result = contract.set_whitelist_only(false).await;

        assert!(matches!(result, Err(ContractError::Reverted(_))));
        assert!(contract.whitelist_only().await.unwrap());
    }

    #[tokio::test]
    async fn test_write_without_signer() {
        let contract = MockContract::new(addr(1), None);
        assert!(matches!(
            contract.set_merkle_root([1; 32]).await,
            Err(ContractError::NoSigner)
        ));
    }

    #[tokio::test]
    async fn test_injected_failure_is_one_shot() {
        let contract = MockContract::owned_by(addr(1));
        contract.fail_next_write();

        assert!(contract.set_merkle_root([1; 32]).await.is_err());
        assert_eq!(contract.stored_root(), ZERO_ROOT);
        assert!(contract.set_merkle_root([1; 32]).await.is_ok());
    }

    #[tokio::test]
    async fn test_is_whitelisted_single_member() {
        let contract = MockContract::owned_by(addr(1));
        contract.force_root(crate::leaf::leaf_hash(&addr(5)));

        assert!(contract.is_whitelisted(addr(5), &Proof::default()).await.unwrap());
        assert!(!contract.is_whitelisted(addr(6), &Proof::default()).await.unwrap());
    }
}
