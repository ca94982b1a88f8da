//! # Allowlist Core
//!
//! Merkle allowlist membership for allowlist-gated NFT minting.
//! - keccak-256 leaves over raw 20-byte addresses
//! - sorted-pair interior hashing, compatible with `OpenZeppelin` `MerkleProof`
//! - a persisted member store with an access-request queue
//! - root publication to the contract through [`AllowlistContract`]

pub mod address;
pub mod contract;
pub mod eligibility;
pub mod error;
pub mod leaf;
pub mod manager;
pub mod mock_contract;
pub mod persistence;
pub mod proof;
pub mod reconcile;
pub mod store;
pub mod tree;
pub mod types;

pub use address::Address;
pub use contract::{AllowlistContract, ContractError, TxReceipt};
pub use eligibility::{is_eligible, Advisory, Grant, MintEligibility};
pub use error::{AllowlistError, Result};
pub use leaf::{leaf_hash, to_hex, Hash32, Leaf, Root, ZERO_ROOT};
pub use manager::{AllowlistManager, MutationOutcome, Publication, PublicationStatus};
pub use mock_contract::MockContract;
pub use persistence::{JsonFileBackend, MemoryBackend, PersistencePort, DEFAULT_NAMESPACE};
pub use proof::{verify, verify_address, Proof, ProofBundle};
pub use reconcile::{SyncReport, SyncStatus};
pub use store::AllowlistStore;
pub use tree::AllowlistTree;
pub use types::{
    AllowlistSnapshot, ImportMode, ImportPayload, ImportSummary, PendingRequest,
};
