//! Allowlist error taxonomy.

use crate::contract::ContractError;
use crate::persistence::PersistenceError;
use thiserror::Error;

/// Errors surfaced by the allowlist subsystem.
///
/// Format and membership failures are resolved locally. `RootMismatch` and
/// `VerificationFailed` are advisory: the contract's own check decides.
#[derive(Error, Debug)]
pub enum AllowlistError {
    #[error("Invalid address format: {0:?}")]
    InvalidAddressFormat(String),

    #[error("Allowlist is empty")]
    EmptyAllowlist,

    #[error("Address {0} is not whitelisted")]
    LeafNotFound(String),

    #[error("Local root {local} does not match on-chain root {onchain}")]
    RootMismatch { local: String, onchain: String },

    #[error("Proof does not verify against root {0}")]
    VerificationFailed(String),

    #[error("Operation requires the contract owner (caller: {caller})")]
    UnauthorizedOperation { caller: String },

    #[error("Import contained no valid addresses")]
    NoValidAddresses,

    #[error("Store version conflict: expected {expected}, found {found}")]
    StoreVersionConflict { expected: u64, found: u64 },

    #[error("Request {0} not found")]
    RequestNotFound(String),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("Store task failed: {0}")]
    StoreTask(String),

    #[error(transparent)]
    Contract(#[from] ContractError),
}

impl AllowlistError {
    /// Stable machine-readable name of the variant
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidAddressFormat(_) => "invalid_address_format",
            Self::EmptyAllowlist => "empty_allowlist",
            Self::LeafNotFound(_) => "leaf_not_found",
            Self::RootMismatch { .. } => "root_mismatch",
            Self::VerificationFailed(_) => "verification_failed",
            Self::UnauthorizedOperation { .. } => "unauthorized_operation",
            Self::NoValidAddresses => "no_valid_addresses",
            Self::StoreVersionConflict { .. } => "store_version_conflict",
            Self::RequestNotFound(_) => "request_not_found",
            Self::Persistence(_) => "persistence",
            Self::StoreTask(_) => "store_task",
            Self::Contract(_) => "contract",
        }
    }
}

pub type Result<T, E = AllowlistError> = std::result::Result<T, E>;
