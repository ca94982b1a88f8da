//! Local/on-chain root reconciliation.

use crate::leaf::{to_hex, Root, ZERO_ROOT};
use serde::Serialize;

/// Relationship between the local allowlist and the contract's root
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Chain holds exactly the locally computed root
    Published,
    /// Chain holds the root this store last published; local has moved on
    Pending,
    /// Chain root matches nothing this store derived
    Diverged,
}

impl SyncStatus {
    /// Classify the chain root against local state.
    ///
    /// An empty allowlist is represented on-chain by [`ZERO_ROOT`]. A store
    /// that has never published expects the contract's initial zero root.
    #[must_use]
    pub fn classify(local: Option<Root>, published: Option<Root>, onchain: Root) -> Self {
        let expected = local.unwrap_or(ZERO_ROOT);
        if expected == onchain {
            Self::Published
        } else if published.unwrap_or(ZERO_ROOT) == onchain {
            Self::Pending
        } else {
            Self::Diverged
        }
    }
}

/// Reconciliation report, as surfaced to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub status: SyncStatus,
    /// Locally computed root (`None` for an empty allowlist)
    pub local_root: Option<String>,
    /// Root last confirmed by this store
    pub published_root: Option<String>,
    /// Root the contract currently holds
    pub onchain_root: String,
}

impl SyncReport {
    #[must_use]
    pub fn new(local: Option<Root>, published: Option<Root>, onchain: Root) -> Self {
        Self {
            status: SyncStatus::classify(local, published, onchain),
            local_root: local.as_ref().map(to_hex),
            published_root: published.as_ref().map(to_hex),
            onchain_root: to_hex(&onchain),
        }
    }
}
