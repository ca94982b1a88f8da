//! Allowlist Store
//!
//! The authoritative member set and access-request queue. Every successful
//! mutation is written through the persistence port before it becomes
//! visible in memory, and the Merkle tree is rebuilt from scratch.

use crate::address::Address;
use crate::error::{AllowlistError, Result};
use crate::leaf::{leaf_hash, Root};
use crate::persistence::PersistencePort;
use crate::proof::ProofBundle;
use crate::tree::AllowlistTree;
use crate::types::{
    AllowlistSnapshot, ImportMode, ImportSummary, PendingRequest, PersistedAllowlist,
};
use chrono::Utc;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct StoreState {
    members: BTreeSet<Address>,
    requests: Vec<PendingRequest>,
    published_root: Option<Root>,
}

impl StoreState {
    fn from_persisted(persisted: PersistedAllowlist) -> Self {
        Self {
            members: persisted.addresses.into_iter().collect(),
            requests: persisted.requests,
            published_root: persisted.published_root,
        }
    }

    fn to_persisted(&self, version: u64) -> PersistedAllowlist {
        PersistedAllowlist {
            version,
            addresses: self.members.iter().copied().collect(),
            requests: self.requests.clone(),
            published_root: self.published_root,
        }
    }
}

/// Owned allowlist with an injected persistence backend.
pub struct AllowlistStore {
    backend: Box<dyn PersistencePort>,
    state: StoreState,
    version: u64,
    tree: Option<AllowlistTree>,
}

impl std::fmt::Debug for AllowlistStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowlistStore")
            .field("members", &self.state.members.len())
            .field("requests", &self.state.requests.len())
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

impl AllowlistStore {
    /// Open the store, loading any previously persisted state.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn open(backend: impl PersistencePort + 'static) -> Result<Self> {
        let mut store = Self {
            backend: Box::new(backend),
            state: StoreState::default(),
            version: 0,
            tree: None,
        };
        store.reload()?;
        info!(
            members = store.len(),
            requests = store.state.requests.len(),
            version = store.version,
            "Opened allowlist store"
        );
        Ok(store)
    }

    /// Discard in-memory state and re-read the backend.
    ///
    /// This is the recovery path after a [`AllowlistError::StoreVersionConflict`].
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub fn reload(&mut self) -> Result<()> {
        let persisted = self.backend.read()?.unwrap_or_default();
        self.version = persisted.version;
        self.state = StoreState::from_persisted(persisted);
        self.rebuild_tree();
        Ok(())
    }

    /// Write `next` through the backend, then adopt it.
    ///
    /// Fails without touching memory if another writer bumped the version.
    fn commit(&mut self, next: StoreState) -> Result<()> {
        let found = self.backend.read()?.map_or(0, |s| s.version);
        if found != self.version {
            warn!(expected = self.version, found, "Allowlist store version conflict");
            return Err(AllowlistError::StoreVersionConflict {
                expected: self.version,
                found,
            });
        }

        let version = self.version + 1;
        self.backend.write(&next.to_persisted(version))?;

        let members_changed = next.members != self.state.members;
        self.state = next;
        self.version = version;
        if members_changed {
            self.rebuild_tree();
        }
        Ok(())
    }

    fn rebuild_tree(&mut self) {
        self.tree = AllowlistTree::from_addresses(&self.state.members).ok();
        debug!(
            members = self.state.members.len(),
            root = ?self.tree.as_ref().map(|t| crate::leaf::to_hex(&t.root())),
            "Rebuilt allowlist tree"
        );
    }

    /// Add one address. Returns `false` if it was already a member.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    pub fn add(&mut self, address: Address) -> Result<bool> {
        Ok(self.add_many([address])? == 1)
    }

    /// Add several addresses, returning how many were new.
    ///
    /// Nothing is written when every address is already present.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    pub fn add_many(&mut self, addresses: impl IntoIterator<Item = Address>) -> Result<usize> {
        let mut next = self.state.clone();
        let added = addresses
            .into_iter()
            .filter(|address| next.members.insert(*address))
            .count();

        if added > 0 {
            self.commit(next)?;
            info!(added, members = self.len(), "Added addresses to allowlist");
        }
        Ok(added)
    }

    /// Remove an address. Returns `false` if it was not a member.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    pub fn remove(&mut self, address: &Address) -> Result<bool> {
        if !self.state.members.contains(address) {
            return Ok(false);
        }

        let mut next = self.state.clone();
        next.members.remove(address);
        self.commit(next)?;
        info!(%address, members = self.len(), "Removed address from allowlist");
        Ok(true)
    }

    /// Whether `address` is a member
    #[must_use]
    pub fn contains(&self, address: &Address) -> bool {
        self.state.members.contains(address)
    }

    /// Members in canonical (byte) order
    #[must_use]
    pub fn list(&self) -> Vec<Address> {
        self.state.members.iter().copied().collect()
    }

    /// Number of members
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.members.len()
    }

    /// True when nobody is allowed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.members.is_empty()
    }

    /// Persisted write counter
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Bulk import from raw JSON entries.
    ///
    /// Entries that are not strings or fail the address format check are
    /// dropped. With [`ImportMode::Replace`] the current members are
    /// discarded first.
    ///
    /// # Errors
    /// Returns [`AllowlistError::NoValidAddresses`] if nothing survives
    /// validation, leaving the store untouched.
    pub fn import_bulk(
        &mut self,
        entries: &[serde_json::Value],
        mode: ImportMode,
    ) -> Result<ImportSummary> {
        let valid: Vec<Address> = entries
            .iter()
            .filter_map(|entry| entry.as_str())
            .filter_map(|s| Address::parse(s).ok())
            .collect();

        let mut summary = ImportSummary {
            accepted: valid.len(),
            rejected: entries.len() - valid.len(),
            added: 0,
        };

        if valid.is_empty() {
            return Err(AllowlistError::NoValidAddresses);
        }

        let mut next = self.state.clone();
        if mode == ImportMode::Replace {
            next.members.clear();
        }
        summary.added = valid
            .into_iter()
            .filter(|address| !self.state.members.contains(address))
            .filter(|address| next.members.insert(*address))
            .count();

        if next != self.state {
            self.commit(next)?;
        }

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            added = summary.added,
            ?mode,
            "Imported allowlist"
        );
        Ok(summary)
    }

    /// Read-only copy of the members, stamped now
    #[must_use]
    pub fn export_snapshot(&self) -> AllowlistSnapshot {
        AllowlistSnapshot {
            addresses: self.list(),
            export_date: Utc::now(),
        }
    }

    /// Current tree.
    ///
    /// # Errors
    /// Returns [`AllowlistError::EmptyAllowlist`] when there are no members.
    pub fn tree(&self) -> Result<&AllowlistTree> {
        self.tree.as_ref().ok_or(AllowlistError::EmptyAllowlist)
    }

    /// Locally computed root, `None` when the allowlist is empty
    #[must_use]
    pub fn root(&self) -> Option<Root> {
        self.tree.as_ref().map(AllowlistTree::root)
    }

    /// Proof of membership for `address` against the current tree.
    ///
    /// # Errors
    /// Returns [`AllowlistError::EmptyAllowlist`] or
    /// [`AllowlistError::LeafNotFound`].
    pub fn proof_bundle(&self, address: &Address) -> Result<ProofBundle> {
        let tree = self.tree()?;
        Ok(ProofBundle {
            address: *address,
            leaf: leaf_hash(address),
            root: tree.root(),
            proof: tree.proof_for(address)?,
        })
    }

    /// Root last confirmed on-chain
    #[must_use]
    pub fn published_root(&self) -> Option<Root> {
        self.state.published_root
    }

    /// Record that `root` was confirmed on-chain.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    pub fn mark_published(&mut self, root: Root) -> Result<()> {
        if self.state.published_root == Some(root) {
            return Ok(());
        }
        let mut next = self.state.clone();
        next.published_root = Some(root);
        self.commit(next)
    }

    /// Open access requests, oldest first
    #[must_use]
    pub fn pending_requests(&self) -> &[PendingRequest] {
        &self.state.requests
    }

    /// Queue an access request.
    ///
    /// Returns `Ok(None)` without writing if `address` already has a
    /// pending request.
    ///
    /// # Errors
    /// Returns an error if the change cannot be persisted.
    pub fn submit_request(
        &mut self,
        address: Address,
        reason: impl Into<String>,
    ) -> Result<Option<PendingRequest>> {
        if self.state.requests.iter().any(|r| r.address == address) {
            debug!(%address, "Duplicate access request ignored");
            return Ok(None);
        }

        let request = PendingRequest::new(address, reason);
        let mut next = self.state.clone();
        next.requests.push(request.clone());
        self.commit(next)?;

        info!(%address, id = %request.id, "Access request submitted");
        Ok(Some(request))
    }

    /// Approve a request: add its address and drop the request in one write.
    ///
    /// # Errors
    /// Returns [`AllowlistError::RequestNotFound`] for unknown ids.
    pub fn approve(&mut self, request_id: &str) -> Result<PendingRequest> {
        let mut next = self.state.clone();
        let request = take_request(&mut next.requests, request_id)?;
        next.members.insert(request.address);
        self.commit(next)?;

        info!(address = %request.address, id = request_id, "Access request approved");
        Ok(request)
    }

    /// Reject a request, leaving the members unchanged.
    ///
    /// # Errors
    /// Returns [`AllowlistError::RequestNotFound`] for unknown ids.
    pub fn reject(&mut self, request_id: &str) -> Result<PendingRequest> {
        let mut next = self.state.clone();
        let request = take_request(&mut next.requests, request_id)?;
        self.commit(next)?;

        info!(address = %request.address, id = request_id, "Access request rejected");
        Ok(request)
    }
}

fn take_request(requests: &mut Vec<PendingRequest>, id: &str) -> Result<PendingRequest> {
    let index = requests
        .iter()
        .position(|r| r.id == id)
        .ok_or_else(|| AllowlistError::RequestNotFound(id.to_string()))?;
    Ok(requests.remove(index))
}
