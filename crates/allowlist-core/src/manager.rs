//! Allowlist Manager
//!
//! Couples the [`AllowlistStore`] to the contract. Every admin mutation runs
//! under one publication lock:
//! 1. check the signer is the contract owner (before any write)
//! 2. apply the store mutation atomically
//! 3. if the root changed, push it and wait for confirmation
//! 4. record the confirmed root
//!
//! Holding the lock across step 3 means a second mutation cannot start
//! pushing until the previous transaction has confirmed or failed, so the
//! contract always ends up holding the root of the latest mutation.
//!
//! Store writes hit the persistence backend synchronously, so they run on
//! the blocking pool. A write that loses a version race reloads the store
//! before returning the conflict; the next call sees the other writer's
//! state.

use crate::address::Address;
use crate::contract::{AllowlistContract, TxReceipt};
use crate::eligibility::{is_eligible, Advisory, Grant, MintEligibility};
use crate::error::{AllowlistError, Result};
use crate::leaf::{leaf_hash, to_hex, Root, ZERO_ROOT};
use crate::proof::{opt_hex_bytes32, verify, Proof, ProofBundle};
use crate::reconcile::SyncReport;
use crate::store::AllowlistStore;
use crate::types::{AllowlistSnapshot, ImportMode, ImportSummary, PendingRequest};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Outcome of a root push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublicationStatus {
    /// Transaction confirmed; chain holds the root
    Confirmed,
    /// Transaction failed or reverted; chain unchanged
    Failed,
}

/// Record of one attempt to push a root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Publication {
    #[serde(with = "crate::proof::hex_bytes32")]
    pub root: Root,
    #[serde(with = "opt_hex_bytes32")]
    pub tx_hash: Option<[u8; 32]>,
    pub status: PublicationStatus,
    pub error: Option<String>,
}

impl Publication {
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        self.status == PublicationStatus::Confirmed
    }
}

/// Result of an admin mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MutationOutcome<T> {
    /// Operation-specific value
    pub value: T,
    /// Present when the mutation changed the root
    pub publication: Option<Publication>,
}

/// Allowlist store bound to a contract.
pub struct AllowlistManager<C> {
    store: Arc<Mutex<AllowlistStore>>,
    contract: C,
    publish_lock: tokio::sync::Mutex<()>,
}

impl<C: std::fmt::Debug> std::fmt::Debug for AllowlistManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AllowlistManager")
            .field("store", &*self.store.lock())
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl<C: AllowlistContract> AllowlistManager<C> {
    #[must_use]
    pub fn new(store: AllowlistStore, contract: C) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            contract,
            publish_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The contract handle
    pub fn contract(&self) -> &C {
        &self.contract
    }

    /// Run a read-only closure against the store
    pub fn read<R>(&self, f: impl FnOnce(&AllowlistStore) -> R) -> R {
        f(&self.store.lock())
    }

    /// Fail with `UnauthorizedOperation` unless the signer owns the contract.
    ///
    /// # Errors
    /// Returns an error if there is no signer, the signer is not the owner,
    /// or the owner cannot be read.
    pub async fn ensure_owner(&self) -> Result<Address> {
        let Some(signer) = self.contract.signer() else {
            return Err(AllowlistError::UnauthorizedOperation {
                caller: "<no signer>".to_string(),
            });
        };

        let owner = self.contract.owner().await?;
        if signer != owner {
            warn!(%signer, %owner, "Rejected admin operation from non-owner");
            return Err(AllowlistError::UnauthorizedOperation {
                caller: signer.to_string(),
            });
        }
        Ok(signer)
    }

    /// Run a store write on the blocking pool.
    ///
    /// On `StoreVersionConflict` the store is reloaded from the backend and
    /// the conflict is still returned.
    async fn write<T: Send + 'static>(
        &self,
        op: impl FnOnce(&mut AllowlistStore) -> Result<T> + Send + 'static,
    ) -> Result<T> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut store = store.lock();
            let result = op(&mut *store);
            if let Err(AllowlistError::StoreVersionConflict { .. }) = &result {
                match store.reload() {
                    Ok(()) => info!(
                        version = store.version(),
                        "Reloaded allowlist store after conflict"
                    ),
                    Err(e) => warn!(error = %e, "Failed to reload allowlist store"),
                }
            }
            result
        })
        .await
        .map_err(|e| AllowlistError::StoreTask(e.to_string()))?
    }

    /// Discard in-memory state and re-read the persisted allowlist.
    ///
    /// # Errors
    /// Returns an error if the backend cannot be read.
    pub async fn reload(&self) -> Result<()> {
        let _guard = self.publish_lock.lock().await;
        self.write(AllowlistStore::reload).await?;
        info!(version = self.read(AllowlistStore::version), "Allowlist store reloaded");
        Ok(())
    }

    /// Apply an admin mutation and publish the resulting root if it changed.
    async fn mutate<T: Send + 'static>(
        &self,
        op: impl FnOnce(&mut AllowlistStore) -> Result<T> + Send + 'static,
    ) -> Result<MutationOutcome<T>> {
        let _guard = self.publish_lock.lock().await;
        self.ensure_owner().await?;

        let (value, before, after) = self
            .write(move |store| {
                let before = store.root();
                let value = op(&mut *store)?;
                Ok((value, before, store.root()))
            })
            .await?;

        let publication = if before == after {
            None
        } else {
            Some(self.push_root(after.unwrap_or(ZERO_ROOT)).await)
        };

        Ok(MutationOutcome { value, publication })
    }

    /// Send `root` and wait for the outcome. Caller holds `publish_lock`.
    #[instrument(skip(self, root), fields(root = %to_hex(&root)))]
    async fn push_root(&self, root: Root) -> Publication {
        let result = self.contract.set_merkle_root(root).await;
        let publication = match result {
            Ok(TxReceipt {
                tx_hash,
                success: true,
            }) => Publication {
                root,
                tx_hash: Some(tx_hash),
                status: PublicationStatus::Confirmed,
                error: None,
            },
            Ok(TxReceipt { tx_hash, .. }) => Publication {
                root,
                tx_hash: Some(tx_hash),
                status: PublicationStatus::Failed,
                error: Some("transaction reverted".to_string()),
            },
            Err(e) => Publication {
                root,
                tx_hash: None,
                status: PublicationStatus::Failed,
                error: Some(e.to_string()),
            },
        };

        if publication.is_confirmed() {
            info!("Merkle root published");
            let recorded = self.write(move |store| store.mark_published(root)).await;
            if let Err(e) = recorded {
                warn!(error = %e, "Published root confirmed but not recorded locally");
            }
        } else {
            warn!(error = ?publication.error, "Merkle root publication failed");
        }
        publication
    }

    /// Add one address.
    ///
    /// # Errors
    /// Fails on a malformed address, a non-owner signer, or a storage error.
    pub async fn add(&self, address: &str) -> Result<MutationOutcome<bool>> {
        let address = Address::parse(address)?;
        self.mutate(move |store| store.add(address)).await
    }

    /// Add several addresses; all must be well-formed.
    ///
    /// # Errors
    /// Fails on the first malformed address without applying any.
    pub async fn add_many<S: AsRef<str>>(
        &self,
        addresses: &[S],
    ) -> Result<MutationOutcome<usize>> {
        let parsed = addresses
            .iter()
            .map(|a| Address::parse(a.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        self.mutate(move |store| store.add_many(parsed)).await
    }

    /// Remove one address.
    ///
    /// # Errors
    /// Fails on a malformed address, a non-owner signer, or a storage error.
    pub async fn remove(&self, address: &str) -> Result<MutationOutcome<bool>> {
        let address = Address::parse(address)?;
        self.mutate(move |store| store.remove(&address)).await
    }

    /// Bulk import, dropping malformed entries.
    ///
    /// # Errors
    /// Returns `NoValidAddresses` if nothing survives validation.
    pub async fn import(
        &self,
        entries: &[serde_json::Value],
        mode: ImportMode,
    ) -> Result<MutationOutcome<ImportSummary>> {
        let entries = entries.to_vec();
        self.mutate(move |store| store.import_bulk(&entries, mode)).await
    }

    /// Approve a pending request.
    ///
    /// # Errors
    /// Returns `RequestNotFound` for unknown ids.
    pub async fn approve(&self, request_id: &str) -> Result<MutationOutcome<PendingRequest>> {
        let request_id = request_id.to_string();
        self.mutate(move |store| store.approve(&request_id)).await
    }

    /// Reject a pending request. Never changes the root.
    ///
    /// # Errors
    /// Returns `RequestNotFound` for unknown ids.
    pub async fn reject(&self, request_id: &str) -> Result<PendingRequest> {
        let request_id = request_id.to_string();
        Ok(self.mutate(move |store| store.reject(&request_id)).await?.value)
    }

    /// Push the current local root regardless of whether it changed.
    ///
    /// The remedy for `Pending`, `Diverged` and `RootMismatch`.
    ///
    /// # Errors
    /// Returns `UnauthorizedOperation` for a non-owner signer.
    pub async fn publish(&self) -> Result<Publication> {
        let _guard = self.publish_lock.lock().await;
        self.ensure_owner().await?;
        let root = self.store.lock().root().unwrap_or(ZERO_ROOT);
        Ok(self.push_root(root).await)
    }

    /// Toggle allowlist enforcement on the contract.
    ///
    /// # Errors
    /// Returns `UnauthorizedOperation` for a non-owner signer, or the
    /// contract error if the transaction fails.
    pub async fn set_whitelist_only(&self, enabled: bool) -> Result<TxReceipt> {
        self.ensure_owner().await?;
        let receipt = self.contract.set_whitelist_only(enabled).await?;
        info!(enabled, "Whitelist enforcement updated");
        Ok(receipt)
    }

    /// Queue an access request. Returns `false` if one is already pending.
    ///
    /// # Errors
    /// Fails on a malformed address or a storage error.
    pub async fn submit_request(&self, address: &str, reason: &str) -> Result<bool> {
        let address = Address::parse(address)?;
        let reason = reason.to_string();
        let queued = self
            .write(move |store| store.submit_request(address, &reason))
            .await?;
        Ok(queued.is_some())
    }

    /// Open access requests
    pub fn pending_requests(&self) -> Vec<PendingRequest> {
        self.store.lock().pending_requests().to_vec()
    }

    /// Members in canonical order
    pub fn list(&self) -> Vec<Address> {
        self.store.lock().list()
    }

    /// Membership test.
    ///
    /// # Errors
    /// Fails on a malformed address.
    pub fn contains(&self, address: &str) -> Result<bool> {
        let address = Address::parse(address)?;
        Ok(self.store.lock().contains(&address))
    }

    /// Export snapshot
    pub fn export(&self) -> AllowlistSnapshot {
        self.store.lock().export_snapshot()
    }

    /// Proof bundle against the local tree.
    ///
    /// # Errors
    /// Returns `EmptyAllowlist` or `LeafNotFound` for non-members.
    pub fn proof(&self, address: &str) -> Result<ProofBundle> {
        let address = Address::parse(address)?;
        self.store.lock().proof_bundle(&address)
    }

    /// Compare local state with the contract's root.
    ///
    /// # Errors
    /// Returns an error if the chain cannot be read.
    pub async fn sync_report(&self) -> Result<SyncReport> {
        let onchain = self.contract.merkle_root().await?;
        let (local, published) = {
            let store = self.store.lock();
            (store.root(), store.published_root())
        };
        Ok(SyncReport::new(local, published, onchain))
    }

    /// Decide whether `address` may mint and prepare its proof.
    ///
    /// Denials (`EmptyAllowlist`, `LeafNotFound`) are errors. Root drift is
    /// reported through advisories and does not block: the contract decides.
    ///
    /// # Errors
    /// Fails on a malformed address, a denial, or an unreadable chain.
    #[instrument(skip(self))]
    pub async fn check_mint(&self, address: &str) -> Result<MintEligibility> {
        let address = Address::parse(address)?;

        if !self.contract.whitelist_only().await? {
            return Ok(MintEligibility {
                address,
                grant: Grant::Unrestricted,
                proof: Proof::default(),
                advisories: Vec::new(),
                onchain_verdict: None,
                eligible: true,
            });
        }

        let is_owner = self.contract.owner().await? == address;
        if is_owner {
            return Ok(MintEligibility {
                address,
                grant: Grant::Owner,
                proof: Proof::default(),
                advisories: Vec::new(),
                onchain_verdict: None,
                eligible: is_eligible(true, false),
            });
        }

        let bundle = self.store.lock().proof_bundle(&address)?;
        let onchain = self.contract.merkle_root().await?;

        let mut advisories = Vec::new();
        if bundle.root != onchain {
            advisories.push(Advisory::RootMismatch {
                local: to_hex(&bundle.root),
                onchain: to_hex(&onchain),
            });
        }
        let verified = verify(&leaf_hash(&address), &bundle.proof, &onchain);
        if !verified {
            advisories.push(Advisory::VerificationFailed {
                root: to_hex(&onchain),
            });
        }

        let verdict = self.contract.is_whitelisted(address, &bundle.proof).await?;
        let eligible = is_eligible(false, verdict);
        if !eligible {
            warn!(%address, advisories = advisories.len(), "Contract rejects local proof");
        }

        Ok(MintEligibility {
            address,
            grant: Grant::Member,
            proof: bundle.proof,
            advisories,
            onchain_verdict: Some(verdict),
            eligible,
        })
    }
}
