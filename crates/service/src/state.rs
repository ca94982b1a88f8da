//! Shared Application State
//!
//! The allowlist manager plus a log of root publications and service health.
//! The log keeps the most recent pushes only; lifetime totals are in the
//! `allowlist_root_publications_total` counter.

use allowlist_core::{AllowlistContract, AllowlistManager, Publication, PublicationStatus};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Publications retained by default
pub const DEFAULT_PUBLICATION_LOG_SIZE: u64 = 1024;

/// Record of a root push, as served by `/publications`
#[derive(Debug, Clone, Serialize)]
pub struct PublicationRecord {
    /// Sequence number, in push order
    pub id: u64,
    /// Operation that caused the push
    pub trigger: &'static str,
    /// When the push resolved
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub publication: Publication,
}

/// Shared application state
pub struct AppState<C> {
    inner: Arc<AppStateInner<C>>,
}

impl<C> Clone for AppState<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<C> {
    manager: AllowlistManager<C>,
    /// Recent root pushes by sequence number
    publications: DashMap<u64, PublicationRecord>,
    next_publication: AtomicU64,
    publication_log_size: u64,
    /// Service start time
    start_time: std::time::Instant,
    /// Last error message
    last_error: RwLock<Option<String>>,
}

impl<C: AllowlistContract> AppState<C> {
    /// Create new application state
    #[must_use]
    pub fn new(manager: AllowlistManager<C>) -> Self {
        Self::with_publication_log_size(manager, DEFAULT_PUBLICATION_LOG_SIZE)
    }

    /// Create state that keeps at most `size` publication records
    #[must_use]
    pub fn with_publication_log_size(manager: AllowlistManager<C>, size: u64) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                manager,
                publications: DashMap::new(),
                next_publication: AtomicU64::new(0),
                publication_log_size: size.max(1),
                start_time: std::time::Instant::now(),
                last_error: RwLock::new(None),
            }),
        }
    }

    pub fn manager(&self) -> &AllowlistManager<C> {
        &self.inner.manager
    }

    /// Get uptime in seconds
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Log a completed mutation and its root push (if any)
    pub fn record_mutation(&self, trigger: &'static str, publication: Option<&Publication>) {
        metrics::counter!("allowlist_mutations_total", "operation" => trigger).increment(1);
        if let Some(publication) = publication {
            self.record_publication(trigger, publication.clone());
        }
        self.refresh_gauges();
    }

    /// Log a root push
    pub fn record_publication(&self, trigger: &'static str, publication: Publication) {
        let outcome = match publication.status {
            PublicationStatus::Confirmed => "confirmed",
            PublicationStatus::Failed => "failed",
        };
        metrics::counter!("allowlist_root_publications_total", "outcome" => outcome).increment(1);

        match publication.status {
            PublicationStatus::Confirmed => self.set_error(None),
            PublicationStatus::Failed => self.set_error(publication.error.clone()),
        }

        let id = self.inner.next_publication.fetch_add(1, Ordering::Relaxed);
        self.inner.publications.insert(
            id,
            PublicationRecord {
                id,
                trigger,
                timestamp: Utc::now(),
                publication,
            },
        );
        if let Some(evicted) = id.checked_sub(self.inner.publication_log_size) {
            self.inner.publications.remove(&evicted);
        }
    }

    /// Retained publications, oldest first
    #[must_use]
    pub fn publications(&self) -> Vec<PublicationRecord> {
        let mut records: Vec<_> = self
            .inner
            .publications
            .iter()
            .map(|r| r.value().clone())
            .collect();
        records.sort_by_key(|r| r.id);
        records
    }

    /// Most recent publication
    #[must_use]
    pub fn last_publication(&self) -> Option<PublicationRecord> {
        let last = self.inner.next_publication.load(Ordering::Relaxed).checked_sub(1)?;
        self.inner.publications.get(&last).map(|r| r.clone())
    }

    /// Healthy unless the most recent push failed
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.last_publication()
            .map_or(true, |r| r.publication.is_confirmed())
    }

    /// Get publication counts by outcome, over the retained log
    #[must_use]
    pub fn publication_counts(&self) -> PublicationCounts {
        let mut counts = PublicationCounts::default();
        for entry in &self.inner.publications {
            match entry.publication.status {
                PublicationStatus::Confirmed => counts.confirmed += 1,
                PublicationStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    /// Update member and request gauges
    #[allow(clippy::cast_precision_loss)]
    pub fn refresh_gauges(&self) {
        let members = self.manager().read(allowlist_core::AllowlistStore::len);
        let pending = self.manager().read(|store| store.pending_requests().len());
        metrics::gauge!("allowlist_members").set(members as f64);
        metrics::gauge!("allowlist_pending_requests").set(pending as f64);
    }

    /// Set last error
    pub fn set_error(&self, error: Option<String>) {
        *self.inner.last_error.write() = error;
    }

    /// Get last error
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.read().clone()
    }
}

/// Counts of publications by outcome
#[derive(Debug, Default, Clone, Serialize)]
pub struct PublicationCounts {
    pub confirmed: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use allowlist_core::{AllowlistStore, MemoryBackend, MockContract};

    fn state() -> AppState<MockContract> {
        let store = AllowlistStore::open(MemoryBackend::default()).unwrap();
        let owner = allowlist_core::Address::new([0xaa; 20]);
        AppState::new(AllowlistManager::new(store, MockContract::owned_by(owner)))
    }

    fn publication(status: PublicationStatus) -> Publication {
        Publication {
            root: [1; 32],
            tx_hash: None,
            status,
            error: (status == PublicationStatus::Failed).then(|| "boom".to_string()),
        }
    }

    #[test]
    fn test_healthy_without_publications() {
        let state = state();
        assert!(state.is_healthy());
        assert!(state.last_publication().is_none());
    }

    #[test]
    fn test_failed_publication_degrades_health() {
        let state = state();
        state.record_publication("add", publication(PublicationStatus::Confirmed));
        state.record_publication("remove", publication(PublicationStatus::Failed));

        assert!(!state.is_healthy());
        assert_eq!(state.last_error().as_deref(), Some("boom"));

        state.record_publication("publish", publication(PublicationStatus::Confirmed));
        assert!(state.is_healthy());
        assert!(state.last_error().is_none());
    }

    #[test]
    fn test_publication_log_is_ordered() {
        let state = state();
        for trigger in ["add", "remove", "import"] {
            state.record_publication(trigger, publication(PublicationStatus::Confirmed));
        }

        let triggers: Vec<_> = state.publications().iter().map(|r| r.trigger).collect();
        assert_eq!(triggers, vec!["add", "remove", "import"]);

        let counts = state.publication_counts();
        assert_eq!(counts.confirmed, 3);
        assert_eq!(counts.failed, 0);
    }

    #[test]
    fn test_publication_log_keeps_most_recent() {
        let store = AllowlistStore::open(MemoryBackend::default()).unwrap();
        let owner = allowlist_core::Address::new([0xaa; 20]);
        let manager = AllowlistManager::new(store, MockContract::owned_by(owner));
        let state = AppState::with_publication_log_size(manager, 2);

        state.record_publication("add", publication(PublicationStatus::Confirmed));
        state.record_publication("add", publication(PublicationStatus::Confirmed));
        state.record_publication("publish", publication(PublicationStatus::Failed));

        let records = state.publications();
        assert_eq!(records.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(state.last_publication().unwrap().trigger, "publish");
        assert!(!state.is_healthy());
    }

    #[test]
    fn test_mutation_without_publication_is_not_logged() {
        let state = state();
        state.record_mutation("reject", None);
        assert!(state.publications().is_empty());
    }
}
