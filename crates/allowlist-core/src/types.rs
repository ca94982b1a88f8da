//! Allowlist Data Types
//!
//! Persisted records, export/import formats and access requests.

use crate::address::Address;
use crate::leaf::Root;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A non-member's request for access, awaiting owner review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Opaque request identifier
    pub id: String,
    /// Requesting address
    pub address: Address,
    /// When the request was submitted
    pub timestamp: DateTime<Utc>,
    /// Free-form justification
    pub reason: String,
}

impl PendingRequest {
    /// Create a request with a fresh identifier, stamped now
    #[must_use]
    pub fn new(address: Address, reason: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            address,
            timestamp: Utc::now(),
            reason: reason.into(),
        }
    }
}

/// Read-only export of the allowlist.
///
/// Wire shape: `{ "addresses": [...], "exportDate": "<ISO-8601>" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistSnapshot {
    /// Members, sorted
    pub addresses: Vec<Address>,
    /// Time of export
    pub export_date: DateTime<Utc>,
}

/// Import payload.
///
/// Accepts the export shape; entries are kept as raw JSON so malformed
/// members (bad strings, non-strings) can be dropped individually.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPayload {
    /// Candidate members
    pub addresses: Vec<serde_json::Value>,
    /// Present on files produced by export; ignored on import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_date: Option<String>,
}

/// How an import combines with existing members
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    /// Union with the current allowlist
    #[default]
    Merge,
    /// Discard current members first
    Replace,
}

/// Result of a bulk import
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    /// Entries that passed the format check
    pub accepted: usize,
    /// Entries dropped as malformed
    pub rejected: usize,
    /// Entries that were not already members
    pub added: usize,
}

/// Everything kept in durable storage under one namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedAllowlist {
    /// Monotonic write counter for read-check-write
    pub version: u64,
    /// Members
    pub addresses: Vec<Address>,
    /// Open access requests
    #[serde(default)]
    pub requests: Vec<PendingRequest>,
    /// Root last confirmed on-chain by this store's owner
    #[serde(default, with = "crate::proof::opt_hex_bytes32")]
    pub published_root: Option<Root>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_wire_format() {
        let snapshot = AllowlistSnapshot {
            addresses: vec![Address::new([0x11; 20])],
            export_date: DateTime::parse_from_rfc3339("2026-10-15T12:00:00Z")
                .unwrap()
                .with_timezone(&Utc),
        };

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["addresses"][0], format!("0x{}", "11".repeat(20)));
        assert_eq!(json["exportDate"], "2026-10-15T12:00:00Z");
    }

    #[test]
    fn test_import_payload_accepts_export_file() {
        let json = r#"{
            "addresses": ["0x1111111111111111111111111111111111111111", 42, "junk"],
            "exportDate": "2026-10-15T12:00:00.000Z"
        }"#;
        let payload: ImportPayload = serde_json::from_str(json).unwrap();
        assert_eq!(payload.addresses.len(), 3);
        assert!(payload.export_date.is_some());
    }

    #[test]
    fn test_pending_request_ids_are_unique() {
        let a = PendingRequest::new(Address::new([1; 20]), "please");
        let b = PendingRequest::new(Address::new([1; 20]), "please");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_persisted_roundtrip_with_root() {
        let persisted = PersistedAllowlist {
            version: 3,
            addresses: vec![Address::new([2; 20])],
            requests: vec![],
            published_root: Some([0xcc; 32]),
        };
        let json = serde_json::to_string(&persisted).unwrap();
        assert!(json.contains("publishedRoot"));
        let decoded: PersistedAllowlist = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, persisted);
    }

    #[test]
    fn test_persisted_defaults_missing_fields() {
        let decoded: PersistedAllowlist =
            serde_json::from_str(r#"{"version":1,"addresses":[]}"#).unwrap();
        assert!(decoded.requests.is_empty());
        assert_eq!(decoded.published_root, None);
    }
}
