//! Mint Eligibility
//!
//! Eligibility is a two-clause predicate: the contract owner is always
//! allowed, everyone else needs a Merkle membership proof. The owner clause
//! is kept here, outside the tree, so the commitment only ever contains
//! real members.

use crate::address::Address;
use crate::error::AllowlistError;
use crate::proof::Proof;
use serde::Serialize;

/// `isOwner(address) OR merkleVerify(address, proof)`
#[must_use]
pub fn is_eligible(is_owner: bool, merkle_verified: bool) -> bool {
    is_owner || merkle_verified
}

/// Which clause admitted the address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Grant {
    /// Gating is disabled on the contract
    Unrestricted,
    /// Address is the contract owner
    Owner,
    /// Address is an allowlist member
    Member,
}

/// Non-blocking warnings attached to an otherwise usable proof.
///
/// The contract's own check is the final gate; these only predict that the
/// mint transaction would revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Advisory {
    /// Local root and on-chain root differ; the fix is republishing
    RootMismatch { local: String, onchain: String },
    /// The proof does not fold into the on-chain root
    VerificationFailed { root: String },
}

impl From<Advisory> for AllowlistError {
    fn from(advisory: Advisory) -> Self {
        match advisory {
            Advisory::RootMismatch { local, onchain } => Self::RootMismatch { local, onchain },
            Advisory::VerificationFailed { root } => Self::VerificationFailed(root),
        }
    }
}

/// Everything needed to decide and submit a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MintEligibility {
    pub address: Address,
    pub grant: Grant,
    /// Proof to pass to `mint`; empty for owner and unrestricted mints
    pub proof: Proof,
    pub advisories: Vec<Advisory>,
    /// The contract's `isWhitelisted` answer, when it was consulted
    pub onchain_verdict: Option<bool>,
    /// [`is_eligible`] over the owner clause and the contract's verdict
    pub eligible: bool,
}

impl MintEligibility {
    /// No advisories were raised
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.advisories.is_empty()
    }

    /// Promote the first advisory to an error.
    ///
    /// # Errors
    /// Returns `RootMismatch` or `VerificationFailed` if any advisory was raised.
    pub fn ensure_clean(mut self) -> Result<Self, AllowlistError> {
        if self.advisories.is_empty() {
            Ok(self)
        } else {
            Err(self.advisories.swap_remove(0).into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicate() {
        assert!(is_eligible(true, false));
        assert!(is_eligible(false, true));
        assert!(is_eligible(true, true));
        assert!(!is_eligible(false, false));
    }

    #[test]
    fn test_advisory_maps_to_distinct_errors() {
        let mismatch: AllowlistError = Advisory::RootMismatch {
            local: "0x01".into(),
            onchain: "0x02".into(),
        }
        .into();
        assert_eq!(mismatch.kind(), "root_mismatch");

        let failed: AllowlistError = Advisory::VerificationFailed { root: "0x02".into() }.into();
        assert_eq!(failed.kind(), "verification_failed");
    }

    #[test]
    fn test_ensure_clean_surfaces_first_advisory() {
        let check = MintEligibility {
            address: Address::new([0x11; 20]),
            grant: Grant::Member,
            proof: Proof::default(),
            advisories: vec![
                Advisory::RootMismatch {
                    local: "0x01".into(),
                    onchain: "0x02".into(),
                },
                Advisory::VerificationFailed { root: "0x02".into() },
            ],
            onchain_verdict: Some(false),
            eligible: false,
        };
        let err = check.clone().ensure_clean().unwrap_err();
        assert_eq!(err.kind(), "root_mismatch");

        let clean = MintEligibility {
            advisories: Vec::new(),
            onchain_verdict: Some(true),
            eligible: true,
            ..check
        };
        assert!(clean.ensure_clean().unwrap().eligible);
    }

    #[test]
    fn test_advisory_json_is_tagged() {
        let json = serde_json::to_value(Advisory::VerificationFailed {
            root: "0xff".into(),
        })
        .unwrap();
        assert_eq!(json["kind"], "verification_failed");
        assert_eq!(json["root"], "0xff");
    }
}
