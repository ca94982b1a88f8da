//! Merkle proof verification for allowlist membership.
//!
//! The fold implemented here mirrors the contract's verifier: at each step
//! the current hash and the next sibling are sorted and hashed. Any change
//! to this rule makes proofs that pass off-chain fail on-chain.

use crate::address::Address;
use crate::leaf::{hash_sorted_pair, leaf_hash, Hash32, Leaf, Root};
use serde::{Deserialize, Serialize};

/// Ordered sibling hashes from a leaf up to (not including) the root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(#[serde(with = "hex_vec_serde")] Vec<Hash32>);

impl Proof {
    /// Wrap a list of sibling hashes
    #[must_use]
    pub fn new(siblings: Vec<Hash32>) -> Self {
        Self(siblings)
    }

    /// Sibling hashes, leaf side first
    #[must_use]
    pub fn siblings(&self) -> &[Hash32] {
        &self.0
    }

    /// Number of siblings
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for single-member trees and owner calls
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Consume into the raw sibling list
    #[must_use]
    pub fn into_inner(self) -> Vec<Hash32> {
        self.0
    }
}

impl From<Vec<Hash32>> for Proof {
    fn from(siblings: Vec<Hash32>) -> Self {
        Self(siblings)
    }
}

/// Recompute the root implied by `leaf` and `proof`
#[must_use]
pub fn process_proof(leaf: &Leaf, proof: &Proof) -> Root {
    proof
        .siblings()
        .iter()
        .fold(*leaf, |current, sibling| hash_sorted_pair(&current, sibling))
}

/// Check that `proof` folds `leaf` into `root`, byte-for-byte.
///
/// This is an early, non-authoritative signal. The contract's
/// `isWhitelisted` remains the arbiter.
#[must_use]
pub fn verify(leaf: &Leaf, proof: &Proof, root: &Root) -> bool {
    process_proof(leaf, proof) == *root
}

/// Verify membership of an address rather than a precomputed leaf
#[must_use]
pub fn verify_address(address: &Address, proof: &Proof, root: &Root) -> bool {
    verify(&leaf_hash(address), proof, root)
}

/// Everything a minting client needs to call the contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    /// Member address
    pub address: Address,

    /// Leaf derived from the address
    #[serde(with = "hex_bytes32")]
    pub leaf: Leaf,

    /// Root the proof was generated against
    #[serde(with = "hex_bytes32")]
    pub root: Root,

    /// Sibling path
    pub proof: Proof,
}

impl ProofBundle {
    /// Re-check the bundle against its own root
    #[must_use]
    pub fn is_self_consistent(&self) -> bool {
        self.leaf == leaf_hash(&self.address) && verify(&self.leaf, &self.proof, &self.root)
    }
}

/// Serde for a single 32-byte hash as `0x` hex
pub mod hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("0x{}", hex::encode(bytes)))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        crate::leaf::parse_hex32(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde for `Option<[u8; 32]>` as nullable `0x` hex
pub mod opt_hex_bytes32 {
    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::ref_option)]
    pub fn serialize<S>(bytes: &Option<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(b) => serializer.serialize_some(&format!("0x{}", hex::encode(b))),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|s| crate::leaf::parse_hex32(&s).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// Serde for `Vec<[u8; 32]>` as a list of `0x` hex strings
mod hex_vec_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S>(data: &Vec<[u8; 32]>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let hex_strings: Vec<String> = data
            .iter()
            .map(|h| format!("0x{}", hex::encode(h)))
            .collect();
        hex_strings.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<[u8; 32]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let hex_strings: Vec<String> = Vec::deserialize(deserializer)?;
        hex_strings
            .iter()
            .map(|s| crate::leaf::parse_hex32(s).map_err(serde::de::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::AllowlistTree;

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_empty_proof_verifies_leaf_as_root() {
        let leaf = leaf_hash(&addr(1));
        assert!(verify(&leaf, &Proof::default(), &leaf));
    }

    #[test]
    fn test_two_member_scenario() {
        let (a, b) = (addr(0x0a), addr(0x0b));
        let (la, lb) = (leaf_hash(&a), leaf_hash(&b));
        let root = hash_sorted_pair(&la, &lb);

        assert!(verify(&la, &Proof::new(vec![lb]), &root));
        assert!(verify(&lb, &Proof::new(vec![la]), &root));
    }

    #[test]
    fn test_foreign_leaf_fails() {
        let members = [addr(1), addr(2), addr(3), addr(4)];
        let tree = AllowlistTree::from_addresses(&members).unwrap();
        let proof = tree.proof_for(&members[0]).unwrap();

        assert!(!verify_address(&addr(9), &proof, &tree.root()));
    }

    #[test]
    fn test_wrong_root_fails() {
        let members = [addr(1), addr(2)];
        let tree = AllowlistTree::from_addresses(&members).unwrap();
        let proof = tree.proof_for(&members[0]).unwrap();

        assert!(!verify_address(&members[0], &proof, &[0u8; 32]));
    }

    #[test]
    fn test_single_bit_flip_in_proof_fails() {
        let members: Vec<Address> = (1..=5).map(addr).collect();
        let tree = AllowlistTree::from_addresses(&members).unwrap();
        let proof = tree.proof_for(&members[1]).unwrap();
        let leaf = leaf_hash(&members[1]);

        for (i, _) in proof.siblings().iter().enumerate() {
            for bit in 0..256 {
                let mut tampered = proof.clone().into_inner();
                tampered[i][bit / 8] ^= 1 << (bit % 8);
                assert!(!verify(&leaf, &Proof::new(tampered), &tree.root()));
            }
        }
    }

    #[test]
    fn test_proof_json_is_hex_list() {
        let proof = Proof::new(vec![[0xaa; 32], [0xbb; 32]]);
        let json = serde_json::to_string(&proof).unwrap();
        assert_eq!(
            json,
            format!("[\"0x{}\",\"0x{}\"]", "aa".repeat(32), "bb".repeat(32))
        );

        let decoded: Proof = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, proof);
    }

    #[test]
    fn test_proof_json_rejects_short_hash() {
        let result: Result<Proof, _> = serde_json::from_str("[\"0x0102\"]");
        assert!(result.is_err());
    }

    #[test]
    fn test_bundle_self_consistency() {
        let members = [addr(1), addr(2), addr(3)];
        let tree = AllowlistTree::from_addresses(&members).unwrap();

        let mut bundle = ProofBundle {
            address: members[2],
            leaf: leaf_hash(&members[2]),
            root: tree.root(),
            proof: tree.proof_for(&members[2]).unwrap(),
        };
        assert!(bundle.is_self_consistent());

        bundle.address = members[0];
        assert!(!bundle.is_self_consistent());
    }
}
