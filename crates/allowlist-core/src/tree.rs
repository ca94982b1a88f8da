//! Merkle Tree Builder and Proof Generator
//!
//! Builds a binary keccak tree over the allowlist leaves and emits sibling
//! paths for individual members.
//!
//! # Conventions
//! - Leaves are de-duplicated and sorted ascending before the first level,
//!   so the root depends only on the member set.
//! - Siblings are sorted before hashing (see [`hash_sorted_pair`]).
//! - An odd trailing node is promoted to the next level unchanged. A tree
//!   with one member has `root == leaf` and an empty proof.

use crate::address::Address;
use crate::error::{AllowlistError, Result};
use crate::leaf::{hash_sorted_pair, leaf_hash, to_hex, Hash32, Leaf, Root};
use crate::proof::Proof;
use std::fmt::Write as _;
use tracing::debug;

/// Merkle tree over a snapshot of the allowlist.
///
/// `levels[0]` holds the sorted leaves, the last level holds only the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowlistTree {
    levels: Vec<Vec<Hash32>>,
}

impl AllowlistTree {
    /// Build a tree from raw leaves.
    ///
    /// # Errors
    /// Returns [`AllowlistError::EmptyAllowlist`] when `leaves` is empty.
    pub fn from_leaves(leaves: impl IntoIterator<Item = Leaf>) -> Result<Self> {
        let mut base: Vec<Hash32> = leaves.into_iter().collect();
        base.sort_unstable();
        base.dedup();

        if base.is_empty() {
            return Err(AllowlistError::EmptyAllowlist);
        }

        let mut levels = vec![base];
        while levels.last().is_some_and(|level| level.len() > 1) {
            let current = &levels[levels.len() - 1];
            let next: Vec<Hash32> = current
                .chunks(2)
                .map(|pair| match pair {
                    [left, right] => hash_sorted_pair(left, right),
                    [odd] => *odd,
                    _ => unreachable!("chunks(2) yields one or two nodes"),
                })
                .collect();
            levels.push(next);
        }

        debug!(
            leaves = levels[0].len(),
            depth = levels.len() - 1,
            "Built allowlist tree"
        );

        Ok(Self { levels })
    }

    /// Build a tree from member addresses.
    ///
    /// # Errors
    /// Returns [`AllowlistError::EmptyAllowlist`] when there are no addresses.
    pub fn from_addresses<'a>(addresses: impl IntoIterator<Item = &'a Address>) -> Result<Self> {
        Self::from_leaves(addresses.into_iter().map(leaf_hash))
    }

    /// The apex hash
    #[must_use]
    pub fn root(&self) -> Root {
        // levels is never empty and the last level has exactly one node
        self.levels[self.levels.len() - 1][0]
    }

    /// Number of distinct leaves
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    /// Always false; an empty tree cannot be constructed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of hashing levels above the leaves
    #[must_use]
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    /// Sorted leaves
    #[must_use]
    pub fn leaves(&self) -> &[Leaf] {
        &self.levels[0]
    }

    /// Whether `leaf` is committed in this tree
    #[must_use]
    pub fn contains(&self, leaf: &Leaf) -> bool {
        self.levels[0].binary_search(leaf).is_ok()
    }

    /// Generate the sibling path from `leaf` up to (not including) the root.
    ///
    /// Levels where the node was promoted without a sibling contribute
    /// nothing to the path.
    ///
    /// # Errors
    /// Returns [`AllowlistError::LeafNotFound`] if the leaf is not in the tree.
    pub fn proof(&self, leaf: &Leaf) -> Result<Proof> {
        let mut index = self.levels[0]
            .binary_search(leaf)
            .map_err(|_| AllowlistError::LeafNotFound(to_hex(leaf)))?;

        let mut siblings = Vec::with_capacity(self.depth());
        for level in &self.levels[..self.levels.len() - 1] {
            let sibling = index ^ 1;
            if let Some(hash) = level.get(sibling) {
                siblings.push(*hash);
            }
            index /= 2;
        }

        Ok(Proof::new(siblings))
    }

    /// Generate the proof for a member address.
    ///
    /// # Errors
    /// Returns [`AllowlistError::LeafNotFound`] naming the address if absent.
    pub fn proof_for(&self, address: &Address) -> Result<Proof> {
        self.proof(&leaf_hash(address))
            .map_err(|_| AllowlistError::LeafNotFound(address.to_string()))
    }

    /// Multi-line dump of every level, root first
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (height, level) in self.levels.iter().enumerate().rev() {
            let _ = writeln!(out, "level {height}:");
            for (i, node) in level.iter().enumerate() {
                let _ = writeln!(out, "  {i}) {}", to_hex(node));
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leaf::keccak256;
    use crate::proof::verify;

    fn make_leaves(count: u8) -> Vec<Leaf> {
        (0..count).map(|i| keccak256(&[i])).collect()
    }

    fn addr(byte: u8) -> Address {
        Address::new([byte; 20])
    }

    #[test]
    fn test_empty_tree_is_rejected() {
        let result = AllowlistTree::from_leaves(Vec::new());
        assert!(matches!(result, Err(AllowlistError::EmptyAllowlist)));
    }

    #[test]
    fn test_single_leaf_root_is_leaf() {
        let a = addr(0xaa);
        let tree = AllowlistTree::from_addresses([&a]).unwrap();

        assert_eq!(tree.root(), leaf_hash(&a));
        assert_eq!(tree.depth(), 0);

        let proof = tree.proof_for(&a).unwrap();
        assert!(proof.is_empty());
        assert!(verify(&leaf_hash(&a), &proof, &tree.root()));
    }

    #[test]
    fn test_two_leaf_root_is_sorted_pair() {
        let a = addr(0x01);
        let b = addr(0x02);
        let (la, lb) = (leaf_hash(&a), leaf_hash(&b));
        let tree = AllowlistTree::from_addresses([&a, &b]).unwrap();

        assert_eq!(tree.root(), hash_sorted_pair(&la, &lb));
        assert_eq!(tree.proof(&la).unwrap().siblings(), &[lb]);
        assert_eq!(tree.proof(&lb).unwrap().siblings(), &[la]);
    }

    #[test]
    fn test_odd_node_is_promoted() {
        let leaves = make_leaves(3);
        let tree = AllowlistTree::from_leaves(leaves).unwrap();
        let sorted = tree.leaves().to_vec();

        let expected = hash_sorted_pair(&hash_sorted_pair(&sorted[0], &sorted[1]), &sorted[2]);
        assert_eq!(tree.root(), expected);

        // The promoted leaf only needs the sibling from the level above
        let proof = tree.proof(&sorted[2]).unwrap();
        assert_eq!(proof.len(), 1);
    }

    #[test]
    fn test_duplicate_leaves_collapse() {
        let a = addr(0x10);
        let b = addr(0x20);
        let with_dup = AllowlistTree::from_addresses([&a, &b, &a]).unwrap();
        let without = AllowlistTree::from_addresses([&b, &a]).unwrap();

        assert_eq!(with_dup.len(), 2);
        assert_eq!(with_dup.root(), without.root());
    }

    #[test]
    fn test_root_is_order_independent() {
        let leaves = make_leaves(7);
        let mut reversed = leaves.clone();
        reversed.reverse();

        let forward = AllowlistTree::from_leaves(leaves).unwrap();
        let backward = AllowlistTree::from_leaves(reversed).unwrap();
        assert_eq!(forward.root(), backward.root());
    }

    #[test]
    fn test_proof_for_all_leaves() {
        for count in [2u8, 3, 4, 5, 8, 9, 16, 17] {
            let leaves = make_leaves(count);
            let tree = AllowlistTree::from_leaves(leaves.clone()).unwrap();
            for leaf in &leaves {
                let proof = tree.proof(leaf).unwrap();
                assert!(
                    verify(leaf, &proof, &tree.root()),
                    "proof failed for {count} leaves"
                );
            }
        }
    }

    #[test]
    fn test_proof_is_deterministic() {
        let leaves = make_leaves(6);
        let tree = AllowlistTree::from_leaves(leaves.clone()).unwrap();
        assert_eq!(tree.proof(&leaves[3]).unwrap(), tree.proof(&leaves[3]).unwrap());
    }

    #[test]
    fn test_proof_for_missing_leaf() {
        let tree = AllowlistTree::from_leaves(make_leaves(4)).unwrap();
        let result = tree.proof(&keccak256(b"stranger"));
        assert!(matches!(result, Err(AllowlistError::LeafNotFound(_))));
    }

    #[test]
    fn test_proof_for_missing_address_names_it() {
        let tree = AllowlistTree::from_addresses([&addr(1)]).unwrap();
        match tree.proof_for(&addr(2)) {
            Err(AllowlistError::LeafNotFound(name)) => assert_eq!(name, addr(2).to_string()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_render_lists_every_level() {
        let tree = AllowlistTree::from_leaves(make_leaves(3)).unwrap();
        let rendered = tree.render();
        assert!(rendered.starts_with("level 2:"));
        assert!(rendered.contains("level 0:"));
        assert!(rendered.contains(&to_hex(&tree.root())));
    }
}
