//! Leaf and Node Hashing
//!
//! Keccak-256 based hashing shared by the tree builder and the verifier.
//! These must stay identical to the contract's `MerkleProof` usage:
//! - leaf = `keccak256(abi.encodePacked(address))` (the raw 20 bytes)
//! - node = `keccak256(min(a, b) ++ max(a, b))`

use crate::address::Address;
use sha3::{Digest, Keccak256};

/// A 32-byte Merkle node (leaf, internal node or root)
pub type Hash32 = [u8; 32];

/// Hash of a single allowlist member
pub type Leaf = Hash32;

/// Apex hash committed on-chain
pub type Root = Hash32;

/// All-zero root, published when the allowlist is empty
pub const ZERO_ROOT: Root = [0u8; 32];

/// Keccak-256 digest of arbitrary bytes
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash32 {
    Keccak256::digest(data).into()
}

/// Derive the Merkle leaf for an address
#[must_use]
pub fn leaf_hash(address: &Address) -> Leaf {
    keccak256(address.as_bytes())
}

/// Hash two siblings after sorting them byte-lexicographically
#[must_use]
pub fn hash_sorted_pair(a: &Hash32, b: &Hash32) -> Hash32 {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    Keccak256::new()
        .chain_update(lo)
        .chain_update(hi)
        .finalize()
        .into()
}

/// Render a hash as `0x`-prefixed lowercase hex
#[must_use]
pub fn to_hex(hash: &Hash32) -> String {
    format!("0x{}", hex::encode(hash))
}

/// Parse a `0x`-prefixed (or bare) 32-byte hex string
///
/// # Errors
/// Returns the decode error message if the input is not 32 bytes of hex.
pub fn parse_hex32(s: &str) -> Result<Hash32, String> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let mut out = [0u8; 32];
    hex::decode_to_slice(s, &mut out).map_err(|e| format!("invalid 32-byte hex: {e}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256_known_value() {
        assert_eq!(
            to_hex(&keccak256(b"hello")),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(
            to_hex(&keccak256(b"")),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_leaf_hashes_raw_bytes_not_string() {
        let addr = Address::parse("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(leaf_hash(&addr), keccak256(&[0x11; 20]));
        assert_ne!(
            leaf_hash(&addr),
            keccak256(b"0x1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn test_leaf_is_case_independent() {
        let a = Address::parse("0xabcdefabcdefabcdefabcdefabcdefabcdefabcd").unwrap();
        let b = Address::parse("0xABCDEFABCDEFABCDEFABCDEFABCDEFABCDEFABCD").unwrap();
        assert_eq!(leaf_hash(&a), leaf_hash(&b));
    }

    #[test]
    fn test_sorted_pair_is_commutative() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_eq!(hash_sorted_pair(&a, &b), hash_sorted_pair(&b, &a));
    }

    #[test]
    fn test_sorted_pair_puts_smaller_first() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        let mut concat = Vec::with_capacity(64);
        concat.extend_from_slice(&a);
        concat.extend_from_slice(&b);
        assert_eq!(hash_sorted_pair(&b, &a), keccak256(&concat));
    }

    #[test]
    fn test_parse_hex32_roundtrip() {
        let hash = keccak256(b"root");
        assert_eq!(parse_hex32(&to_hex(&hash)).unwrap(), hash);
        assert!(parse_hex32("0x0102").is_err());
    }
}
