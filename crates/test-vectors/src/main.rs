//! Test Vector Generator
//!
//! Generates JSON test vectors for the Solidity allowlist verifier tests.
//! Member addresses are derived deterministically so vectors are stable
//! across runs.

use allowlist_core::leaf::keccak256;
use allowlist_core::{leaf_hash, to_hex, verify, Address, AllowlistTree, Proof};
use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "generate-test-vectors")]
#[command(about = "Generate Merkle allowlist test vectors for Solidity tests")]
struct Args {
    /// Output directory for test vectors
    #[arg(short, long, default_value = "../../contracts/test-vectors")]
    output: PathBuf,

    /// Allowlist sizes to generate trees for
    #[arg(long, value_delimiter = ',', default_value = "1,2,3,4,5,7,8,13")]
    sizes: Vec<usize>,

    /// Log every tree level while generating
    #[arg(long)]
    print_trees: bool,
}

/// Test vector file format
#[derive(Debug, Serialize)]
struct TestVectorFile {
    /// Leaf and node hashing convention
    hashing: &'static str,
    /// One tree per allowlist size
    trees: Vec<TreeVectors>,
}

#[derive(Debug, Serialize)]
struct TreeVectors {
    size: usize,
    root: String,
    members: Vec<String>,
    /// Valid claims with proofs
    claims: Vec<TestClaim>,
    /// Invalid claims for negative testing
    invalid_claims: Vec<InvalidTestClaim>,
}

/// A valid membership claim
#[derive(Debug, Serialize)]
struct TestClaim {
    address: String,
    leaf: String,
    proof: Vec<String>,
}

/// An invalid claim for negative testing
#[derive(Debug, Serialize)]
struct InvalidTestClaim {
    description: String,
    address: String,
    proof: Vec<String>,
    root: String,
}

/// Deterministic member address for `index`
fn vector_address(index: usize) -> Address {
    let digest = keccak256(format!("allowlist-test-vector-{index}").as_bytes());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[12..]);
    Address::new(bytes)
}

fn hex_proof(proof: &Proof) -> Vec<String> {
    proof.siblings().iter().map(to_hex).collect()
}

fn build_tree_vectors(size: usize, print_tree: bool) -> Result<TreeVectors> {
    let members: Vec<Address> = (0..size).map(vector_address).collect();
    let tree = AllowlistTree::from_addresses(&members)
        .with_context(|| format!("Failed to build tree of size {size}"))?;
    let root = tree.root();

    if print_tree {
        tracing::info!(size, "Tree levels:\n{}", tree.render());
    }

    let mut claims = Vec::with_capacity(size);
    for member in &members {
        let proof = tree.proof_for(member)?;
        anyhow::ensure!(
            verify(&leaf_hash(member), &proof, &root),
            "Generated proof for {member} does not verify"
        );
        claims.push(TestClaim {
            address: member.to_string(),
            leaf: to_hex(&leaf_hash(member)),
            proof: hex_proof(&proof),
        });
    }

    Ok(TreeVectors {
        size,
        root: to_hex(&root),
        members: members.iter().map(ToString::to_string).collect(),
        claims,
        invalid_claims: build_invalid_claims(&members, &tree)?,
    })
}

fn build_invalid_claims(
    members: &[Address],
    tree: &AllowlistTree,
) -> Result<Vec<InvalidTestClaim>> {
    let root = tree.root();
    let first = members[0];
    let first_proof = tree.proof_for(&first)?;
    let mut invalid = Vec::new();

    // Outsider reusing a member's proof
    let outsider = vector_address(usize::MAX);
    invalid.push(InvalidTestClaim {
        description: "non-member with borrowed proof".to_string(),
        address: outsider.to_string(),
        proof: hex_proof(&first_proof),
        root: to_hex(&root),
    });

    // Single-bit flip in the first sibling
    if !first_proof.is_empty() {
        let mut tampered = first_proof.clone().into_inner();
        tampered[0][31] ^= 0x01;
        invalid.push(InvalidTestClaim {
            description: "tampered sibling".to_string(),
            address: first.to_string(),
            proof: tampered.iter().map(to_hex).collect(),
            root: to_hex(&root),
        });
    }

    // Proof valid against the previous root, checked after removal
    if members.len() >= 2 {
        let removed = members[members.len() - 1];
        let stale_proof = tree.proof_for(&removed)?;
        let shrunk = AllowlistTree::from_addresses(&members[..members.len() - 1])?;
        invalid.push(InvalidTestClaim {
            description: "removed member with stale proof".to_string(),
            address: removed.to_string(),
            proof: hex_proof(&stale_proof),
            root: to_hex(&shrunk.root()),
        });
    }

    // Empty allowlist publishes the zero root
    invalid.push(InvalidTestClaim {
        description: "member against zero root".to_string(),
        address: first.to_string(),
        proof: hex_proof(&first_proof),
        root: to_hex(&allowlist_core::ZERO_ROOT),
    });

    for claim in &invalid {
        let address: Address = claim.address.parse()?;
        let proof = Proof::new(
            claim
                .proof
                .iter()
                .map(|h| allowlist_core::leaf::parse_hex32(h).map_err(anyhow::Error::msg))
                .collect::<Result<_>>()?,
        );
        let claimed_root =
            allowlist_core::leaf::parse_hex32(&claim.root).map_err(anyhow::Error::msg)?;
        anyhow::ensure!(
            !verify(&leaf_hash(&address), &proof, &claimed_root),
            "Invalid claim '{}' unexpectedly verifies",
            claim.description
        );
    }

    Ok(invalid)
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    tracing::info!(
        output = %args.output.display(),
        sizes = ?args.sizes,
        "Generating test vectors"
    );

    // Ensure output directory exists
    std::fs::create_dir_all(&args.output)?;

    let trees = args
        .sizes
        .iter()
        .filter(|&&size| size > 0)
        .map(|&size| build_tree_vectors(size, args.print_trees))
        .collect::<Result<Vec<_>>>()?;

    let file = TestVectorFile {
        hashing: "leaf=keccak256(address); node=keccak256(sort(a,b)); odd node promoted",
        trees,
    };

    let output_path = args.output.join("allowlist_vectors.json");
    let json = serde_json::to_string_pretty(&file)?;
    std::fs::write(&output_path, json)?;

    tracing::info!(path = %output_path.display(), "Wrote test vectors");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_addresses_are_distinct() {
        let a = vector_address(0);
        let b = vector_address(1);
        assert_ne!(a, b);
        assert_eq!(a, vector_address(0));
    }

    #[test]
    fn test_single_member_tree_has_empty_proof() {
        let vectors = build_tree_vectors(1, false).unwrap();
        assert_eq!(vectors.claims[0].proof.len(), 0);
        assert_eq!(vectors.root, vectors.claims[0].leaf);
        // Borrowed proof and zero root; no sibling to tamper, nothing to remove
        assert_eq!(vectors.invalid_claims.len(), 2);
    }

    #[test]
    fn test_odd_sized_tree_has_all_negative_cases() {
        let vectors = build_tree_vectors(5, false).unwrap();
        assert_eq!(vectors.claims.len(), 5);
        assert_eq!(vectors.invalid_claims.len(), 4);
    }
}
