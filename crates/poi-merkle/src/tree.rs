//! Bottom-up Merkle tree construction over an ordered leaf sequence.
//!
//! Consecutive elements of each level are paired as `H(0x01 || left || right)`; an odd
//! trailing element is promoted unchanged to the next level, never duplicated.

use thiserror::Error;

use crate::hasher::{empty_root, hash_leaf, hash_node};
use crate::proof::{LeafValue, MerkleAuditProof};
use crate::Digest;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    #[error("Leaf index {index} out of range for {len} leaves")]
    IndexOutOfRange { index: usize, len: usize },
}

/// Compute the root hash of the ordered `leaves`
pub fn compute_root<L: AsRef<[u8]>>(leaves: &[L]) -> Digest {
    let mut level: Vec<Digest> = leaves.iter().map(|l| hash_leaf(l.as_ref())).collect();
    if level.is_empty() {
        return empty_root();
    }
    while level.len() > 1 {
        level = next_level(&level);
    }
    level[0]
}

/// Build the audit proof for the leaf at `target`
pub fn build_proof<L: AsRef<[u8]>>(
    leaves: &[L],
    target: usize,
) -> Result<MerkleAuditProof, MerkleError> {
    let value = leaves
        .get(target)
        .ok_or(MerkleError::IndexOutOfRange {
            index: target,
            len: leaves.len(),
        })?
        .as_ref();

    let mut level: Vec<Digest> = leaves.iter().map(|l| hash_leaf(l.as_ref())).collect();
    let mut proof = MerkleAuditProof::Leaf {
        value: LeafValue::from(value),
    };
    let mut index = target;

    while level.len() > 1 {
        let sibling_index = index ^ 1;
        // A promoted trailing element has no sibling on this level
        if let Some(sibling) = level.get(sibling_index) {
            let sibling = MerkleAuditProof::Sibling { hash: *sibling };
            proof = if index % 2 == 0 {
                MerkleAuditProof::branch(proof, sibling)
            } else {
                MerkleAuditProof::branch(sibling, proof)
            };
        }
        level = next_level(&level);
        index /= 2;
    }

    Ok(proof)
}

fn next_level(level: &[Digest]) -> Vec<Digest> {
    level
        .chunks(2)
        .map(|chunk| match chunk {
            [left, right] => hash_node(left, right),
            [single] => *single,
            _ => unreachable!("Chunk size is at most 2"),
        })
        .collect()
}
