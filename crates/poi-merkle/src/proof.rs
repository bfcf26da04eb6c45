//! Merkle audit proof skeleton and fail-closed verification.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::digest::{decode_prefixed_hex, encode_prefixed_hex};
use crate::hasher::{hash_leaf, hash_node};
use crate::Digest;

/// Maximum number of branch levels accepted when folding a proof.
/// A cone would need more than 2^64 blocks to legitimately exceed it.
pub const MAX_PROOF_DEPTH: usize = 64;

/// Raw leaf value embedded in a proof (for milestone cones: the block ID bytes)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LeafValue(pub Vec<u8>);

impl LeafValue {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&[u8]> for LeafValue {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl Serialize for LeafValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_prefixed_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for LeafValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_prefixed_hex(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// Binary-tree-shaped skeleton of sibling hashes leading from one designated leaf to the root.
///
/// JSON encoding: `{"l": .., "r": ..}` for a branch, `{"h": "0x.."}` for a sibling hash and
/// `{"value": "0x.."}` for the designated leaf. Objects mixing these keys, or carrying any
/// other key, are rejected when decoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MerkleAuditProof {
    /// Internal node on the path, both children are sub-skeletons
    Branch {
        #[serde(rename = "l")]
        left: Box<MerkleAuditProof>,
        #[serde(rename = "r")]
        right: Box<MerkleAuditProof>,
    },
    /// Terminal holding the hash of a sibling subtree
    Sibling {
        #[serde(rename = "h")]
        hash: Digest,
    },
    /// The leaf being proven
    Leaf { value: LeafValue },
}

impl MerkleAuditProof {
    pub(crate) fn branch(left: MerkleAuditProof, right: MerkleAuditProof) -> Self {
        Self::Branch {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Number of branch levels above the deepest terminal
    pub fn depth(&self) -> usize {
        match self {
            Self::Branch { left, right } => 1 + left.depth().max(right.depth()),
            Self::Sibling { .. } | Self::Leaf { .. } => 0,
        }
    }

}

/// Wire form of one skeleton node
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ProofNode {
    l: Option<Box<MerkleAuditProof>>,
    r: Option<Box<MerkleAuditProof>>,
    h: Option<Digest>,
    value: Option<LeafValue>,
}

impl<'de> Deserialize<'de> for MerkleAuditProof {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ProofNode::deserialize(deserializer)? {
            ProofNode {
                l: Some(left),
                r: Some(right),
                h: None,
                value: None,
            } => Ok(Self::Branch { left, right }),
            ProofNode {
                l: None,
                r: None,
                h: Some(hash),
                value: None,
            } => Ok(Self::Sibling { hash }),
            ProofNode {
                l: None,
                r: None,
                h: None,
                value: Some(value),
            } => Ok(Self::Leaf { value }),
            _ => Err(de::Error::custom(
                "proof node must be a branch {l, r}, a sibling {h} or a leaf {value}",
            )),
        }
    }
}

/// Outcome of folding a leaf through a proof skeleton
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProofVerdict {
    /// Root recomputed from the skeleton; `None` when the skeleton is malformed
    pub computed_root: Option<Digest>,
    /// Whether the skeleton embeds exactly one leaf and that leaf is the expected value
    pub contains_leaf: bool,
}

impl ProofVerdict {
    fn malformed() -> Self {
        Self {
            computed_root: None,
            contains_leaf: false,
        }
    }
}

#[derive(Default)]
struct FoldState {
    leaves: usize,
    matched: bool,
}

/// Recompute the root from `proof` and check that it embeds `leaf`.
///
/// Never fails: skeletons nested deeper than [`MAX_PROOF_DEPTH`], or embedding zero or
/// several leaves, are reported as malformed.
pub fn verify(proof: &MerkleAuditProof, leaf: &[u8]) -> ProofVerdict {
    let mut state = FoldState::default();
    let Some(root) = fold(proof, leaf, 0, &mut state) else {
        return ProofVerdict::malformed();
    };
    if state.leaves != 1 {
        return ProofVerdict::malformed();
    }
    ProofVerdict {
        computed_root: Some(root),
        contains_leaf: state.matched,
    }
}

fn fold(
    node: &MerkleAuditProof,
    leaf: &[u8],
    depth: usize,
    state: &mut FoldState,
) -> Option<Digest> {
    if depth > MAX_PROOF_DEPTH {
        return None;
    }
    match node {
        MerkleAuditProof::Branch { left, right } => {
            let left = fold(left, leaf, depth + 1, state)?;
            let right = fold(right, leaf, depth + 1, state)?;
            Some(hash_node(&left, &right))
        }
        MerkleAuditProof::Sibling { hash } => Some(*hash),
        MerkleAuditProof::Leaf { value } => {
            state.leaves += 1;
            state.matched |= value.as_bytes() == leaf;
            Some(hash_leaf(value.as_bytes()))
        }
    }
}
