//! Merkle tree engine for milestone proofs of inclusion
//!
//! This crate builds and verifies audit proofs over an ordered sequence of leaves using
//! domain-separated BLAKE2b-256 hashing, bit-compatible with the ledger's own inclusion
//! root computation.

pub mod digest;
pub mod hasher;
pub mod proof;
pub mod tree;

pub use digest::{decode_prefixed_hex, encode_prefixed_hex, Digest, HexError};
pub use hasher::{
    blake2b_256, empty_root, hash_leaf, hash_node, LEAF_HASH_PREFIX, NODE_HASH_PREFIX,
};
pub use proof::{verify, LeafValue, MerkleAuditProof, ProofVerdict, MAX_PROOF_DEPTH};
pub use tree::{build_proof, compute_root, MerkleError};
