//! Domain-separated BLAKE2b-256 hashing for Merkle leaves and internal nodes.

use blake2::{digest::consts::U32, Blake2b, Digest as _};

use crate::Digest;

/// Prefix prepended to leaf values before hashing
pub const LEAF_HASH_PREFIX: u8 = 0x00;
/// Prefix prepended to the concatenated children of an internal node
pub const NODE_HASH_PREFIX: u8 = 0x01;

type Blake2b256 = Blake2b<U32>;

/// BLAKE2b-256 of arbitrary bytes (used for block IDs and milestone signing messages)
pub fn blake2b_256(data: &[u8]) -> Digest {
    Digest::new(Blake2b256::digest(data).into())
}

/// Root of an empty leaf sequence: the hash of empty input
pub fn empty_root() -> Digest {
    blake2b_256(&[])
}

/// Hash a leaf value: `H(0x00 || value)`
pub fn hash_leaf(value: &[u8]) -> Digest {
    let mut hasher = Blake2b256::new();
    hasher.update([LEAF_HASH_PREFIX]);
    hasher.update(value);
    Digest::new(hasher.finalize().into())
}

/// Hash an internal node: `H(0x01 || left || right)`
pub fn hash_node(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Blake2b256::new();
    hasher.update([NODE_HASH_PREFIX]);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());
    Digest::new(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_leaf_and_node_domains_differ() {
        let left = hash_leaf(b"a");
        let right = hash_leaf(b"b");
        let node = hash_node(&left, &right);

        // The same 64 bytes hashed as a leaf must not collide with the node hash
        let mut concatenated = Vec::new();
        concatenated.extend_from_slice(left.as_bytes());
        concatenated.extend_from_slice(right.as_bytes());
        assert_ne!(hash_leaf(&concatenated), node);
        assert_ne!(blake2b_256(b"a"), left);
    }

    #[test]
    fn test_empty_root_is_hash_of_nothing() {
        assert_eq!(
            empty_root().to_hex(),
            "0x0e5751c026e543b2e8ab2eb06099daa1d1e5df47778f7787faab45cdf12fe3a8"
        );
    }
}
