//! Ledger data model: block identifiers, blocks, milestones and the proof bundle exchanged
//! over the HTTP boundary.

use std::{fmt, str::FromStr};

use poi_merkle::{
    blake2b_256, decode_prefixed_hex, encode_prefixed_hex, Digest, HexError, MerkleAuditProof,
};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use crate::keys::KeyRange;

/// Checkpoint number of a milestone
pub type MilestoneIndex = u32;

/// Errors raised when a milestone essence cannot be reconstructed byte-exactly
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Milestone has {0} parents, at most 255 can be encoded")]
    TooManyParents(usize),
    #[error("Milestone metadata is {0} bytes, at most 65535 can be encoded")]
    MetadataTooLong(usize),
}

/// Block identifier: BLAKE2b-256 of the block's raw bytes
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(Digest);

impl BlockId {
    pub const fn new(digest: Digest) -> Self {
        Self(digest)
    }

    pub fn digest(&self) -> &Digest {
        &self.0
    }
}

impl AsRef<[u8]> for BlockId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_ref()
    }
}

impl FromStr for BlockId {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Digest::from_hex(s).map(Self)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl fmt::Debug for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlockId({})", self.0)
    }
}

/// Variable-length byte string, `0x`-prefixed hex in JSON
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct HexBytes(pub Vec<u8>);

impl HexBytes {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for HexBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_prefixed_hex(&self.0))
    }
}

impl Serialize for HexBytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&encode_prefixed_hex(&self.0))
    }
}

impl<'de> Deserialize<'de> for HexBytes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_prefixed_hex(&s)
            .map(Self)
            .map_err(serde::de::Error::custom)
    }
}

/// A block as stored by the ledger; its identifier is always recomputed from `data`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Canonical ledger encoding of the block
    pub data: HexBytes,
}

impl Block {
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: HexBytes(data),
        }
    }

    /// Recompute the block ID from the canonical encoding
    pub fn id(&self) -> BlockId {
        BlockId(blake2b_256(self.data.as_bytes()))
    }
}

/// Ed25519 public key trusted to sign milestones
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MilestonePublicKey([u8; 32]);

impl MilestonePublicKey {
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        slice.try_into().ok().map(Self)
    }
}

impl fmt::Display for MilestonePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode_prefixed_hex(&self.0))
    }
}

impl fmt::Debug for MilestonePublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MilestonePublicKey({self})")
    }
}

impl Serialize for MilestonePublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MilestonePublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = decode_prefixed_hex(&s).map_err(serde::de::Error::custom)?;
        Self::from_slice(&bytes).ok_or_else(|| {
            serde::de::Error::custom(format!("expected 32 byte public key, got {}", bytes.len()))
        })
    }
}

/// One signature attached to a milestone.
///
/// Both fields are kept as raw bytes so that a malformed entry only invalidates itself
/// instead of failing the whole request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneSignature {
    pub public_key: HexBytes,
    pub signature: HexBytes,
}

/// A milestone checkpoint with its inclusion root and signatures.
///
/// Unknown fields are rejected: milestone options are not modelled, and dropping them would
/// change the essence the signatures cover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Milestone {
    pub index: MilestoneIndex,
    pub timestamp: u32,
    pub protocol_version: u8,
    pub previous_milestone_id: Digest,
    pub parents: Vec<BlockId>,
    /// Merkle root over the ordered cone of blocks this milestone confirms
    pub inclusion_merkle_root: Digest,
    pub applied_merkle_root: Digest,
    #[serde(default)]
    pub metadata: HexBytes,
    pub signatures: Vec<MilestoneSignature>,
}

impl Milestone {
    /// Serialize the signed part of the milestone in the ledger's byte layout
    pub fn essence(&self) -> Result<Vec<u8>, EncodeError> {
        let parents_count = u8::try_from(self.parents.len())
            .map_err(|_| EncodeError::TooManyParents(self.parents.len()))?;
        let metadata_len = u16::try_from(self.metadata.0.len())
            .map_err(|_| EncodeError::MetadataTooLong(self.metadata.0.len()))?;

        let mut buf = Vec::with_capacity(
            4 + 4 + 1 + 32 + 1 + 32 * self.parents.len() + 32 + 32 + 2 + self.metadata.0.len() + 1,
        );
        buf.extend_from_slice(&self.index.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.push(self.protocol_version);
        buf.extend_from_slice(self.previous_milestone_id.as_bytes());
        buf.push(parents_count);
        for parent in &self.parents {
            buf.extend_from_slice(parent.as_ref());
        }
        buf.extend_from_slice(self.inclusion_merkle_root.as_bytes());
        buf.extend_from_slice(self.applied_merkle_root.as_bytes());
        buf.extend_from_slice(&metadata_len.to_le_bytes());
        buf.extend_from_slice(self.metadata.as_bytes());
        // Options count
        buf.push(0);
        Ok(buf)
    }

    /// Message covered by the milestone signatures: BLAKE2b-256 of the essence
    pub fn signing_message(&self) -> Result<Digest, EncodeError> {
        self.essence().map(|essence| blake2b_256(&essence))
    }
}

/// Milestone key configuration published by the node, read once at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfiguration {
    /// Number of valid signatures from distinct trusted keys a milestone needs
    pub milestone_public_key_count: u32,
    pub milestone_key_ranges: Vec<KeyRange>,
}

/// Milestone, block and audit proof: the output of proof creation and the input of validation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub milestone: Milestone,
    pub block: Block,
    pub proof: MerkleAuditProof,
}
