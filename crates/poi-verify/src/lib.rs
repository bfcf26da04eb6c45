//! Proof-of-inclusion verification library
//!
//! This crate holds the ledger data model (blocks, milestones, proof bundles), the registry of
//! trusted milestone key ranges, milestone signature checks and the pure validation of a
//! proof bundle against that trust anchor.

pub mod keys;
pub mod model;
pub mod signature;
pub mod verify;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;

pub use keys::{KeyRange, KeyRangeError, KeyRangeRegistry};
pub use model::{
    Block, BlockId, EncodeError, HexBytes, Milestone, MilestoneIndex, MilestonePublicKey,
    MilestoneSignature, NodeConfiguration, ProofBundle,
};
pub use signature::{check_milestone_signatures, verify_milestone_signatures, SignatureError};
pub use verify::{ConfigError, MilestoneVerifier, Rejection};
