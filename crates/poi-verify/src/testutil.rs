//! Signed milestone and cone fixtures for tests.
//!
//! Enabled via the `test-util` feature flag.

use ed25519_dalek::{Signer, SigningKey};
use poi_merkle::{compute_root, Digest};

use crate::keys::KeyRange;
use crate::model::{
    Block, BlockId, HexBytes, Milestone, MilestoneIndex, MilestonePublicKey, MilestoneSignature,
    NodeConfiguration,
};

/// Deterministic Ed25519 milestone signer
#[derive(Clone)]
pub struct TestSigner {
    key: SigningKey,
}

impl TestSigner {
    pub fn new(seed: u8) -> Self {
        Self {
            key: SigningKey::from_bytes(&[seed; 32]),
        }
    }

    pub fn public_key(&self) -> MilestonePublicKey {
        MilestonePublicKey::new(self.key.verifying_key().to_bytes())
    }

    pub fn sign(&self, milestone: &Milestone) -> MilestoneSignature {
        let message = milestone
            .signing_message()
            .expect("test milestone essence must encode");
        MilestoneSignature {
            public_key: HexBytes(self.public_key().as_bytes().to_vec()),
            signature: HexBytes(self.key.sign(message.as_bytes()).to_bytes().to_vec()),
        }
    }
}

pub fn trusted_key(seed: u8) -> MilestonePublicKey {
    TestSigner::new(seed).public_key()
}

/// Milestone at `index` committing to `inclusion_merkle_root`, signed by every signer
pub fn signed_milestone(
    index: MilestoneIndex,
    inclusion_merkle_root: Digest,
    signers: &[TestSigner],
) -> Milestone {
    let mut milestone = Milestone {
        index,
        timestamp: 1_700_000_000 + index,
        protocol_version: 2,
        previous_milestone_id: Digest::new([0xaa; 32]),
        parents: vec![BlockId::new(Digest::new([0xbb; 32]))],
        inclusion_merkle_root,
        applied_merkle_root: Digest::new([0xcc; 32]),
        metadata: HexBytes(b"poi-fixture".to_vec()),
        signatures: Vec::new(),
    };
    milestone.signatures = signers.iter().map(|s| s.sign(&milestone)).collect();
    milestone
}

/// Node configuration trusting `signers` over `[start_index, end_index]`
pub fn node_configuration(
    signers: &[TestSigner],
    start_index: MilestoneIndex,
    end_index: MilestoneIndex,
    required: u32,
) -> NodeConfiguration {
    NodeConfiguration {
        milestone_public_key_count: required,
        milestone_key_ranges: signers
            .iter()
            .map(|s| {
                KeyRange::new(s.public_key(), start_index, end_index)
                    .expect("test key range must be ordered")
            })
            .collect(),
    }
}

/// A milestone together with the blocks of its cone, in confirmation order
pub struct ConeFixture {
    pub milestone: Milestone,
    pub blocks: Vec<Block>,
    pub cone: Vec<BlockId>,
}

impl ConeFixture {
    pub fn new(index: MilestoneIndex, block_count: usize, signers: &[TestSigner]) -> Self {
        let blocks: Vec<Block> = (0..block_count)
            .map(|i| Block::new(format!("block {i} of milestone {index}").into_bytes()))
            .collect();
        let cone: Vec<BlockId> = blocks.iter().map(Block::id).collect();
        let milestone = signed_milestone(index, compute_root(&cone), signers);
        Self {
            milestone,
            blocks,
            cone,
        }
    }
}
