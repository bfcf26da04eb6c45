//! Trust anchor for milestone signatures and fail-closed validation of proof bundles.

use poi_merkle::{verify, Digest};
use thiserror::Error;

use crate::keys::KeyRangeRegistry;
use crate::model::{BlockId, Milestone, MilestoneIndex, NodeConfiguration, ProofBundle};
use crate::signature::{check_milestone_signatures, SignatureError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Milestone signature threshold must be at least 1")]
    ZeroThreshold,
}

/// Why a structurally valid proof bundle is not accepted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("Proof skeleton is malformed")]
    MalformedProof,
    #[error("Proof does not embed block {0}")]
    BlockNotInProof(BlockId),
    #[error("Milestone {index} signatures rejected: {source}")]
    Signatures {
        index: MilestoneIndex,
        #[source]
        source: SignatureError,
    },
    #[error("Proof root {computed} does not match milestone inclusion root {expected}")]
    RootMismatch { computed: Digest, expected: Digest },
}

/// Immutable milestone trust anchor: key validity windows plus the signature threshold
#[derive(Debug, Clone)]
pub struct MilestoneVerifier {
    registry: KeyRangeRegistry,
    required_signatures: usize,
}

impl MilestoneVerifier {
    pub fn new(registry: KeyRangeRegistry, required_signatures: usize) -> Result<Self, ConfigError> {
        if required_signatures == 0 {
            return Err(ConfigError::ZeroThreshold);
        }
        Ok(Self {
            registry,
            required_signatures,
        })
    }

    pub fn from_node_configuration(config: NodeConfiguration) -> Result<Self, ConfigError> {
        Self::new(
            KeyRangeRegistry::new(config.milestone_key_ranges),
            config.milestone_public_key_count as usize,
        )
    }

    pub fn registry(&self) -> &KeyRangeRegistry {
        &self.registry
    }

    pub fn required_signatures(&self) -> usize {
        self.required_signatures
    }

    /// Check the milestone signatures against the keys trusted at its index
    pub fn verify_milestone(&self, milestone: &Milestone) -> Result<usize, SignatureError> {
        let key_set = self.registry.public_key_set(milestone.index);
        check_milestone_signatures(milestone, &key_set, self.required_signatures)
    }

    /// Validate a proof bundle, returning the authenticated inclusion root.
    ///
    /// The block ID is recomputed from the block bytes; the proof must embed it, the
    /// milestone must carry enough trusted signatures and the recomputed root must equal the
    /// milestone's inclusion root.
    pub fn validate_bundle(&self, bundle: &ProofBundle) -> Result<Digest, Rejection> {
        let block_id = bundle.block.id();

        let verdict = verify(&bundle.proof, block_id.as_ref());
        let computed = verdict.computed_root.ok_or(Rejection::MalformedProof)?;
        if !verdict.contains_leaf {
            return Err(Rejection::BlockNotInProof(block_id));
        }

        self.verify_milestone(&bundle.milestone)
            .map_err(|source| Rejection::Signatures {
                index: bundle.milestone.index,
                source,
            })?;

        let expected = bundle.milestone.inclusion_merkle_root;
        if computed != expected {
            return Err(Rejection::RootMismatch { computed, expected });
        }
        Ok(computed)
    }
}
