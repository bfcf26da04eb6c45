//! Proof creation and validation use cases.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use poi_ledger_client::{ConeRetriever, LedgerError, LedgerSource};
use poi_merkle::{build_proof, compute_root, MerkleAuditProof};
use poi_verify::{Block, BlockId, Milestone, MilestoneVerifier, ProofBundle};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::{timeout_at, Instant};
use tracing::debug;

/// Request-level failures, each surfaced with its own HTTP status
#[derive(Error, Debug)]
pub enum ProofError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Block {0} is not referenced by any milestone")]
    NotIncluded(BlockId),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Ledger node unavailable: {0}")]
    Transport(String),
}

impl From<LedgerError> for ProofError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(subject) => ProofError::NotFound(subject),
            err if err.is_transient() => ProofError::Transport(err.to_string()),
            err => ProofError::Internal(err.to_string()),
        }
    }
}

/// Body of a validation request; every part is required but checked explicitly so that a
/// missing one is reported as invalid input rather than a decoding failure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ValidateProofRequest {
    pub milestone: Option<Milestone>,
    pub block: Option<Block>,
    pub proof: Option<MerkleAuditProof>,
}

impl From<ProofBundle> for ValidateProofRequest {
    fn from(bundle: ProofBundle) -> Self {
        Self {
            milestone: Some(bundle.milestone),
            block: Some(bundle.block),
            proof: Some(bundle.proof),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateProofResponse {
    pub valid: bool,
}

/// Composes the ledger client, the Merkle engine and the milestone trust anchor
pub struct ProofService {
    ledger: Arc<dyn LedgerSource>,
    cones: ConeRetriever,
    verifier: Arc<MilestoneVerifier>,
    request_timeout: Duration,
}

impl ProofService {
    pub fn new(
        ledger: Arc<dyn LedgerSource>,
        verifier: Arc<MilestoneVerifier>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            cones: ConeRetriever::new(ledger.clone()),
            ledger,
            verifier,
            request_timeout,
        }
    }

    /// Build a proof that `block_id` is part of the cone of the milestone that referenced it.
    ///
    /// Every ledger call shares one deadline; the cone is fetched fresh on each call.
    pub async fn create_proof(&self, block_id: BlockId) -> Result<ProofBundle, ProofError> {
        let deadline = Instant::now() + self.request_timeout;

        let metadata = within(deadline, self.ledger.block_metadata(&block_id)).await?;
        let index = metadata
            .referenced_by()
            .ok_or(ProofError::NotIncluded(block_id))?;

        let milestone = within(deadline, self.ledger.milestone(index)).await?;
        let block = within(deadline, self.ledger.block(&block_id)).await?;
        let cone = self.cones.fetch_cone(index, deadline).await?;

        let position = cone.iter().position(|id| *id == block_id).ok_or_else(|| {
            ProofError::Internal(format!(
                "block {block_id} is referenced by milestone {index} but missing from its cone"
            ))
        })?;
        let proof = build_proof(&cone, position).map_err(|e| ProofError::Internal(e.to_string()))?;

        let root = compute_root(&cone);
        if root != milestone.inclusion_merkle_root {
            return Err(ProofError::Internal(format!(
                "cone of milestone {} hashes to {}, milestone commits to {}",
                index, root, milestone.inclusion_merkle_root
            )));
        }

        debug!(
            "Created proof for block {} at position {} of {} in milestone {}",
            block_id,
            position,
            cone.len(),
            index
        );
        Ok(ProofBundle {
            milestone,
            block,
            proof,
        })
    }

    /// Check a proof bundle. Only a structurally incomplete request is an error, every
    /// verification failure is reported as `valid: false`.
    pub fn validate_proof(
        &self,
        request: ValidateProofRequest,
    ) -> Result<ValidateProofResponse, ProofError> {
        let ValidateProofRequest {
            milestone: Some(milestone),
            block: Some(block),
            proof: Some(proof),
        } = request
        else {
            return Err(ProofError::InvalidInput(
                "milestone, block and proof are required".to_string(),
            ));
        };
        let bundle = ProofBundle {
            milestone,
            block,
            proof,
        };

        let valid = match self.verifier.validate_bundle(&bundle) {
            Ok(root) => {
                debug!(
                    "Proof for block {} verified against milestone {} root {}",
                    bundle.block.id(),
                    bundle.milestone.index,
                    root
                );
                true
            }
            Err(rejection) => {
                debug!(
                    "Proof for block {} rejected: {}",
                    bundle.block.id(),
                    rejection
                );
                false
            }
        };
        Ok(ValidateProofResponse { valid })
    }
}

async fn within<T>(
    deadline: Instant,
    fut: impl Future<Output = Result<T, LedgerError>>,
) -> Result<T, LedgerError> {
    timeout_at(deadline, fut)
        .await
        .map_err(|_| LedgerError::Timeout)?
}
