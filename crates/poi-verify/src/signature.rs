//! Threshold verification of milestone Ed25519 signatures against a trusted key set.

use std::collections::HashSet;

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;
use tracing::debug;

use crate::model::{EncodeError, Milestone, MilestonePublicKey, MilestoneSignature};

/// Reasons a milestone fails signature verification.
///
/// `Essence` means verification could not be carried out at all; the other variants mean the
/// signatures were checked and found insufficient.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("Signing payload could not be reconstructed: {0}")]
    Essence(#[from] EncodeError),
    #[error("Signature threshold must be at least 1")]
    ZeroThreshold,
    #[error("{valid} valid signatures from distinct trusted keys, {required} required")]
    BelowThreshold { valid: usize, required: usize },
}

/// Count signatures that are valid over the signing message and come from distinct keys of
/// `key_set`, and require at least `required` of them.
///
/// Malformed keys or signatures, untrusted keys and repeated keys never count, they do not
/// abort the check either.
pub fn check_milestone_signatures(
    milestone: &Milestone,
    key_set: &HashSet<MilestonePublicKey>,
    required: usize,
) -> Result<usize, SignatureError> {
    if required == 0 {
        return Err(SignatureError::ZeroThreshold);
    }
    let message = milestone.signing_message()?;

    let mut signers = HashSet::new();
    for (position, entry) in milestone.signatures.iter().enumerate() {
        match verify_entry(entry, key_set, message.as_bytes()) {
            Ok(public_key) => {
                if !signers.insert(public_key) {
                    debug!(
                        "Milestone {} signature #{} repeats key {}",
                        milestone.index, position, public_key
                    );
                }
            }
            Err(reason) => debug!(
                "Milestone {} signature #{} ignored: {}",
                milestone.index, position, reason
            ),
        }
    }

    let valid = signers.len();
    if valid < required {
        return Err(SignatureError::BelowThreshold { valid, required });
    }
    Ok(valid)
}

/// Boolean form of [`check_milestone_signatures`]
pub fn verify_milestone_signatures(
    milestone: &Milestone,
    key_set: &HashSet<MilestonePublicKey>,
    required: usize,
) -> bool {
    match check_milestone_signatures(milestone, key_set, required) {
        Ok(_) => true,
        Err(err) => {
            debug!("Milestone {} signatures rejected: {}", milestone.index, err);
            false
        }
    }
}

fn verify_entry(
    entry: &MilestoneSignature,
    key_set: &HashSet<MilestonePublicKey>,
    message: &[u8],
) -> Result<MilestonePublicKey, &'static str> {
    let public_key = MilestonePublicKey::from_slice(entry.public_key.as_bytes())
        .ok_or("public key is not 32 bytes")?;
    if !key_set.contains(&public_key) {
        return Err("public key is not trusted at this index");
    }
    let signature_bytes: [u8; 64] = entry
        .signature
        .as_bytes()
        .try_into()
        .map_err(|_| "signature is not 64 bytes")?;
    let verifying_key = VerifyingKey::from_bytes(public_key.as_bytes())
        .map_err(|_| "public key is not a valid curve point")?;
    verifying_key
        .verify(message, &Signature::from_bytes(&signature_bytes))
        .map_err(|_| "signature does not match")?;
    Ok(public_key)
}
