//! Startup load of the milestone trust anchor from the node configuration.

use std::time::Duration;

use anyhow::Context;
use poi_ledger_client::{retry_transient, LedgerSource};
use poi_verify::MilestoneVerifier;
use tracing::info;

/// Upper bound on how long startup waits for the node to answer
pub const CONFIGURATION_RETRY_WINDOW: Duration = Duration::from_secs(30);

/// Read the node configuration once and turn it into the immutable milestone verifier
pub async fn load_verifier(
    ledger: &dyn LedgerSource,
    retry_window: Duration,
) -> anyhow::Result<MilestoneVerifier> {
    let config = retry_transient(retry_window, || ledger.node_configuration())
        .await
        .context("Failed to read node configuration")?;

    let verifier = MilestoneVerifier::from_node_configuration(config)
        .context("Node configuration cannot anchor milestone verification")?;
    info!(
        "Loaded {} milestone key ranges, {} signatures required",
        verifier.registry().len(),
        verifier.required_signatures()
    );
    Ok(verifier)
}
