use std::sync::Arc;

use futures::TryStreamExt;
use poi_verify::{BlockId, MilestoneIndex};
use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::{LedgerError, LedgerSource};

/// Collects the ordered cone of a milestone under a deadline.
///
/// The result is all-or-nothing: a stream error or an expired deadline discards whatever was
/// collected so far.
#[derive(Clone)]
pub struct ConeRetriever {
    source: Arc<dyn LedgerSource>,
}

impl ConeRetriever {
    pub fn new(source: Arc<dyn LedgerSource>) -> Self {
        Self { source }
    }

    pub async fn fetch_cone(
        &self,
        index: MilestoneIndex,
        deadline: Instant,
    ) -> Result<Vec<BlockId>, LedgerError> {
        let collect = self.source.milestone_cone(index).try_collect::<Vec<_>>();
        let cone = timeout_at(deadline, collect)
            .await
            .map_err(|_| LedgerError::Timeout)??;
        debug!("Milestone {} cone holds {} blocks", index, cone.len());
        Ok(cone)
    }
}
