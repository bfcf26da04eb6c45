//! Mock ledger wired to serve a [`ConeFixture`].

use async_trait::async_trait;
use futures::{stream, StreamExt};
use mockall::mock;
use poi_ledger_client::{BlockMetadata, ConeStream, LedgerError, LedgerSource};
use poi_verify::testutil::ConeFixture;
use poi_verify::{Block, BlockId, Milestone, MilestoneIndex, NodeConfiguration};

mock! {
    pub Ledger {}

    #[async_trait]
    impl LedgerSource for Ledger {
        async fn node_configuration(&self) -> Result<NodeConfiguration, LedgerError>;
        async fn block_metadata(&self, block_id: &BlockId) -> Result<BlockMetadata, LedgerError>;
        async fn milestone(&self, index: MilestoneIndex) -> Result<Milestone, LedgerError>;
        async fn block(&self, block_id: &BlockId) -> Result<Block, LedgerError>;
        fn milestone_cone(&self, index: MilestoneIndex) -> ConeStream;
        async fn register_api_route(&self, route: &str, host: &str, port: u16) -> Result<(), LedgerError>;
        async fn unregister_api_route(&self, route: &str) -> Result<(), LedgerError>;
    }
}

/// Every fixture block is referenced by the fixture milestone, anything else is unknown
pub fn serve_metadata(ledger: &mut MockLedger, fixture: &ConeFixture) {
    let cone = fixture.cone.clone();
    let index = fixture.milestone.index;
    ledger.expect_block_metadata().returning(move |id| {
        if cone.contains(id) {
            Ok(BlockMetadata {
                block_id: *id,
                referenced_by_milestone_index: index,
            })
        } else {
            Err(LedgerError::NotFound(format!("block {id}")))
        }
    });
}

pub fn serve_milestone(ledger: &mut MockLedger, milestone: Milestone) {
    ledger.expect_milestone().returning(move |index| {
        if index == milestone.index {
            Ok(milestone.clone())
        } else {
            Err(LedgerError::NotFound(format!("milestone {index}")))
        }
    });
}

pub fn serve_blocks(ledger: &mut MockLedger, blocks: Vec<Block>) {
    ledger.expect_block().returning(move |id| {
        blocks
            .iter()
            .find(|block| block.id() == *id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("block {id}")))
    });
}

pub fn serve_cone(ledger: &mut MockLedger, cone: Vec<BlockId>) {
    ledger
        .expect_milestone_cone()
        .returning(move |_| stream::iter(cone.clone().into_iter().map(Ok)).boxed());
}

/// A ledger that answers consistently for every block of `fixture`
pub fn ledger_serving(fixture: &ConeFixture) -> MockLedger {
    let mut ledger = MockLedger::new();
    serve_metadata(&mut ledger, fixture);
    serve_milestone(&mut ledger, fixture.milestone.clone());
    serve_blocks(&mut ledger, fixture.blocks.clone());
    serve_cone(&mut ledger, fixture.cone.clone());
    ledger
}
