//! Ledger node client: block metadata, raw blocks, milestones and milestone cones, plus the
//! API route registration calls the proof service makes on startup and shutdown.

use async_trait::async_trait;
use futures::stream::BoxStream;
use poi_verify::{Block, BlockId, Milestone, MilestoneIndex, NodeConfiguration};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod client;
mod cone;
mod retry;

pub use client::{LedgerClient, DEFAULT_CONE_PAGE_SIZE, HTTP_REQUEST_TIMEOUT};
pub use cone::ConeRetriever;
pub use retry::retry_transient;

/// Error types for ledger node operations
#[derive(Error, Debug)]
pub enum LedgerError {
    /// The node does not know the requested object
    #[error("Not found: {0}")]
    NotFound(String),
    /// RPC client errors
    #[error("RPC client error: {0}")]
    RpcClient(#[from] jsonrpsee::core::client::Error),
    /// Invalid HTTP header value
    #[error("Invalid HTTP header value")]
    InvalidHeader,
    /// The node answered with something we cannot interpret
    #[error("Failed to decode node response: {0}")]
    Decode(String),
    /// The caller's deadline passed before the node answered
    #[error("Deadline exceeded")]
    Timeout,
}

impl LedgerError {
    /// Whether the failure is at the transport level (node unreachable or too slow)
    pub fn is_transient(&self) -> bool {
        use jsonrpsee::core::client::Error as RpcError;
        match self {
            LedgerError::Timeout => true,
            LedgerError::RpcClient(rpc_err) => matches!(
                rpc_err,
                RpcError::Transport(_)
                    | RpcError::RequestTimeout
                    | RpcError::RestartNeeded(_)
                    | RpcError::ServiceDisconnect
            ),
            _ => false,
        }
    }
}

/// Ledger metadata of a single block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockMetadata {
    pub block_id: BlockId,
    /// Index of the milestone that confirmed the block, 0 while unconfirmed
    #[serde(default)]
    pub referenced_by_milestone_index: MilestoneIndex,
}

impl BlockMetadata {
    pub fn referenced_by(&self) -> Option<MilestoneIndex> {
        match self.referenced_by_milestone_index {
            0 => None,
            index => Some(index),
        }
    }
}

/// Lazily fetched block IDs of a milestone cone, in the ledger's confirmation order
pub type ConeStream = BoxStream<'static, Result<BlockId, LedgerError>>;

/// Read access to the ledger node
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Milestone key ranges and signature threshold
    async fn node_configuration(&self) -> Result<NodeConfiguration, LedgerError>;

    async fn block_metadata(&self, block_id: &BlockId) -> Result<BlockMetadata, LedgerError>;

    async fn milestone(&self, index: MilestoneIndex) -> Result<Milestone, LedgerError>;

    async fn block(&self, block_id: &BlockId) -> Result<Block, LedgerError>;

    /// Stream the ordered cone of blocks confirmed by milestone `index`
    fn milestone_cone(&self, index: MilestoneIndex) -> ConeStream;

    async fn register_api_route(&self, route: &str, host: &str, port: u16)
        -> Result<(), LedgerError>;

    async fn unregister_api_route(&self, route: &str) -> Result<(), LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use poi_merkle::Digest;

    #[test]
    fn test_zero_reference_means_unconfirmed() {
        let metadata: BlockMetadata = serde_json::from_value(serde_json::json!({
            "blockId": format!("0x{}", "ab".repeat(32)),
            "referencedByMilestoneIndex": 0,
        }))
        .unwrap();
        assert_eq!(metadata.block_id, BlockId::new(Digest::new([0xab; 32])));
        assert_eq!(metadata.referenced_by(), None);

        let metadata = BlockMetadata {
            referenced_by_milestone_index: 42,
            ..metadata
        };
        assert_eq!(metadata.referenced_by(), Some(42));
    }

    #[test]
    fn test_missing_reference_defaults_to_unconfirmed() {
        let metadata: BlockMetadata = serde_json::from_value(serde_json::json!({
            "blockId": format!("0x{}", "01".repeat(32)),
        }))
        .unwrap();
        assert_eq!(metadata.referenced_by(), None);
    }

    #[test]
    fn test_transient_classification() {
        assert!(LedgerError::Timeout.is_transient());
        assert!(LedgerError::RpcClient(jsonrpsee::core::client::Error::RequestTimeout).is_transient());
        assert!(!LedgerError::NotFound("block".into()).is_transient());
        assert!(!LedgerError::Decode("bad".into()).is_transient());
    }
}
