//! JSON-RPC implementation of [`LedgerSource`] over HTTP.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use futures::{stream, StreamExt, TryStreamExt};
use jsonrpsee::core::client::{ClientT, Error as RpcError};
use jsonrpsee::core::params::ArrayParams;
use jsonrpsee::http_client::{HeaderMap, HeaderValue, HttpClient};
use jsonrpsee::rpc_params;
use poi_verify::{Block, BlockId, HexBytes, Milestone, MilestoneIndex, NodeConfiguration};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::{BlockMetadata, ConeStream, LedgerError, LedgerSource};

/// Default HTTP request timeout
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Default number of block IDs requested per cone page
pub const DEFAULT_CONE_PAGE_SIZE: u32 = 1000;

/// JSON-RPC error code the node uses for unknown blocks and milestones
const NOT_FOUND_ERROR_CODE: i32 = -32004;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConePage {
    block_ids: Vec<BlockId>,
    #[serde(default)]
    next_cursor: Option<u64>,
}

/// Ledger node RPC client
#[derive(Clone)]
pub struct LedgerClient {
    client: Arc<HttpClient>,
    cone_page_size: u32,
}

impl LedgerClient {
    /// Create a new ledger RPC client, optionally authenticating with `user:password`
    pub fn new(
        url: String,
        userpwd: Option<String>,
        request_timeout: Duration,
    ) -> Result<Self, LedgerError> {
        let mut headers = HeaderMap::new();
        if let Some(userpwd) = userpwd {
            let creds = general_purpose::STANDARD.encode(userpwd);
            headers.insert(
                "Authorization",
                HeaderValue::from_str(&format!("Basic {creds}"))
                    .map_err(|_| LedgerError::InvalidHeader)?,
            );
        };

        let client = HttpClient::builder()
            .set_headers(headers)
            .request_timeout(request_timeout)
            .build(url)?;

        Ok(Self {
            client: Arc::new(client),
            cone_page_size: DEFAULT_CONE_PAGE_SIZE,
        })
    }

    pub fn with_cone_page_size(mut self, cone_page_size: u32) -> Self {
        self.cone_page_size = cone_page_size.max(1);
        self
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: ArrayParams,
        subject: impl Fn() -> String,
    ) -> Result<T, LedgerError> {
        call(&self.client, method, params, subject).await
    }
}

async fn call<T: DeserializeOwned>(
    client: &HttpClient,
    method: &str,
    params: ArrayParams,
    subject: impl Fn() -> String,
) -> Result<T, LedgerError> {
    client
        .request(method, params)
        .await
        .map_err(|err| match err {
            RpcError::Call(obj) if obj.code() == NOT_FOUND_ERROR_CODE => {
                LedgerError::NotFound(subject())
            }
            RpcError::ParseError(err) => LedgerError::Decode(format!("{method}: {err}")),
            other => LedgerError::RpcClient(other),
        })
}

#[async_trait]
impl LedgerSource for LedgerClient {
    async fn node_configuration(&self) -> Result<NodeConfiguration, LedgerError> {
        self.request("node_configuration", rpc_params![], || {
            "node configuration".to_string()
        })
        .await
    }

    async fn block_metadata(&self, block_id: &BlockId) -> Result<BlockMetadata, LedgerError> {
        let metadata: BlockMetadata = self
            .request("node_blockMetadata", rpc_params![block_id.to_string()], || {
                format!("block {block_id}")
            })
            .await?;
        if metadata.block_id != *block_id {
            return Err(LedgerError::Decode(format!(
                "metadata for block {} returned for {}",
                metadata.block_id, block_id
            )));
        }
        Ok(metadata)
    }

    async fn milestone(&self, index: MilestoneIndex) -> Result<Milestone, LedgerError> {
        let milestone: Milestone = self
            .request("node_milestone", rpc_params![index], || {
                format!("milestone {index}")
            })
            .await?;
        if milestone.index != index {
            return Err(LedgerError::Decode(format!(
                "milestone {} returned for {}",
                milestone.index, index
            )));
        }
        Ok(milestone)
    }

    async fn block(&self, block_id: &BlockId) -> Result<Block, LedgerError> {
        let data: HexBytes = self
            .request("node_block", rpc_params![block_id.to_string()], || {
                format!("block {block_id}")
            })
            .await?;
        let block = Block { data };
        let actual = block.id();
        if actual != *block_id {
            return Err(LedgerError::Decode(format!(
                "block bytes hash to {actual}, requested {block_id}"
            )));
        }
        Ok(block)
    }

    fn milestone_cone(&self, index: MilestoneIndex) -> ConeStream {
        let client = self.client.clone();
        let page_size = self.cone_page_size;

        stream::try_unfold(Some(0u64), move |cursor| {
            let client = client.clone();
            async move {
                let Some(cursor) = cursor else {
                    return Ok::<_, LedgerError>(None);
                };
                let page: ConePage = call(
                    &client,
                    "node_milestoneCone",
                    rpc_params![index, cursor, page_size],
                    || format!("cone of milestone {index}"),
                )
                .await?;
                debug!(
                    "Milestone {} cone page at cursor {}: {} blocks",
                    index,
                    cursor,
                    page.block_ids.len()
                );

                if let Some(next) = page.next_cursor {
                    if next <= cursor || page.block_ids.is_empty() {
                        return Err(LedgerError::Decode(format!(
                            "cone of milestone {index} does not advance past cursor {cursor}"
                        )));
                    }
                }
                let blocks = stream::iter(page.block_ids.into_iter().map(Ok::<_, LedgerError>));
                Ok(Some((blocks, page.next_cursor)))
            }
        })
        .try_flatten()
        .boxed()
    }

    async fn register_api_route(
        &self,
        route: &str,
        host: &str,
        port: u16,
    ) -> Result<(), LedgerError> {
        let _: serde_json::Value = self
            .request("node_registerApiRoute", rpc_params![route, host, port], || {
                format!("route {route}")
            })
            .await?;
        Ok(())
    }

    async fn unregister_api_route(&self, route: &str) -> Result<(), LedgerError> {
        let _: serde_json::Value = self
            .request("node_unregisterApiRoute", rpc_params![route], || {
                format!("route {route}")
            })
            .await?;
        Ok(())
    }
}
