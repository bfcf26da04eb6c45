//! HTTP server exposing proof creation and validation under `/poi/v1`.

use std::{io, net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use poi_ledger_client::LedgerSource;
use poi_verify::{BlockId, ProofBundle};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::service::{ProofError, ProofService, ValidateProofRequest, ValidateProofResponse};

/// Route prefix announced to the node
pub const API_ROUTE: &str = "poi/v1";

/// Configuration for the RPC server
#[derive(Clone)]
pub struct RpcConfig {
    /// Host and port binding for the RPC server (e.g., "127.0.0.1:9687")
    pub bind_address: String,
    /// Host and port announced to the node (e.g., "poi.internal:9687"), defaults to the bound address
    pub advertise_address: Option<String>,
}

impl RpcConfig {
    /// Host and port to register with the node for a server bound to `local_addr`
    pub fn advertised_endpoint(&self, local_addr: SocketAddr) -> Result<(String, u16), io::Error> {
        let Some(address) = self.advertise_address.as_deref() else {
            if local_addr.ip().is_unspecified() {
                warn!(
                    "Advertising unspecified address {}, set an advertise address",
                    local_addr
                );
            }
            return Ok((local_addr.ip().to_string(), local_addr.port()));
        };
        let invalid = || {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid advertise address {address}"),
            )
        };
        let (host, port) = address.rsplit_once(':').ok_or_else(invalid)?;
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        if host.is_empty() {
            return Err(invalid());
        }
        Ok((host.to_string(), port))
    }
}

/// HTTP server that serves proofs and announces its route to the node while running
pub struct RpcServer {
    config: RpcConfig,
    service: Arc<ProofService>,
    ledger: Arc<dyn LedgerSource>,
    rx_shutdown: broadcast::Receiver<()>,
}

/// Error response carrying the status derived from a [`ProofError`]
pub struct ApiError(ProofError);

impl From<ProofError> for ApiError {
    fn from(err: ProofError) -> Self {
        Self(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self.0 {
            ProofError::InvalidInput(_) | ProofError::NotIncluded(_) => StatusCode::BAD_REQUEST,
            ProofError::NotFound(_) => StatusCode::NOT_FOUND,
            ProofError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProofError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            debug!("Request rejected: {}", self.0);
        }
        let body = json!({
            "error": {
                "code": status.as_str(),
                "message": self.0.to_string(),
            }
        });
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<ProofService>) -> Router {
    Router::new()
        .route("/poi/v1/create/:block_id", get(create_proof))
        .route("/poi/v1/validate", post(validate_proof))
        .with_state(service)
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

impl RpcServer {
    pub fn new(
        config: RpcConfig,
        service: Arc<ProofService>,
        ledger: Arc<dyn LedgerSource>,
        rx_shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            service,
            ledger,
            rx_shutdown,
        }
    }

    async fn run_inner(&self) -> Result<(), io::Error> {
        info!("Starting RPC server on {}", self.config.bind_address);

        let listener = TcpListener::bind(&self.config.bind_address).await?;
        let local_addr = listener.local_addr()?;
        let (host, port) = self.config.advertised_endpoint(local_addr)?;
        let mut rx_shutdown = self.rx_shutdown.resubscribe();

        match self.ledger.register_api_route(API_ROUTE, &host, port).await {
            Ok(()) => info!("Registered route {} at {}:{}", API_ROUTE, host, port),
            Err(err) => warn!("Failed to register route {}: {}", API_ROUTE, err),
        }

        let served = axum::serve(listener, router(self.service.clone()))
            .with_graceful_shutdown(async move { rx_shutdown.recv().await.unwrap_or_default() })
            .await;

        if let Err(err) = self.ledger.unregister_api_route(API_ROUTE).await {
            warn!("Failed to unregister route {}: {}", API_ROUTE, err);
        }
        served
    }

    pub async fn run(&self) -> Result<(), ()> {
        match self.run_inner().await {
            Err(err) => {
                error!("RPC server exited: {}", err);
                Err(())
            }
            Ok(()) => {
                info!("RPC server terminated");
                Ok(())
            }
        }
    }
}

/// Create an inclusion proof for a block
///
/// # Returns
/// * `Json<ProofBundle>` - Milestone, block and audit proof
/// * `400` - If the block ID is malformed or the block is not referenced by a milestone
/// * `404` - If the node does not know the block or its milestone
/// * `500` / `503` - On inconsistent ledger data or an unreachable node
pub async fn create_proof(
    State(service): State<Arc<ProofService>>,
    Path(block_id): Path<String>,
) -> Result<Json<ProofBundle>, ApiError> {
    let block_id = BlockId::from_str(&block_id)
        .map_err(|e| ProofError::InvalidInput(format!("invalid block ID {block_id}: {e}")))?;
    let bundle = service.create_proof(block_id).await?;
    Ok(Json(bundle))
}

/// Validate a proof bundle
///
/// # Returns
/// * `Json<ValidateProofResponse>` - Whether the proof holds
/// * `400` - If the body is not a proof bundle
pub async fn validate_proof(
    State(service): State<Arc<ProofService>>,
    payload: Result<Json<ValidateProofRequest>, JsonRejection>,
) -> Result<Json<ValidateProofResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ProofError::InvalidInput(e.body_text()))?;
    let response = service.validate_proof(request)?;
    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ledger_serving, MockLedger};
    use poi_merkle::Digest;
    use poi_verify::testutil::{node_configuration, ConeFixture, TestSigner};
    use poi_verify::MilestoneVerifier;
    use serde_json::Value;
    use std::time::Duration;

    fn signers() -> Vec<TestSigner> {
        (1..=3).map(TestSigner::new).collect()
    }

    fn service(ledger: MockLedger) -> Arc<ProofService> {
        let config = node_configuration(&signers(), 1, 1000, 2);
        let verifier = MilestoneVerifier::from_node_configuration(config).unwrap();
        Arc::new(ProofService::new(
            Arc::new(ledger),
            Arc::new(verifier),
            Duration::from_secs(5),
        ))
    }

    async fn serve(service: Arc<ProofService>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router(service)).await });
        format!("http://{addr}/poi/v1")
    }

    #[tokio::test]
    async fn test_create_and_validate_over_http() {
        let fixture = ConeFixture::new(42, 3, &signers());
        let base = serve(service(ledger_serving(&fixture))).await;
        let client = reqwest::Client::new();

        let response = client
            .get(format!("{base}/create/{}", fixture.cone[1]))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let bundle: Value = response.json().await.unwrap();
        assert_eq!(bundle["milestone"]["index"], 42);
        assert!(bundle["proof"].get("l").is_some());

        let response = client
            .post(format!("{base}/validate"))
            .json(&bundle)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let verdict: ValidateProofResponse = response.json().await.unwrap();
        assert!(verdict.valid);
    }

    #[tokio::test]
    async fn test_tampered_bundle_is_invalid_not_an_error() {
        let fixture = ConeFixture::new(42, 3, &signers());
        let base = serve(service(ledger_serving(&fixture))).await;
        let client = reqwest::Client::new();

        let mut bundle: Value = client
            .get(format!("{base}/create/{}", fixture.cone[0]))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        bundle["milestone"]["inclusionMerkleRoot"] = json!(Digest::new([1; 32]));

        let response = client
            .post(format!("{base}/validate"))
            .json(&bundle)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let verdict: ValidateProofResponse = response.json().await.unwrap();
        assert!(!verdict.valid);
    }

    #[tokio::test]
    async fn test_proof_with_two_values_is_invalid_not_an_error() {
        let fixture = ConeFixture::new(42, 3, &signers());
        let base = serve(service(ledger_serving(&fixture))).await;
        let client = reqwest::Client::new();

        let mut bundle: Value = client
            .get(format!("{base}/create/{}", fixture.cone[0]))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        bundle["proof"] = json!({
            "l": { "value": fixture.cone[0] },
            "r": { "value": fixture.cone[1] },
        });

        let response = client
            .post(format!("{base}/validate"))
            .json(&bundle)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let verdict: ValidateProofResponse = response.json().await.unwrap();
        assert!(!verdict.valid);
    }

    #[tokio::test]
    async fn test_malformed_block_id_is_bad_request() {
        let base = serve(service(MockLedger::new())).await;
        let response = reqwest::get(format!("{base}/create/0x1234")).await.unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"]["code"], "400");
    }

    #[tokio::test]
    async fn test_unknown_block_is_not_found() {
        let fixture = ConeFixture::new(42, 3, &signers());
        let base = serve(service(ledger_serving(&fixture))).await;
        let unknown = BlockId::new(Digest::new([9; 32]));
        let response = reqwest::get(format!("{base}/create/{unknown}")).await.unwrap();
        assert_eq!(response.status(), 404);
    }

    #[tokio::test]
    async fn test_malformed_and_incomplete_bodies_are_bad_requests() {
        let base = serve(service(MockLedger::new())).await;
        let client = reqwest::Client::new();

        let response = client
            .post(format!("{base}/validate"))
            .header("Content-Type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let response = client
            .post(format!("{base}/validate"))
            .json(&json!({ "block": { "data": "0x00" } }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        let body: Value = response.json().await.unwrap();
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("required"));
    }

    #[tokio::test]
    async fn test_route_is_registered_for_the_lifetime_of_the_server() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_register_api_route()
            .withf(|route, host, port| route == API_ROUTE && host == "127.0.0.1" && *port != 0)
            .times(1)
            .returning(|_, _, _| Ok(()));
        ledger
            .expect_unregister_api_route()
            .withf(|route| route == API_ROUTE)
            .times(1)
            .returning(|_| Ok(()));
        let ledger: Arc<dyn LedgerSource> = Arc::new(ledger);

        let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let server = RpcServer::new(
            RpcConfig {
                bind_address: "127.0.0.1:0".into(),
                advertise_address: None,
            },
            service(MockLedger::new()),
            ledger,
            rx_shutdown,
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx_shutdown.send(()).unwrap();
        });

        assert_eq!(server.run().await, Ok(()));
    }

    #[tokio::test]
    async fn test_advertise_address_is_registered_instead_of_wildcard_bind() {
        let mut ledger = MockLedger::new();
        ledger
            .expect_register_api_route()
            .withf(|route, host, port| route == API_ROUTE && host == "poi.internal" && *port == 9687)
            .times(1)
            .returning(|_, _, _| Ok(()));
        ledger
            .expect_unregister_api_route()
            .times(1)
            .returning(|_| Ok(()));
        let ledger: Arc<dyn LedgerSource> = Arc::new(ledger);

        let (tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let server = RpcServer::new(
            RpcConfig {
                bind_address: "0.0.0.0:0".into(),
                advertise_address: Some("poi.internal:9687".into()),
            },
            service(MockLedger::new()),
            ledger,
            rx_shutdown,
        );
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            tx_shutdown.send(()).unwrap();
        });

        assert_eq!(server.run().await, Ok(()));
    }

    #[test]
    fn test_advertised_endpoint() {
        let local_addr: SocketAddr = "0.0.0.0:4000".parse().unwrap();
        let config = |advertise: Option<&str>| RpcConfig {
            bind_address: "0.0.0.0:4000".into(),
            advertise_address: advertise.map(String::from),
        };

        assert_eq!(
            config(None).advertised_endpoint(local_addr).unwrap(),
            ("0.0.0.0".to_string(), 4000)
        );
        assert_eq!(
            config(Some("10.0.0.7:9687"))
                .advertised_endpoint(local_addr)
                .unwrap(),
            ("10.0.0.7".to_string(), 9687)
        );
        for malformed in ["poi.internal", "poi.internal:port", ":9687", "poi.internal:70000"] {
            let err = config(Some(malformed))
                .advertised_endpoint(local_addr)
                .unwrap_err();
            assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
        }
    }

    #[tokio::test]
    async fn test_bind_failure_is_an_error() {
        let (_tx_shutdown, rx_shutdown) = broadcast::channel(1);
        let server = RpcServer::new(
            RpcConfig {
                bind_address: "not an address".into(),
                advertise_address: None,
            },
            service(MockLedger::new()),
            Arc::new(MockLedger::new()),
            rx_shutdown,
        );
        assert_eq!(server.run().await, Err(()));
    }
}
