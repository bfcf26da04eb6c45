//! Proof of inclusion node: creates and validates proofs that a block was confirmed by a
//! signed milestone, backed by a ledger node's JSON-RPC interface.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use clap::{command, Parser};
use poi_ledger_client::{LedgerClient, LedgerSource};
use tokio::task::JoinHandle;
use tracing::{error, info, subscriber::set_global_default};
use tracing_subscriber::filter::EnvFilter;

use crate::{
    rpc::{RpcConfig, RpcServer},
    service::ProofService,
    shutdown::Shutdown,
    trust::{load_verifier, CONFIGURATION_RETRY_WINDOW},
};

mod rpc;
mod service;
mod shutdown;
#[cfg(test)]
mod testutil;
mod trust;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// HTTP server host and port
    #[arg(long, default_value = "127.0.0.1:9687")]
    bind_address: String,
    /// Host and port announced to the node when registering the API route (defaults to the bound address)
    #[arg(long, env = "ADVERTISE_ADDRESS")]
    advertise_address: Option<String>,
    /// Ledger node RPC URL
    #[arg(long, env = "NODE_RPC")]
    node_rpc_url: String,
    /// Ledger node RPC user:password (optional)
    #[arg(long, env = "USERPWD")]
    node_rpc_userpwd: Option<String>,
    /// Deadline for all ledger calls made while creating one proof
    #[arg(long, default_value = "5")]
    request_timeout_secs: u64,
    /// Number of block IDs fetched per milestone cone page
    #[arg(long, default_value = "1000")]
    cone_page_size: u32,
    /// Logging level (off, error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let subscriber_builder =
        tracing_subscriber::fmt::Subscriber::builder().with_env_filter(env_filter);

    let subscriber = subscriber_builder.with_writer(std::io::stderr).finish();
    set_global_default(subscriber).expect("Failed to set subscriber");
}

/// Connect to the ledger node, load the trust anchor and assemble the HTTP server
async fn build_rpc_server(cli: Cli, shutdown: &Shutdown) -> anyhow::Result<RpcServer> {
    let request_timeout = Duration::from_secs(cli.request_timeout_secs);
    let client = LedgerClient::new(cli.node_rpc_url, cli.node_rpc_userpwd, request_timeout)
        .context("Failed to create ledger client")?
        .with_cone_page_size(cli.cone_page_size);
    let ledger: Arc<dyn LedgerSource> = Arc::new(client);

    let verifier = load_verifier(ledger.as_ref(), CONFIGURATION_RETRY_WINDOW).await?;
    let service = ProofService::new(ledger.clone(), Arc::new(verifier), request_timeout);

    let rpc_config = RpcConfig {
        bind_address: cli.bind_address,
        advertise_address: cli.advertise_address,
    };
    Ok(RpcServer::new(
        rpc_config,
        Arc::new(service),
        ledger,
        shutdown.subscribe(),
    ))
}

#[tokio::main]
async fn main() {
    // Load environment variables from .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    info!("POI node is launching...");

    let shutdown = Shutdown::default();
    let rpc_server = match build_rpc_server(cli, &shutdown).await {
        Ok(rpc_server) => rpc_server,
        Err(err) => {
            error!("POI node failed to start: {:#}", err);
            std::process::exit(1);
        }
    };

    let rpc_handle = tokio::spawn(async move { rpc_server.run().await });
    let shutdown_handle = tokio::spawn(async move { shutdown.run().await });

    // If at least one component exits with an error, the node will exit with an error
    match tokio::try_join!(flatten(rpc_handle), flatten(shutdown_handle)) {
        Ok(_) => {
            info!("POI node has shut down");
            std::process::exit(0);
        }
        Err(_) => {
            error!("POI node has exited with error");
            std::process::exit(1);
        }
    }
}

async fn flatten<T>(handle: JoinHandle<Result<T, ()>>) -> Result<T, ()> {
    match handle.await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(err)) => Err(err),
        Err(_) => Err(()),
    }
}
