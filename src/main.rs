//! myapp-operator: reconciles MyApp resources

use std::process;
use std::sync::Arc;

use clap::Parser;
use kube::Client;
use tracing::{error, info};

use myapp_operator::config::{init_tracing, OperatorConfig};
use myapp_operator::controller::{
    run_controller, ControllerState, KubeStore, Reconciler, FIELD_MANAGER,
};
use myapp_operator::error::{Error, Result};
use myapp_operator::rest_api;

#[tokio::main]
async fn main() {
    let config = OperatorConfig::parse();
    init_tracing(config.log_format);

    if let Err(e) = run(config).await {
        error!("Operator failed: {}", e);
        process::exit(1);
    }
}

async fn run(config: OperatorConfig) -> Result<()> {
    info!(
        namespace = config.namespace.as_deref().unwrap_or("<all>"),
        "Starting myapp-operator {}",
        env!("CARGO_PKG_VERSION")
    );

    let client = Client::try_default().await.map_err(Error::KubeError)?;
    let store = Arc::new(KubeStore::new(client.clone(), FIELD_MANAGER));
    let state = Arc::new(ControllerState {
        reconciler: Reconciler::new(store, config.settings()),
        retry_backoff: config.retry_backoff(),
        failure_backoff: config.failure_backoff(),
    });

    // the controller stops on SIGTERM/SIGINT; the server only returns on failure
    tokio::select! {
        res = rest_api::run_server(config.metrics_addr) => res?,
        res = run_controller(client, config.namespace.clone(), state) => res?,
    }

    info!("Controller shut down");
    Ok(())
}
