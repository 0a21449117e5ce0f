//! # Hashgraph Node Runtime
//!
//! Loads configuration, brings up telemetry, wires every subsystem, and
//! runs until cancelled. Exit codes match spec.md §6 exactly: 0 clean
//! shutdown, 1 startup failure, 2 fatal runtime error, 3 operator abort.

use std::path::PathBuf;

use node_runtime::{NodeConfig, NodeError, PlatformContext, RunningNode};

fn config_path() -> Option<PathBuf> {
    std::env::args().nth(1).map(PathBuf::from)
}

async fn run() -> Result<(), NodeError> {
    let config = NodeConfig::load(config_path().as_deref())?;

    let telemetry_config = quantum_telemetry::TelemetryConfig::for_subsystem("node", "runtime");
    let _telemetry_guard = quantum_telemetry::init_telemetry(telemetry_config).await?;

    tracing::info!(node_id = config.node_id, listen_addr = %config.listen_addr, "starting node");

    let ctx = PlatformContext::bootstrap(config)?;
    let cancellation = ctx.cancellation.clone();
    let node = RunningNode::build(ctx)?;

    let ctrl_c = tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal, cancelling");
        cancellation.cancel();
    });

    let result = node.join().await;
    ctrl_c.abort();
    result
}

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(()) => 0,
        Err(err) => {
            tracing::error!(error = %err, "node exiting with error");
            err.exit_code()
        }
    };
    std::process::exit(exit_code);
}
