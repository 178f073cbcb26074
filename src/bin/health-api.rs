//! Backend half of the scaffold: serves `/` and `{base}/health`.
//! Run: cargo run --bin health-api -- [config.yaml]

use anyhow::Result;
use health_poller::{
    config,
    lifecycle::{init_tracing, shutdown_signal},
    metrics::{start_metrics_server, MetricsRegistry},
    server::{ApiHandler, HealthService, ServerBuilder},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&["health_poller=debug", "hyper=info"])?;

    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path)?;

    let health = HealthService::new(config.server.project_name.clone());
    let mut handler = ApiHandler::new(&config.server, &config.api.base_path, health);

    if config.metrics.enabled {
        let registry = Arc::new(MetricsRegistry::new()?);
        handler = handler.with_metrics(registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone()).await?;
    }

    let addr = config.server.bind_addr()?;
    info!(
        "Starting {} API v{} on {}",
        config.server.project_name, config.server.version, addr
    );

    ServerBuilder::new(addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await?;

    info!("Shutdown complete");
    Ok(())
}
