// src/main.rs
use anyhow::Result;
use health_poller::{
    config,
    health::HealthClient,
    lifecycle::{init_tracing, shutdown_signal},
    metrics::{start_metrics_server, MetricsRegistry},
    poller::HealthPoller,
    view::{AppShell, HealthView},
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(&["health_poller=debug", "hyper=info"])?;

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path)?;

    let client = HealthClient::new(&config.api)?;
    info!("Polling {}", client.endpoint());

    let mut poller = HealthPoller::new(Arc::new(client), &config.poller);

    if config.metrics.enabled {
        let registry = Arc::new(MetricsRegistry::new()?);
        poller = poller.with_metrics(registry.collector());

        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, registry, config.metrics.path.clone()).await?;
    }

    let shell = AppShell::default();
    let mut activation = poller.activate();

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            snapshot = activation.changed() => {
                let Some(snapshot) = snapshot else { break };
                let view = HealthView::from_state(&snapshot.state);
                println!("{}", shell.render_text(&view));
                if let Some(path) = &config.view.html_path {
                    if let Err(e) = write_page(&shell, &view, path).await {
                        warn!("Failed to write {}: {:#}", path.display(), e);
                    }
                }
                if snapshot.is_fetching && !snapshot.is_loading() {
                    println!("(refreshing...)");
                }
                println!();
            }
            _ = &mut shutdown => break,
        }
    }

    activation.deactivate();
    Ok(())
}

async fn write_page(shell: &AppShell, view: &HealthView, path: &Path) -> Result<()> {
    let page = shell.render_html(view)?;
    tokio::fs::write(path, page).await?;
    Ok(())
}
