use std::sync::Arc;

use d_registry::start_server;
use d_registry::Error;
use d_registry::HealthStatus;
use d_registry::Member;
use d_registry::Registrator;
use d_registry::RegistryBuilder;
use d_registry::RegistryConfig;
use d_registry::Replication;
use d_registry::ReplicationServer;
use d_registry::Result;
use d_registry::StaticMembership;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing::warn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    init_observability();

    let settings = RegistryConfig::new()?.validate()?;

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    if settings.monitoring.metrics_enabled {
        tokio::spawn(start_server(settings.monitoring.prometheus_port, graceful_rx.clone()));
    }

    let self_member = Member::new(settings.cluster.self_ip, settings.cluster.self_port);
    let peers = settings
        .cluster
        .members
        .iter()
        .map(|peer| Member::new(peer.ip, peer.port))
        .filter(|member| member.id != self_member.id)
        .collect();
    let membership = StaticMembership::with_members(peers);
    let registrator: Arc<dyn Registrator> = membership.registrator(self_member.clone());

    let mut builder = RegistryBuilder::new(settings.catalog.clone());
    let mut server = None;
    if settings.replication.enabled {
        let replication = Arc::new(
            ReplicationServer::new(settings.replication.clone(), membership.clone(), registrator).await?,
        );
        builder = builder.replication(replication.clone(), settings.replication.clone());
        server = Some(replication);
    } else {
        info!("Replication disabled; serving local catalogs only");
    }

    let registry = builder.build().await?;
    info!(member = %self_member, "Registry started. Waiting for CTRL+C signal...");

    if let Some(server) = &server {
        let server = server.clone();
        let period = settings.replication.disconnected_threshold();
        let mut shutdown = graceful_rx.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = ticker.tick() => {
                        if let HealthStatus::Unhealthy { message } = server.health() {
                            warn!("Replication unhealthy: {}", message);
                        }
                    }
                }
            }
        });
    }

    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    if let Some(server) = server {
        server.stop().await;
    }
    info!(namespaces = registry.namespaces().len(), "Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt()).map_err(|e| Error::Fatal(format!("Cannot listen for SIGINT: {}", e)))?;
    let mut sigterm =
        signal(SignalKind::terminate()).map_err(|e| Error::Fatal(format!("Cannot listen for SIGTERM: {}", e)))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx.send(()).map_err(|e| {
        error!("Failed to send shutdown signal: {}", e);
        Error::Fatal(format!("Failed to send shutdown signal: {}", e))
    })?;

    info!("Shutdown completed");
    Ok(())
}

fn init_observability() {
    let base_subscriber = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(EnvFilter::from_default_env());
    tracing_subscriber::registry().with(base_subscriber).init();
}
