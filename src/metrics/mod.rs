//! Prometheus instrumentation.
//!
//! Catalog gauges/histograms live in a [`StoreMetrics`] handle so tests can
//! run isolated catalogs against unregistered collectors, while production
//! catalogs share the handle registered in [`REGISTRY`].
#[cfg(test)]
mod metrics_test;

use std::sync::Arc;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    static ref STORE_METRICS: Arc<StoreMetrics> = {
        let metrics = StoreMetrics::detached();
        metrics.register(&REGISTRY).expect("collector can be registered");
        Arc::new(metrics)
    };

    pub static ref REPLICATION_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("replication_events", "Replication events handed to peer streams"),
        &["event"]
    )
    .expect("metric can not be created");

    pub static ref REPLICATION_DROPPED_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("replication_dropped_events", "Replication events dropped on a full or closed channel"),
        &["channel"]
    )
    .expect("metric can not be created");

    pub static ref READ_REPAIR_REQUESTS: IntCounter = IntCounter::new(
        "replication_read_repair_requests",
        "Read repairs requested after a failed replicated renew"
    )
    .expect("metric can not be created");

    pub static ref CONNECTED_PEERS: IntGauge = IntGauge::new(
        "replication_connected_peers",
        "Peers currently streaming from this member"
    )
    .expect("metric can not be created");
}

/// Collectors updated by a namespace catalog
#[derive(Clone)]
pub struct StoreMetrics {
    /// Live instances
    pub instances: IntGauge,
    /// Live instances carrying metadata
    pub metadata_instances: IntGauge,
    /// Live instances carrying tags
    pub tags_instances: IntGauge,
    /// Metadata length in bytes, observed on registration
    pub metadata_length: Histogram,
    /// Tag count, observed on registration
    pub tags_length: Histogram,
    /// Instances removed because their lease ran out
    pub expirations: IntCounter,
    /// Seconds between registration and removal
    pub lifetime: Histogram,
}

impl StoreMetrics {
    /// Handle shared by every production catalog, registered in [`REGISTRY`]
    pub fn global() -> Arc<Self> {
        STORE_METRICS.clone()
    }

    /// Fresh, unregistered collectors
    pub fn detached() -> Self {
        StoreMetrics {
            instances: IntGauge::new("store_instances_count", "Live service instances")
                .expect("metric can not be created"),
            metadata_instances: IntGauge::new(
                "store_metadata_instances",
                "Live service instances with metadata",
            )
            .expect("metric can not be created"),
            tags_instances: IntGauge::new("store_tags_instances", "Live service instances with tags")
                .expect("metric can not be created"),
            metadata_length: Histogram::with_opts(
                HistogramOpts::new("store_metadata_length", "Metadata length in bytes")
                    .buckets(exponential_buckets(16.0, 2.0, 8).expect("valid buckets")),
            )
            .expect("metric can not be created"),
            tags_length: Histogram::with_opts(
                HistogramOpts::new("store_tags_length", "Number of tags per instance")
                    .buckets(exponential_buckets(1.0, 2.0, 6).expect("valid buckets")),
            )
            .expect("metric can not be created"),
            expirations: IntCounter::new(
                "store_instances_expiration",
                "Service instances evicted on lease expiry",
            )
            .expect("metric can not be created"),
            lifetime: Histogram::with_opts(
                HistogramOpts::new(
                    "store_instances_lifetime_seconds",
                    "Service instance lifetime in seconds",
                )
                .buckets(exponential_buckets(1.0, 4.0, 8).expect("valid buckets")),
            )
            .expect("metric can not be created"),
        }
    }

    pub fn register(
        &self,
        registry: &Registry,
    ) -> prometheus::Result<()> {
        registry.register(Box::new(self.instances.clone()))?;
        registry.register(Box::new(self.metadata_instances.clone()))?;
        registry.register(Box::new(self.tags_instances.clone()))?;
        registry.register(Box::new(self.metadata_length.clone()))?;
        registry.register(Box::new(self.tags_length.clone()))?;
        registry.register(Box::new(self.expirations.clone()))?;
        registry.register(Box::new(self.lifetime.clone()))?;
        Ok(())
    }
}

fn register_custom_metrics(registry: &Registry) {
    registry
        .register(Box::new(REPLICATION_EVENTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(REPLICATION_DROPPED_EVENTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(READ_REPAIR_REQUESTS.clone()))
        .expect("collector can be registered");
    registry
        .register(Box::new(CONNECTED_PEERS.clone()))
        .expect("collector can be registered");
}

/// Serves `/metrics` until `shutdown_signal` fires
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    register_custom_metrics(&REGISTRY);
    // Force the store collectors into the registry before the first scrape
    let _ = StoreMetrics::global();

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    info!("Prometheus exporter listening on port {}", port);
    let (_, server) =
        warp::serve(metrics_route).bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
            let _ = shutdown_signal.changed().await;
        });
    server.await;
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    Ok(gather_text(&REGISTRY))
}

pub(crate) fn gather_text(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode custom metrics: {}", e);
    };
    match String::from_utf8(buffer) {
        Ok(v) => v,
        Err(e) => {
            error!("custom metrics could not be from_utf8'd: {}", e);
            String::default()
        }
    }
}
