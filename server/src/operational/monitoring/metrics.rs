// world_server_core/server/src/operational/monitoring/metrics.rs
use anyhow::{Context, Result};
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::time::Instant;

pub struct MetricsSystem {
    start_time: Instant,
}

impl MetricsSystem {
    /// Installs the Prometheus exporter on `port` and describes the world metrics.
    pub fn new(port: u16) -> Result<Self> {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;

        describe_histogram!("world_map_update_seconds", "Wall time of one map manager update");
        describe_gauge!("world_maps_loaded", "Maps currently in memory, instances included");
        describe_gauge!("world_instances_active", "Live instance maps");
        describe_gauge!("world_cells_loaded", "Grid cells loaded across all maps");
        describe_counter!("world_instances_created_total", "Instances created since startup");

        Ok(MetricsSystem { start_time: Instant::now() })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

// The macros are no-ops until an exporter is installed, so these are safe to
// call from tests and tools.

pub fn record_map_update(duration: f64) {
    histogram!("world_map_update_seconds").record(duration);
}

pub fn record_world_counts(maps: usize, instances: usize, cells: usize) {
    gauge!("world_maps_loaded").set(maps as f64);
    gauge!("world_instances_active").set(instances as f64);
    gauge!("world_cells_loaded").set(cells as f64);
}

pub fn record_instance_created() {
    counter!("world_instances_created_total").increment(1);
}

/// Library-side logging setup for tools and tests. Safe to call twice.
pub fn init_logging() -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "world_server_core=debug,warn".into()))
        .with(fmt::layer())
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
