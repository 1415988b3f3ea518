// world_server_core/server/src/main.rs
use world_server_core::core::config::ServerConfig;
use world_server_core::server::instance::WorldServer;

use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

fn init_logging() -> anyhow::Result<()> {
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "world_server_core=info,warn".into()),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set global default tracing subscriber: {}", e))?;
    info!("Tracing subscriber initialized.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        if let Some(location) = panic_info.location() {
            eprintln!("Location: {}:{}:{}", location.file(), location.line(), location.column());
        }

        // stderr may be gone under a supervisor
        if let Ok(mut file) = std::fs::OpenOptions::new().create(true).append(true).open("panic.log") {
            use std::io::Write;
            use std::time::SystemTime;

            let timestamp = SystemTime::now()
                .duration_since(SystemTime::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            writeln!(file, "PANIC at {}: {}", timestamp, panic_info).ok();
        }

        eprintln!("Backtrace:\n{:?}", std::backtrace::Backtrace::capture());
    }));

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {:?}", e);
        return Err(e);
    }

    let config_path = std::env::var("WORLD_CONFIG").unwrap_or_else(|_| "config/server.yaml".to_string());
    let data_dir = std::env::var("WORLD_DATA_DIR").unwrap_or_else(|_| "data".to_string());

    let config = ServerConfig::load(&config_path)?;
    info!(
        "Starting world server: tick {}Hz, {} map update threads, data from {}",
        config.tick_rate, config.thread_pools.map_update_threads, data_dir
    );

    let mut world = WorldServer::from_data_dir(config, &data_dir)?;
    if let Err(e) = world.install_metrics() {
        error!("Metrics disabled: {:?}", e);
    }
    world.start();

    let world = Arc::new(world);
    world.run_world_loop().await;

    info!("World server stopped.");
    Ok(())
}
