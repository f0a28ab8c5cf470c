mod config;
mod seed;

use anyhow::Result;
use config::ServerConfig;
use oxpoll_engine::scheduler::WorkScheduler;
use oxpoll_engine::Engine;
use oxpoll_storage::engine::SqlitePollStore;
use oxpoll_storage::PollStore;
use oxpoll_transport::process::PluginProcess;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  oxpoll-server [config.toml]                       Start the server");
    eprintln!("  oxpoll-server seed-jobs <config.toml> <seed.json> Initialize poll jobs from seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    oxpoll_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("oxpoll=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("seed-jobs") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed-jobs requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("seed-jobs requires <seed.json> argument")
            })?;
            run_seed_jobs(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

fn run_seed_jobs(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let store = SqlitePollStore::new(Path::new(&config.data_dir))?;
    seed::seed_jobs_from_file(&store, seed_path)
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = match ServerConfig::load(config_path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(
                path = config_path,
                error = %e,
                "Config file not loaded, using defaults"
            );
            ServerConfig::default()
        }
    };

    tracing::info!(
        data_dir = %config.data_dir,
        plugin = %config.plugin.command,
        page_size = config.poller.page_size,
        "oxpoll-server starting"
    );

    let store: Arc<dyn PollStore> = Arc::new(SqlitePollStore::new(Path::new(&config.data_dir))?);

    // Transport startup is the only fatal failure path.
    let (transport, plugin) = PluginProcess::spawn(
        &config.plugin.command,
        &config.plugin.args,
        config.plugin.channel_capacity,
    )?;

    let engine_config = config.poller.engine_config();
    let engine = Engine::start(&engine_config, store.clone(), transport);

    let scheduler = WorkScheduler::new(
        store,
        engine.dispatcher.clone(),
        engine.aggregator.clone(),
        engine_config.scheduler_period,
        engine_config.page_size,
    );
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run().await;
    });

    tracing::info!("Server started");

    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    scheduler_handle.abort();
    engine.shutdown().await;
    plugin.shutdown().await;
    tracing::info!("Server stopped");

    Ok(())
}
