//! # WattWatch — Prepaid Power Balance Monitor
//!
//! Logs into the campus power portal on a schedule, records the prepaid
//! balance, and notifies operators over Discord/Telegram/webhook.
//!
//! Usage:
//!   wattwatch                          # Start scheduler + gateway
//!   wattwatch --config watt.toml       # Custom config path
//!   wattwatch --once                   # Single crawl, print outcome, exit
//!   wattwatch --port 8700              # Gateway port override

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use wattwatch_chart::SvgChart;
use wattwatch_core::{BalanceExtractor, ChartRenderer, ReadingStore, WattConfig};
use wattwatch_extract::PortalClient;
use wattwatch_gateway::AppState;
use wattwatch_notify::NotifyRouter;
use wattwatch_scheduler::{ScheduleEngine, TaskExecutor};
use wattwatch_store::SqliteStore;

#[derive(Parser)]
#[command(name = "wattwatch", version, about = "⚡ WattWatch — prepaid power balance monitor")]
struct Cli {
    /// Config file path (default: ~/.wattwatch/config.toml)
    #[arg(short, long)]
    config: Option<String>,

    /// Gateway port override
    #[arg(short, long)]
    port: Option<u16>,

    /// Run a single crawl, print the outcome as JSON, and exit
    #[arg(long)]
    once: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "wattwatch=debug,tower_http=debug"
    } else {
        "wattwatch=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    // Load and validate config before wiring anything up
    let mut config = match &cli.config {
        Some(path) => WattConfig::load_from(Path::new(&expand_path(path)))?,
        None => WattConfig::load()?,
    };
    if let Some(port) = cli.port {
        config.gateway.port = port;
    }
    config.validate()?;

    let db_path = PathBuf::from(expand_path(&config.storage.db_path));
    let artifact_dir = PathBuf::from(expand_path(&config.storage.artifact_dir));

    // Collaborators
    let store: Arc<dyn ReadingStore> = Arc::new(SqliteStore::open(&db_path)?);
    let extractor: Arc<dyn BalanceExtractor> =
        Arc::new(PortalClient::new(config.portal.clone(), &artifact_dir));
    let renderer: Arc<dyn ChartRenderer> = Arc::new(SvgChart::new(&artifact_dir.join("charts")));
    let router = Arc::new(NotifyRouter::from_config(&config.notify)?);

    // Core triad
    let executor = TaskExecutor::new(extractor, store.clone(), config.retry.clone());
    let engine = ScheduleEngine::new(&config, executor, router.clone(), store.clone(), Some(renderer))?;

    if cli.once {
        let outcome = engine
            .trigger_manual()
            .await
            .map_err(|e| anyhow::anyhow!("{e}"))?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    println!("⚡ WattWatch v{}", env!("CARGO_PKG_VERSION"));
    println!("   ⏰ Crawl schedule:  {}", config.schedule.cron);
    println!("   📊 Rollup schedule: {}", config.schedule.rollup_cron);
    println!("   🗄️  Database:        {}", db_path.display());
    println!("   📮 Channels:        {}", router.channel_count());
    if config.gateway.enabled {
        println!(
            "   🌐 Gateway:         http://{}:{}",
            config.gateway.host, config.gateway.port
        );
    }
    println!();

    router.notify_startup().await;

    let scheduler_task = tokio::spawn(engine.clone().run());

    if config.gateway.enabled {
        let state = AppState {
            engine: engine.clone(),
            store: store.clone(),
            start_time: std::time::Instant::now(),
        };
        let host = config.gateway.host.clone();
        let port = config.gateway.port;
        tokio::spawn(async move {
            if let Err(e) = wattwatch_gateway::serve(state, &host, port).await {
                tracing::error!("Gateway exited: {e}");
            }
        });
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("🛑 Shutdown signal received, stopping scheduler");
    engine.stop();
    let _ = scheduler_task.await;
    tracing::info!("👋 WattWatch stopped");
    Ok(())
}
