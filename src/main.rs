//! zephra-hmr - standalone live-update server
//!
//! Watches a project directory and pushes update decisions to browsers
//! that loaded the client script.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use zephra_hmr::{HmrConfig, HmrServer};

#[derive(Parser)]
#[command(name = "zephra-hmr")]
#[command(author, version)]
#[command(about = "Live-update server for the Zephra development server")]
struct Cli {
    /// Config file (defaults to $ZEPHRA_HMR_CONFIG or ./zephra.hmr.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen port
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory to watch
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Per-file debounce window in milliseconds
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Reload component files instead of refreshing them in place
    #[arg(long)]
    no_fast_refresh: bool,
}

impl Cli {
    fn resolve_config(&self) -> Result<HmrConfig> {
        let path = self.config.clone().unwrap_or_else(HmrConfig::default_path);
        let mut config = HmrConfig::load(&path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
            .with_env_overrides()
            .context("Invalid environment override")?;

        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(root) = &self.root {
            config.watch_dir = root.clone();
        }
        if let Some(ms) = self.debounce_ms {
            config.debounce_ms = ms;
        }
        if self.no_fast_refresh {
            config.fast_refresh = false;
        }
        Ok(config)
    }
}

fn init_logging() {
    let debug = std::env::var("ZEPHRA_DEBUG")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if debug {
        builder.filter_module("zephra_hmr", log::LevelFilter::Debug);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    let server = HmrServer::new(config);
    server.start().await.context("Failed to start live-update server")?;

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    log::info!("Shutdown requested");

    server.stop().await;
    Ok(())
}
