mod config;
mod downloader;
mod errors;
mod security;
mod server;
mod utils;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use clap::Parser;
use log::info;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{AppConfig, CliArgs};
use crate::downloader::ytdlp::YtDlpExtractor;
use crate::downloader::{DownloadManager, ProgressRegistry};
use crate::server::AppState;

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    let args = CliArgs::parse();
    let config = AppConfig::load(&args).context("failed to load configuration")?;
    let addr = config.bind_addr()?;

    info!("Starting ytdl-web at {}", chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
    info!("Open your browser at http://{}", addr);
    info!("Downloads will be saved to: {}", config.download_path.display());
    info!("yt-dlp and ffmpeg must be installed; respect the terms of service of the sites you download from");

    let extractor = Arc::new(YtDlpExtractor::from_config(&config));
    if let Err(e) = extractor.locate_transcoder() {
        log::warn!("{}; audio downloads and stream merging will fail", e);
    }

    let registry = ProgressRegistry::new(Duration::from_secs(config.job_ttl_secs), config.max_jobs);
    let manager = DownloadManager::new(extractor, registry, config.download_path.clone());

    let state = Arc::new(AppState {
        config: Arc::new(config),
        manager,
    });

    server::serve(state, addr, shutdown_signal()).await?;
    Ok(())
}
