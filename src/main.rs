mod ai;
mod assembler;
mod config;
mod coords;
mod error;
mod exif_data;
mod gps;
mod metadata;
mod properties;
mod storage;
mod web_server;

use crate::ai::AiAnalyzer;
use crate::config::AppConfig;
use crate::storage::Storage;
use anyhow::Result;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::new()?;

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting image-metadata-api");

    let storage = Arc::new(Storage::new(
        &config.image_directory,
        &config.data_directory,
    )?);
    let analyzer = Arc::new(AiAnalyzer::new(&config));
    if !analyzer.is_configured() {
        info!("AI analysis disabled: no OpenAI API key configured");
    }

    if let Err(e) = web_server::start_web_server(Arc::new(config), storage, analyzer).await {
        log::error!("Web server error: {}", e);
    }

    info!("image-metadata-api finished");

    Ok(())
}
