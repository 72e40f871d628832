use std::path::PathBuf;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use scamwatch::classifier::Classifier;
use scamwatch::config::{self, Config};
use scamwatch::watcher;
use scamwatch::watermark::WatermarkStore;

#[tokio::main]
async fn main() {
    // Can be overridden with the RUST_LOG environment variable
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("scamwatch=debug,info")
        } else {
            EnvFilter::new("info")
        }
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Cannot load {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    let watermarks = match WatermarkStore::load(config.watermark_path()) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            error!("Cannot load watermark store: {}", e);
            std::process::exit(1);
        }
    };

    let classifier = Arc::new(Classifier::new(config.classifier.url.clone()));

    info!(accounts = config.accounts.len(), "Starting watchers");
    let handles: Vec<_> = config
        .accounts
        .into_iter()
        .map(|account| watcher::start_watching(account, classifier.clone(), watermarks.clone()))
        .collect();

    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Cannot listen for shutdown signal: {}", e);
    }

    info!("Shutting down");
    for handle in handles {
        info!(account = handle.label(), "Stopping watcher");
        handle.stop().await;
    }
}
