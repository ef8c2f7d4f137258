use anyhow::Result;
use authwatch_alert::report::TracingReporter;
use authwatch_alert::MetricSnapshotProvider;
use authwatch_notify::dispatcher::AlertDispatcher;
use authwatch_notify::AlertHistorySink;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;

use authwatch_server::config::ServerConfig;
use authwatch_server::engine::AuthAlertEngine;
use authwatch_server::history::JsonlHistorySink;
use authwatch_server::logging;
use authwatch_server::snapshot::{HttpSnapshotProvider, StaticSnapshotProvider};

const DEFAULT_CONFIG_PATH: &str = "config/authwatch.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  authwatch-server [config.toml]    Start the alert engine");
    eprintln!("  (default config path: {DEFAULT_CONFIG_PATH})");
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init()?;

    let args: Vec<String> = std::env::args().collect();
    if matches!(args.get(1).map(|s| s.as_str()), Some("-h" | "--help")) {
        print_usage();
        return Ok(());
    }
    let config_path = args.get(1).map(|s| s.as_str()).unwrap_or(DEFAULT_CONFIG_PATH);

    let config = ServerConfig::load_or_default(config_path)?;
    authwatch_common::id::init(1, config.node_id);
    tracing::info!(config = %config.redacted(), "Configuration loaded");

    let channels = config.notify.build_channels()?;
    let history: Option<Arc<dyn AlertHistorySink>> = config.history.path.as_ref().map(|path| {
        tracing::info!(path = %path, "Alert history enabled");
        Arc::new(JsonlHistorySink::new(path)) as Arc<dyn AlertHistorySink>
    });
    let dispatcher = Arc::new(AlertDispatcher::new(channels, config.routes.clone(), history));

    let provider: Arc<dyn MetricSnapshotProvider> = match &config.snapshot.url {
        Some(url) => Arc::new(HttpSnapshotProvider::new(
            url.clone(),
            Duration::from_secs(config.snapshot_timeout_secs),
        )?),
        None => {
            tracing::warn!("No snapshot url configured, evaluating an empty snapshot");
            Arc::new(StaticSnapshotProvider::default())
        }
    };

    let engine = Arc::new(AuthAlertEngine::new(
        &config,
        provider,
        dispatcher,
        Arc::new(TracingReporter),
    )?);
    engine.start();

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    engine.stop().await;

    Ok(())
}
