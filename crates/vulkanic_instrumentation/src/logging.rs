//! Global subscriber assembly.

use tracing::Level;
use tracing_subscriber::{Layer, filter::filter_fn, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    config::AppConfig, exporters::{ConsoleExporter, JsonlExporter}, recorder::{METRICS_TARGET, MetricExporter, MetricsLayer}
};

#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("failed to open metrics file: {0}")]
    MetricsFile(#[from] std::io::Error),
    #[error("global subscriber already installed: {0}")]
    AlreadyInstalled(#[from] tracing_subscriber::util::TryInitError),
}

/// Build the exporters requested by `config`.
pub fn exporters_for(config: &AppConfig) -> Result<Vec<Box<dyn MetricExporter>>, LoggingError> {
    let mut exporters: Vec<Box<dyn MetricExporter>> = Vec::new();
    if config.enable_console_metrics {
        exporters.push(Box::new(ConsoleExporter::new()));
    }
    if let Some(path) = &config.metrics_jsonl_path {
        exporters.push(Box::new(JsonlExporter::new(path)?));
    }
    Ok(exporters)
}

/// Install a global subscriber: human-readable logs up to `config.log_level`,
/// plus a metrics layer feeding the configured exporters.
pub fn init_tracing(config: &AppConfig) -> Result<(), LoggingError> {
    let level: Level = config.log_level;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_filter(filter_fn(move |meta| meta.target() != METRICS_TARGET && *meta.level() <= level));
    let metrics_layer = MetricsLayer::new(exporters_for(config)?);

    tracing_subscriber::registry().with(fmt_layer).with(metrics_layer).try_init()?;
    tracing::debug!(target: "instrument", ?config, "tracing initialised");
    Ok(())
}

/// Initialise [`AppConfig`] from the environment and install the subscriber.
pub fn init_from_env() -> Result<&'static AppConfig, Box<dyn std::error::Error + Send + Sync>> {
    let config = AppConfig::get_or_init_from_env()?;
    init_tracing(config)?;
    Ok(config)
}
