//! Logging and metric plumbing shared by the vulkanic crates.

pub mod config;
pub mod event;
pub mod exporters;
pub mod logging;
pub mod macros;
pub mod prelude;
pub mod recorder;

pub use config::{AppConfig, AppConfigError};
pub use event::MetricEvent;
pub use recorder::{EnrichedMetricEvent, METRICS_TARGET, MetricExporter, MetricsLayer};

#[doc(hidden)]
pub use serde_json;
#[doc(hidden)]
pub use tracing;

#[cfg(test)]
mod tests;
