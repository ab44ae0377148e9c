//! Convenience re-exports for instrumentation consumers.

pub use crate::config::{AppConfig, AppConfigError};
pub use crate::event::MetricEvent;
pub use crate::exporters::{ChannelExporter, ConsoleExporter, JsonlExporter};
pub use crate::logging::{LoggingError, init_from_env, init_tracing};
pub use crate::record_metric;
pub use crate::recorder::{EnrichedMetricEvent, METRICS_TARGET, MetricExporter, MetricsLayer};

pub use vulkanic_env::{EnvVar, EnvVarError, EnvVarGuard, Environment, InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH, TRACE_COMMANDS, TensorEnvVar};

pub use tracing::{Level, info, info_span, subscriber};
pub use tracing_subscriber::{self, layer::SubscriberExt};
