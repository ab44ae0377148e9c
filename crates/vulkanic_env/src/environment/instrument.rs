//! Logging and metrics environment variable identifiers and descriptors.

use std::path::PathBuf;

use tracing::Level;

use super::EnvVar;
use super::value::{EnvVarFormatError, EnvVarParseError, TypedEnvVar, format_bool, parse_bool};

/// Instrumentation-specific environment variables.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InstrumentEnvVar {
    /// Minimum tracing level for vulkanic logs.
    LogLevel,
    /// Path where metrics should be appended as JSON lines.
    MetricsJsonlPath,
    /// Enables console metrics emission when set to a truthy value.
    MetricsConsole,
}

impl InstrumentEnvVar {
    pub const fn key(self) -> &'static str {
        match self {
            InstrumentEnvVar::LogLevel => "VULKANIC_LOG_LEVEL",
            InstrumentEnvVar::MetricsJsonlPath => "VULKANIC_METRICS_JSONL_PATH",
            InstrumentEnvVar::MetricsConsole => "VULKANIC_METRICS_CONSOLE",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Instrument(self)
    }
}

/// Typed descriptor for the log level.
pub const LOG_LEVEL: TypedEnvVar<Level> = TypedEnvVar::new(InstrumentEnvVar::LogLevel.into_env(), parse_log_level, format_level);

/// Typed descriptor for the metrics JSONL output path.
pub const METRICS_JSONL_PATH: TypedEnvVar<PathBuf> =
    TypedEnvVar::new(InstrumentEnvVar::MetricsJsonlPath.into_env(), parse_path, format_path);

/// Typed descriptor for the console metrics toggle.
pub const METRICS_CONSOLE: TypedEnvVar<bool> = TypedEnvVar::new(InstrumentEnvVar::MetricsConsole.into_env(), parse_bool, format_bool);

fn parse_log_level(value: &str) -> Result<Level, EnvVarParseError> {
    value.trim().parse::<Level>().map_err(|_| EnvVarParseError::new("invalid tracing level"))
}

fn format_level(level: &Level) -> Result<String, EnvVarFormatError> {
    Ok(level.to_string())
}

fn parse_path(value: &str) -> Result<PathBuf, EnvVarParseError> {
    if value.is_empty() {
        return Err(EnvVarParseError::new("path must not be empty"));
    }
    Ok(PathBuf::from(value))
}

fn format_path(path: &PathBuf) -> Result<String, EnvVarFormatError> {
    path.to_str()
        .map(str::to_owned)
        .ok_or_else(|| EnvVarFormatError::new("path is not valid UTF-8"))
}
