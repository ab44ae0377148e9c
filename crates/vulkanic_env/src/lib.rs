//! Typed process environment configuration shared by the vulkanic crates.

pub mod environment;

pub use environment::{
    EnvVar, Environment, guard::EnvVarGuard, instrument::{InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH}, tensor::{TRACE_COMMANDS, TensorEnvVar, is_set}, value::{EnvVarError, EnvVarFormatError, EnvVarParseError, TypedEnvVar, TypedEnvVarGuard}
};
