//! Centralised instrumentation configuration handling.

use std::path::PathBuf;
use std::sync::OnceLock;

use tracing::Level;

use vulkanic_env::{EnvVarError, LOG_LEVEL, METRICS_CONSOLE, METRICS_JSONL_PATH, TRACE_COMMANDS};

/// Errors that can occur while loading or initialising [`AppConfig`].
#[derive(Debug, thiserror::Error)]
pub enum AppConfigError {
    #[error("app configuration already initialised")]
    AlreadyInitialised,
    #[error("invalid log level '{value}'")]
    InvalidLogLevel { value: String },
    #[error("invalid boolean flag '{value}' for {name}")]
    InvalidBoolean { name: &'static str, value: String },
    #[error("failed to access instrumentation environment: {source}")]
    EnvVar {
        #[from]
        source: EnvVarError,
    },
}

/// Process-wide logging and metrics configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// The minimum tracing level for application logs.
    pub log_level: Level,
    /// Optional path for persisting metrics as JSON lines.
    pub metrics_jsonl_path: Option<PathBuf>,
    /// Whether console metrics should be emitted.
    pub enable_console_metrics: bool,
    /// Whether every recorded copy and barrier is traced.
    pub trace_commands: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: Level::INFO,
            metrics_jsonl_path: None,
            enable_console_metrics: false,
            trace_commands: false,
        }
    }
}

static APP_CONFIG: OnceLock<AppConfig> = OnceLock::new();

fn read_flag(descriptor: vulkanic_env::TypedEnvVar<bool>) -> Result<bool, AppConfigError> {
    match descriptor.get() {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Ok(false),
        Err(EnvVarError::Parse { value, .. }) => Err(AppConfigError::InvalidBoolean {
            name: descriptor.key(),
            value,
        }),
        Err(err) => Err(err.into()),
    }
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, AppConfigError> {
        let log_level = match LOG_LEVEL.get() {
            Ok(Some(value)) => value,
            Ok(None) => Level::INFO,
            Err(EnvVarError::Parse { value, .. }) => return Err(AppConfigError::InvalidLogLevel { value }),
            Err(err) => return Err(err.into()),
        };

        let metrics_jsonl_path = METRICS_JSONL_PATH.get()?;
        let enable_console_metrics = read_flag(METRICS_CONSOLE)?;
        let trace_commands = read_flag(TRACE_COMMANDS)?;

        Ok(Self {
            log_level,
            metrics_jsonl_path,
            enable_console_metrics,
            trace_commands,
        })
    }

    /// Initialise the global configuration instance from environment variables.
    pub fn initialise_from_env() -> Result<&'static Self, AppConfigError> {
        let config = Self::from_env()?;
        Self::initialise(config)
    }

    /// Store the provided configuration as the global instance.
    pub fn initialise(config: AppConfig) -> Result<&'static Self, AppConfigError> {
        APP_CONFIG.set(config).map_err(|_| AppConfigError::AlreadyInitialised)?;
        APP_CONFIG.get().ok_or(AppConfigError::AlreadyInitialised)
    }

    /// Retrieve the global configuration, initialising it from the environment when absent.
    pub fn get_or_init_from_env() -> Result<&'static Self, AppConfigError> {
        if let Some(existing) = APP_CONFIG.get() {
            return Ok(existing);
        }
        let config = Self::from_env()?;
        // Losing a race to another initialiser is fine; both read the same environment.
        let _ = APP_CONFIG.set(config);
        APP_CONFIG.get().ok_or(AppConfigError::AlreadyInitialised)
    }

    /// Access the global configuration.
    ///
    /// # Panics
    /// If neither `initialise` nor `get_or_init_from_env` has run.
    pub fn global() -> &'static Self {
        APP_CONFIG.get().expect("AppConfig not initialised")
    }

    /// Try to access the globally-initialised configuration.
    pub fn try_global() -> Option<&'static Self> {
        APP_CONFIG.get()
    }

    /// Whether command tracing is on. The global configuration wins when
    /// present; otherwise the environment is read on every call.
    pub fn trace_commands_enabled() -> bool {
        match APP_CONFIG.get() {
            Some(config) => config.trace_commands,
            None => TRACE_COMMANDS.get().ok().flatten().unwrap_or(false),
        }
    }
}
