use serial_test::serial;

use crate::prelude::*;

#[test]
#[serial]
fn app_config_parses_environment() {
    let _log_level = LOG_LEVEL.set_guard(Level::DEBUG).expect("log level should set");
    let _jsonl_path = METRICS_JSONL_PATH
        .set_guard("/tmp/vulkanic-metrics.jsonl".into())
        .expect("metrics path should set");
    let _console = METRICS_CONSOLE.set_guard(true).expect("console flag should set");
    let _trace = TRACE_COMMANDS.set_guard(false).expect("trace flag should set");

    let config = AppConfig::from_env().expect("configuration should parse");
    assert_eq!(config.log_level, Level::DEBUG);
    assert_eq!(
        config.metrics_jsonl_path.as_deref(),
        Some(std::path::Path::new("/tmp/vulkanic-metrics.jsonl"))
    );
    assert!(config.enable_console_metrics);
    assert!(!config.trace_commands);
}

#[test]
#[serial]
fn app_config_defaults_when_unset() {
    let _log_level = LOG_LEVEL.unset_guard();
    let _jsonl_path = METRICS_JSONL_PATH.unset_guard();
    let _console = METRICS_CONSOLE.unset_guard();
    let _trace = TRACE_COMMANDS.unset_guard();

    let config = AppConfig::from_env().expect("empty environment should parse");
    assert_eq!(config, AppConfig::default());
}

#[test]
#[serial]
fn app_config_rejects_malformed_values() {
    let _env = EnvVarGuard::set(InstrumentEnvVar::LogLevel, "verbose")
        .and_unset(InstrumentEnvVar::MetricsConsole)
        .and_unset(TensorEnvVar::TraceCommands);

    match AppConfig::from_env() {
        Err(AppConfigError::InvalidLogLevel { value }) => assert_eq!(value, "verbose"),
        other => panic!("expected invalid log level error, got {other:?}"),
    }

    let _log_level = LOG_LEVEL.unset_guard();
    let _trace = EnvVarGuard::set(TensorEnvVar::TraceCommands, "perhaps");

    match AppConfig::from_env() {
        Err(AppConfigError::InvalidBoolean { name, value }) => {
            assert_eq!(name, TensorEnvVar::TraceCommands.key());
            assert_eq!(value, "perhaps");
        }
        other => panic!("expected invalid boolean error, got {other:?}"),
    }
}

#[test]
#[serial]
fn app_config_initialises_once() {
    let first = AppConfig::initialise(AppConfig::default()).expect("first initialise should succeed");
    assert_eq!(first, &AppConfig::default());
    assert_eq!(AppConfig::try_global(), Some(&AppConfig::default()));
    match AppConfig::initialise(AppConfig::default()) {
        Err(AppConfigError::AlreadyInitialised) => {}
        other => panic!("expected already initialised error, got {other:?}"),
    }
}
