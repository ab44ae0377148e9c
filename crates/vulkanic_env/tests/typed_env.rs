use serial_test::serial;
use tracing::Level;
use vulkanic_env::{EnvVarError, EnvVarGuard, Environment, InstrumentEnvVar, LOG_LEVEL, METRICS_CONSOLE, TRACE_COMMANDS, TensorEnvVar, is_set};

#[test]
#[serial]
fn typed_guard_restores_previous_value() {
    let _outer = EnvVarGuard::set(InstrumentEnvVar::LogLevel, "warn");
    {
        let guard = LOG_LEVEL.set_guard(Level::TRACE).expect("trace level should format");
        assert_eq!(*guard, Level::TRACE);
        assert_eq!(LOG_LEVEL.get().expect("level should parse"), Some(Level::TRACE));
    }
    assert_eq!(LOG_LEVEL.get().expect("level should parse"), Some(Level::WARN));
}

#[test]
#[serial]
fn unset_guard_removes_and_restores() {
    let _outer = EnvVarGuard::set(TensorEnvVar::TraceCommands, "1");
    {
        let _unset = TRACE_COMMANDS.unset_guard();
        assert!(!is_set(TensorEnvVar::TraceCommands));
        assert_eq!(TRACE_COMMANDS.get().expect("absent value is not an error"), None);
    }
    assert!(is_set(TensorEnvVar::TraceCommands));
    assert_eq!(Environment::get(TensorEnvVar::TraceCommands).as_deref(), Some("1"));
}

#[test]
#[serial]
fn malformed_boolean_reports_parse_error() {
    let _bad = EnvVarGuard::set(InstrumentEnvVar::MetricsConsole, "sometimes");
    match METRICS_CONSOLE.get() {
        Err(EnvVarError::Parse { name, value, .. }) => {
            assert_eq!(name, "VULKANIC_METRICS_CONSOLE");
            assert_eq!(value, "sometimes");
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
#[serial]
fn batched_guard_restores_every_variable() {
    let _baseline = EnvVarGuard::unset(InstrumentEnvVar::MetricsConsole).and_set(TensorEnvVar::TraceCommands, "0");
    {
        let _batch = EnvVarGuard::set(InstrumentEnvVar::MetricsConsole, "1")
            .and_set(TensorEnvVar::TraceCommands, "1")
            .and_unset(TensorEnvVar::TraceCommands);
        assert_eq!(METRICS_CONSOLE.get().expect("flag should parse"), Some(true));
        assert!(!is_set(TensorEnvVar::TraceCommands));
    }
    assert_eq!(Environment::get(InstrumentEnvVar::MetricsConsole), None);
    assert_eq!(Environment::get(TensorEnvVar::TraceCommands).as_deref(), Some("0"));
}
