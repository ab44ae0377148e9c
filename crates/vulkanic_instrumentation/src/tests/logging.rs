use crate::logging::exporters_for;
use crate::prelude::*;

#[test]
fn exporters_follow_config_flags() {
    assert!(exporters_for(&AppConfig::default()).unwrap().is_empty());

    let path = std::env::temp_dir().join(format!("vulkanic-exporters-{}.jsonl", std::process::id()));
    let config = AppConfig {
        enable_console_metrics: true,
        metrics_jsonl_path: Some(path.clone()),
        ..AppConfig::default()
    };
    assert_eq!(exporters_for(&config).unwrap().len(), 2);
    let _ = std::fs::remove_file(&path);
}

#[test]
fn unwritable_metrics_path_is_reported() {
    let config = AppConfig {
        metrics_jsonl_path: Some(std::env::temp_dir().join("vulkanic-missing-dir").join("nested").join("metrics.jsonl")),
        ..AppConfig::default()
    };
    assert!(matches!(exporters_for(&config), Err(LoggingError::MetricsFile(_))));
}
