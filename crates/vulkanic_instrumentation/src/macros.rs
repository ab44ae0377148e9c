//! Macros for emitting structured metric events.

/// Serialize a [`MetricEvent`](crate::MetricEvent) and emit it on the
/// `metrics` tracing target, where [`MetricsLayer`](crate::MetricsLayer)
/// picks it up.
#[macro_export]
macro_rules! record_metric {
    ($event:expr) => {{
        if let Ok(__metric_json) = $crate::serde_json::to_string(&$event) {
            $crate::tracing::event!(
                target: "metrics",
                $crate::tracing::Level::INFO,
                metric = %__metric_json
            );
        }
    }};
}
