use std::sync::{Arc, mpsc};
use std::time::Duration;

use serial_test::serial;
use tracing_subscriber::layer::SubscriberExt;
use vulkanic::{EmulatedDevice, TensorKind, TensorT};
use vulkanic_env::TRACE_COMMANDS;
use vulkanic_instrumentation::{EnrichedMetricEvent, MetricEvent, MetricExporter, MetricsLayer, exporters::ChannelExporter};

fn capture<R>(f: impl FnOnce() -> R) -> (R, Vec<MetricEvent>) {
    let (sender, receiver) = mpsc::channel::<EnrichedMetricEvent>();
    let exporters: Vec<Box<dyn MetricExporter>> = vec![Box::new(ChannelExporter::new(sender))];
    let subscriber = tracing_subscriber::registry().with(MetricsLayer::new(exporters));
    let result = tracing::subscriber::with_default(subscriber, f);

    let mut events = Vec::new();
    while let Ok(enriched) = receiver.recv_timeout(Duration::from_millis(50)) {
        events.push(enriched.event);
    }
    (result, events)
}

#[test]
#[serial]
fn lifecycle_emits_allocation_and_release_metrics() {
    let device = Arc::new(EmulatedDevice::new());
    let ((), events) = capture(|| {
        let tensor = TensorT::new(device.clone(), &[1.0f32, 2.0, 3.0, 4.0], TensorKind::Device).unwrap();
        drop(tensor);
    });

    assert!(events.contains(&MetricEvent::TensorAllocated {
        kind: "Device".to_string(),
        dtype: "Float".to_string(),
        elements: 4,
        device_local_bytes: 16,
        host_visible_bytes: 16,
        owned_handles: 4,
    }));
    assert!(events.contains(&MetricEvent::TensorReleased {
        kind: "Device".to_string(),
        dtype: "Float".to_string(),
        freed_handles: 4,
        retained_handles: 0,
    }));
}

#[test]
#[serial]
fn traced_commands_are_reported() {
    let _trace = TRACE_COMMANDS.set_guard(true).expect("flag should format");
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1u32, 2], TensorKind::Device).unwrap();
    let cmd = device.allocate_command_buffer();

    let ((), events) = capture(|| {
        tensor.record_copy_from_staging_to_device(cmd).unwrap();
    });

    let commands: Vec<_> = events
        .into_iter()
        .filter_map(|event| match event {
            MetricEvent::CommandRecorded { command, bytes, .. } => Some((command, bytes)),
            _ => None,
        })
        .collect();
    assert_eq!(commands, vec![("copy".to_string(), 8), ("barrier".to_string(), 8)]);
}

#[test]
#[serial]
fn trace_flag_changes_are_observed_between_recordings() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1u32, 2], TensorKind::Device).unwrap();
    let count_commands = |events: Vec<MetricEvent>| {
        events
            .iter()
            .filter(|event| matches!(event, MetricEvent::CommandRecorded { .. }))
            .count()
    };

    {
        let _off = TRACE_COMMANDS.set_guard(false).expect("flag should format");
        let cmd = device.allocate_command_buffer();
        let ((), events) = capture(|| tensor.record_copy_from_staging_to_device(cmd).unwrap());
        assert_eq!(count_commands(events), 0);
    }

    let _on = TRACE_COMMANDS.set_guard(true).expect("flag should format");
    let cmd = device.allocate_command_buffer();
    let ((), events) = capture(|| tensor.record_copy_from_staging_to_device(cmd).unwrap());
    assert_eq!(count_commands(events), 2);
}
