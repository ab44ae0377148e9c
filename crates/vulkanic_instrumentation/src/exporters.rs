//! Sinks for tensor lifecycle and command metrics.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;
use std::sync::mpsc::Sender;

use crate::recorder::{EnrichedMetricEvent, MetricExporter};

/// Appends one JSON object per event to a file, flushing after each line so
/// the file stays readable while tensors are still alive.
pub struct JsonlExporter {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlExporter {
    pub fn new<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(&self, event: &EnrichedMetricEvent) -> io::Result<()> {
        let line = serde_json::to_string(event)?;
        let mut writer = self.writer.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        writeln!(writer, "{line}")?;
        writer.flush()
    }
}

impl MetricExporter for JsonlExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        if let Err(error) = self.write_line(event) {
            tracing::error!(target: "instrument", %error, metric = %event.event, "failed to append metric");
        }
    }
}

/// Prints a one-line summary of each event to stdout, prefixed with the
/// active span name.
#[derive(Default)]
pub struct ConsoleExporter;

impl ConsoleExporter {
    pub fn new() -> Self {
        Self
    }

    pub fn format(event: &EnrichedMetricEvent) -> String {
        format!(
            "METRIC {} [{}] {}",
            event.timestamp.format("%H:%M:%S%.3f"),
            event.span_name.as_deref().unwrap_or("-"),
            event.event
        )
    }
}

impl MetricExporter for ConsoleExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        println!("{}", Self::format(event));
    }
}

/// Forwards events to an in-process receiver; a dropped receiver discards
/// them.
pub struct ChannelExporter {
    sender: Sender<EnrichedMetricEvent>,
}

impl ChannelExporter {
    pub fn new(sender: Sender<EnrichedMetricEvent>) -> Self {
        Self { sender }
    }
}

impl MetricExporter for ChannelExporter {
    fn export(&self, event: &EnrichedMetricEvent) {
        let _ = self.sender.send(event.clone());
    }
}
