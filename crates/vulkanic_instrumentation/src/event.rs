//! Canonical metric event definitions.

use serde::{Deserialize, Serialize};

/// Structured metric events emitted by the tensor core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum MetricEvent {
    /// GPU resources were created and bound for a tensor.
    TensorAllocated {
        kind: String,
        dtype: String,
        elements: u32,
        /// Bytes requested from device-local memory types.
        device_local_bytes: u64,
        /// Bytes requested from host-visible memory types.
        host_visible_bytes: u64,
        /// Handles the tensor created itself and must free.
        owned_handles: u32,
    },
    /// A tensor tore down its GPU resources.
    TensorReleased {
        kind: String,
        dtype: String,
        freed_handles: u32,
        /// Borrowed handles that were left alive for their external owner.
        retained_handles: u32,
    },
    /// A copy or barrier was recorded into a command buffer.
    CommandRecorded {
        command: String,
        command_buffer: u64,
        bytes: u64,
    },
}

impl std::fmt::Display for MetricEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricEvent::TensorAllocated {
                kind,
                dtype,
                elements,
                device_local_bytes,
                host_visible_bytes,
                owned_handles,
            } => write!(
                f,
                "allocated {kind} {dtype}[{elements}] device_local={device_local_bytes}B host_visible={host_visible_bytes}B owned={owned_handles}"
            ),
            MetricEvent::TensorReleased {
                kind,
                dtype,
                freed_handles,
                retained_handles,
            } => write!(f, "released {kind} {dtype} freed={freed_handles} retained={retained_handles}"),
            MetricEvent::CommandRecorded {
                command,
                command_buffer,
                bytes,
            } => write!(f, "recorded {command} of {bytes}B into {command_buffer:#x}"),
        }
    }
}
