use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Memory placement of a tensor.
///
/// * [`TensorKind::Device`] keeps data in device-local memory and mirrors it
///   through a host-visible staging buffer.
/// * [`TensorKind::Host`] keeps a single host-visible buffer the GPU reads
///   directly.
/// * [`TensorKind::Storage`] is GPU-only scratch space with no host view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TensorKind {
    Device,
    Host,
    Storage,
}

impl TensorKind {
    pub fn has_staging(&self) -> bool {
        matches!(self, TensorKind::Device)
    }

    pub fn is_host_accessible(&self) -> bool {
        !matches!(self, TensorKind::Storage)
    }
}

impl Display for TensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TensorKind::Device => "Device",
            TensorKind::Host => "Host",
            TensorKind::Storage => "Storage",
        };
        write!(f, "{}", s)
    }
}
