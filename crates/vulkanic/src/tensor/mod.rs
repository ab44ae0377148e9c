use std::{ptr::NonNull, sync::Arc};

use ash::vk;
use vulkanic_instrumentation::{MetricEvent, record_metric};

use crate::{
    allocation::{self, Allocation}, error::TensorError, ownership::{ExternalResource, OwnershipReport, ReleaseSummary, ResourcePair}, types::GpuDevice
};

pub mod builder;
pub mod dtypes;
pub mod enums;
pub mod typed;
pub mod view;

pub use builder::TensorBuilder;
pub use dtypes::{Bool, Dtype, TensorElement};
pub use enums::TensorKind;
pub use typed::TensorT;

/// A GPU buffer holding `size` elements of one [`Dtype`].
///
/// Resources are created eagerly on construction. Host-accessible kinds keep
/// their host-visible memory mapped until the tensor is destroyed. Copies
/// between the staging and device-local buffers only happen when recorded
/// explicitly, see the `record_*` methods.
pub struct Tensor {
    device: Option<Arc<dyn GpuDevice>>,
    kind: TensorKind,
    dtype: Dtype,
    size: u32,
    mapped: Option<NonNull<u8>>,
    primary: Option<ResourcePair>,
    staging: Option<ResourcePair>,
}

// SAFETY: the mapped pointer refers to memory owned by this tensor's
// resources; every access goes through `&self`/`&mut self`.
unsafe impl Send for Tensor {}

impl Tensor {
    /// Creates a tensor of `size` elements and seeds it with `data`, which
    /// must hold exactly `size * data_type_memory_size` bytes.
    pub fn new(
        device: Arc<dyn GpuDevice>,
        data: &[u8],
        size: u32,
        data_type_memory_size: u32,
        dtype: Dtype,
        kind: TensorKind,
    ) -> Result<Self, TensorError> {
        TensorBuilder::new(device, dtype, kind)
            .elements(size)
            .element_size(data_type_memory_size)
            .data(data)
            .build()
    }

    pub fn builder<'a>(device: Arc<dyn GpuDevice>, dtype: Dtype, kind: TensorKind) -> TensorBuilder<'a> {
        TensorBuilder::new(device, dtype, kind)
    }

    pub(crate) fn unallocated(device: Arc<dyn GpuDevice>, dtype: Dtype, kind: TensorKind, size: u32) -> Self {
        Self {
            device: Some(device),
            kind,
            dtype,
            size,
            mapped: None,
            primary: None,
            staging: None,
        }
    }

    /// Allocates or adopts resources and maps the host-visible side.
    pub(crate) fn create_resources(
        &mut self,
        data: Option<&[u8]>,
        primary: Option<ExternalResource>,
        staging: Option<ExternalResource>,
    ) -> Result<(), TensorError> {
        let device = self.device.clone().ok_or(TensorError::NotInitialized)?;
        let memory_size = self.memory_size();
        let allocation = allocation::allocate(device.as_ref(), self.kind, memory_size, primary, staging)?;

        let host_pair = match self.kind {
            TensorKind::Device => allocation.staging.as_ref(),
            TensorKind::Host => Some(&allocation.primary),
            TensorKind::Storage => None,
        };
        let mapped = match host_pair {
            Some(pair) => match allocation::map_and_upload(device.as_ref(), pair, memory_size, data) {
                Ok(mapped) => Some(mapped),
                Err(err) => {
                    unsafe { allocation.release(device.as_ref()) };
                    return Err(err);
                }
            },
            None => {
                if data.is_some() {
                    tracing::debug!(kind = %self.kind, "storage tensor skips initial host upload");
                }
                None
            }
        };

        self.record_allocation(&allocation, memory_size);
        let Allocation { primary, staging } = allocation;
        self.primary = Some(primary);
        self.staging = staging;
        self.mapped = mapped;
        Ok(())
    }

    fn record_allocation(&self, allocation: &Allocation, memory_size: u32) {
        let (device_local_bytes, host_visible_bytes) = allocation.owned_bytes(self.kind, memory_size);
        let owned_handles = allocation.primary.owned_handles() + allocation.staging.as_ref().map_or(0, ResourcePair::owned_handles);
        tracing::debug!(
            kind = %self.kind,
            dtype = %self.dtype,
            elements = self.size,
            memory_size,
            owned_handles,
            "tensor resources created"
        );
        record_metric!(MetricEvent::TensorAllocated {
            kind: self.kind.to_string(),
            dtype: self.dtype.to_string(),
            elements: self.size,
            device_local_bytes,
            host_visible_bytes,
            owned_handles,
        });
    }

    /// Unmaps and frees owned resources while keeping the device.
    fn release_resources(&mut self) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        let Some(device) = self.device.as_deref() else {
            return summary;
        };

        if self.mapped.take().is_some() {
            let host_pair = match self.kind {
                TensorKind::Device => self.staging.as_ref(),
                _ => self.primary.as_ref(),
            };
            if let Some(pair) = host_pair {
                unsafe { device.unmap_memory(pair.memory.handle()) };
            }
        }
        if let Some(primary) = self.primary.take() {
            summary += unsafe { primary.release(device) };
        }
        if let Some(staging) = self.staging.take() {
            summary += unsafe { staging.release(device) };
        }
        summary
    }

    /// Replaces the tensor's contents and layout, keeping its kind.
    ///
    /// Existing resources are released first; if recreation fails the tensor
    /// is left uninitialized.
    pub fn rebuild(&mut self, data: &[u8], size: u32, data_type_memory_size: u32) -> Result<(), TensorError> {
        if self.device.is_none() {
            return Err(TensorError::NotInitialized);
        }
        validate_layout(self.dtype, Some(data.len()), size, data_type_memory_size)?;

        let summary = self.release_resources();
        tracing::debug!(kind = %self.kind, freed = summary.freed, new_size = size, "rebuilding tensor");
        self.size = size;
        self.create_resources(Some(data), None, None)
    }

    /// Frees every owned resource and detaches from the device. Safe to call
    /// more than once; afterwards `size()` reports 0 and `raw_data()` is null.
    pub fn destroy(&mut self) {
        if self.device.is_none() {
            tracing::debug!(kind = %self.kind, "tensor already destroyed");
            return;
        }
        let summary = self.release_resources();
        self.size = 0;
        self.device = None;

        if summary.freed + summary.retained > 0 {
            tracing::debug!(kind = %self.kind, freed = summary.freed, retained = summary.retained, "tensor destroyed");
            record_metric!(MetricEvent::TensorReleased {
                kind: self.kind.to_string(),
                dtype: self.dtype.to_string(),
                freed_handles: summary.freed,
                retained_handles: summary.retained,
            });
        }
    }

    pub fn is_init(&self) -> bool {
        self.device.is_some() && self.primary.is_some() && (self.kind == TensorKind::Storage || self.mapped.is_some())
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn data_type_memory_size(&self) -> u32 {
        self.dtype.size_bytes()
    }

    /// `size() * data_type_memory_size()`.
    pub fn memory_size(&self) -> u32 {
        self.size * self.data_type_memory_size()
    }

    pub fn data_type(&self) -> Dtype {
        self.dtype
    }

    pub fn tensor_type(&self) -> TensorKind {
        self.kind
    }

    /// Binding info for the primary buffer covering the whole tensor.
    pub fn descriptor_buffer_info(&self) -> Result<vk::DescriptorBufferInfo, TensorError> {
        let primary = self.primary()?;
        Ok(vk::DescriptorBufferInfo::default()
            .buffer(primary.buffer.handle())
            .offset(0)
            .range(u64::from(self.memory_size())))
    }

    pub fn ownership(&self) -> OwnershipReport {
        OwnershipReport {
            primary_buffer: self.primary.map(|p| p.buffer.ownership()),
            primary_memory: self.primary.map(|p| p.memory.ownership()),
            staging_buffer: self.staging.map(|p| p.buffer.ownership()),
            staging_memory: self.staging.map(|p| p.memory.ownership()),
        }
    }

    pub(crate) fn device(&self) -> Result<&dyn GpuDevice, TensorError> {
        self.device.as_deref().ok_or(TensorError::NotInitialized)
    }

    pub(crate) fn primary(&self) -> Result<&ResourcePair, TensorError> {
        self.primary.as_ref().ok_or(TensorError::NotInitialized)
    }

    pub(crate) fn staging(&self, operation: &'static str) -> Result<&ResourcePair, TensorError> {
        if !self.kind.has_staging() {
            return Err(TensorError::UnsupportedForKind { operation, kind: self.kind });
        }
        self.staging.as_ref().ok_or(TensorError::NotInitialized)
    }
}

impl Drop for Tensor {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl std::fmt::Debug for Tensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tensor")
            .field("kind", &self.kind)
            .field("dtype", &self.dtype)
            .field("size", &self.size)
            .field("initialized", &self.is_init())
            .field("ownership", &self.ownership())
            .finish()
    }
}

/// Checks element width against the registry and, when given, the byte
/// length of the initial data. Returns the tensor's memory size.
pub(crate) fn validate_layout(dtype: Dtype, data_len: Option<usize>, size: u32, data_type_memory_size: u32) -> Result<u32, TensorError> {
    if data_type_memory_size != dtype.size_bytes() {
        return Err(TensorError::ElementSizeMismatch {
            dtype,
            expected: dtype.size_bytes(),
            actual: data_type_memory_size,
        });
    }
    let memory_size = allocation::memory_size_of(size, data_type_memory_size)?;
    if let Some(actual) = data_len
        && actual != memory_size as usize
    {
        return Err(TensorError::DimensionMismatch {
            expected: memory_size as usize,
            actual,
        });
    }
    Ok(memory_size)
}
