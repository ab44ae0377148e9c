use std::sync::Arc;

use super::{Dtype, Tensor, TensorKind, validate_layout};
use crate::{error::TensorError, ownership::ExternalResource, types::GpuDevice};

/// Configures a [`Tensor`] before its resources are created.
///
/// Slots given a caller-supplied [`ExternalResource`] are adopted as borrowed
/// and never freed by the tensor; every other slot is allocated and owned.
/// Without [`data`](Self::data), owned host-visible memory starts zeroed and
/// borrowed memory keeps whatever it already holds.
pub struct TensorBuilder<'a> {
    device: Arc<dyn GpuDevice>,
    dtype: Dtype,
    kind: TensorKind,
    elements: Option<u32>,
    element_size: Option<u32>,
    data: Option<&'a [u8]>,
    primary: Option<ExternalResource>,
    staging: Option<ExternalResource>,
}

impl<'a> TensorBuilder<'a> {
    pub fn new(device: Arc<dyn GpuDevice>, dtype: Dtype, kind: TensorKind) -> Self {
        Self {
            device,
            dtype,
            kind,
            elements: None,
            element_size: None,
            data: None,
            primary: None,
            staging: None,
        }
    }

    pub fn elements(mut self, count: u32) -> Self {
        self.elements = Some(count);
        self
    }

    /// Defaults to the dtype's registry width.
    pub fn element_size(mut self, bytes: u32) -> Self {
        self.element_size = Some(bytes);
        self
    }

    pub fn data(mut self, bytes: &'a [u8]) -> Self {
        self.data = Some(bytes);
        self
    }

    pub fn borrowed_primary(mut self, resource: ExternalResource) -> Self {
        self.primary = Some(resource);
        self
    }

    /// Only valid for [`TensorKind::Device`].
    pub fn borrowed_staging(mut self, resource: ExternalResource) -> Self {
        self.staging = Some(resource);
        self
    }

    pub fn build(self) -> Result<Tensor, TensorError> {
        let element_size = self.element_size.unwrap_or(self.dtype.size_bytes());
        let elements = match (self.elements, self.data) {
            (Some(count), _) => count,
            (None, Some(bytes)) if element_size == self.dtype.size_bytes() => {
                u32::try_from(bytes.len() / element_size as usize).map_err(|_| TensorError::SizeOverflow {
                    elements: u32::MAX,
                    element_size,
                })?
            }
            (None, Some(_)) => 0,
            (None, None) => return Err(TensorError::EmptyTensor),
        };
        let memory_size = validate_layout(self.dtype, self.data.map(<[u8]>::len), elements, element_size)?;

        let mut tensor = Tensor::unallocated(self.device, self.dtype, self.kind, elements);
        tensor.create_resources(self.data, self.primary, self.staging)?;
        tracing::debug!(
            kind = %tensor.kind,
            memory_size,
            borrowed_primary = self.primary.is_some(),
            borrowed_staging = self.staging.is_some(),
            "tensor built"
        );
        Ok(tensor)
    }
}
