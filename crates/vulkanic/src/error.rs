use ash::vk;
use thiserror::Error;

use crate::tensor::{Dtype, TensorKind};

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("No memory type satisfies type bits {type_bits:#b} with properties {required:?}")]
    NoCompatibleMemoryType {
        type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
    #[error("Backend call {operation} failed: {result}")]
    Backend { operation: &'static str, result: vk::Result },
    #[error("Tensor is not initialized")]
    NotInitialized,
    #[error("Tensor must hold at least one element")]
    EmptyTensor,
    #[error("Tensor byte size overflows u32: {elements} elements of {element_size} bytes")]
    SizeOverflow { elements: u32, element_size: u32 },
    #[error("Dimension mismatch: expected {expected}, actual {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("Element size {actual} does not match {dtype} width {expected}")]
    ElementSizeMismatch { dtype: Dtype, expected: u32, actual: u32 },
    #[error("Tensor dtype mismatch: expected {expected}, got {actual}")]
    DtypeMismatch { expected: Dtype, actual: Dtype },
    #[error("Operation {operation} is not supported on {kind} tensors")]
    UnsupportedForKind { operation: &'static str, kind: TensorKind },
    #[error("Buffer was created without {required:?} usage")]
    MissingTransferUsage { required: vk::BufferUsageFlags },
    #[error("Copy source and destination share buffer {buffer:?}")]
    OverlappingCopy { buffer: vk::Buffer },
    #[error("Mapped memory cannot be viewed as {dtype}: {reason:?}")]
    MisalignedView { dtype: Dtype, reason: bytemuck::PodCastError },
}

impl TensorError {
    pub(crate) fn backend(operation: &'static str) -> impl FnOnce(vk::Result) -> Self {
        move |result| TensorError::Backend { operation, result }
    }

    /// Capability errors stem from the hardware or driver and are never a
    /// caller bug.
    pub fn is_capability_error(&self) -> bool {
        matches!(self, TensorError::NoCompatibleMemoryType { .. } | TensorError::Backend { .. })
    }
}
