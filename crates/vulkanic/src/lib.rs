//! Tensor memory management and host/device synchronization over Vulkan.
//!
//! A [`Tensor`] owns (or borrows) a primary buffer and, for
//! [`TensorKind::Device`], a host-visible staging buffer. Data moves between
//! the two only through copies and barriers recorded with the `record_*`
//! methods into a command buffer the caller submits.

pub use allocation::{AllocationPolicy, ResourceRequest, select_memory_type};
pub use error::TensorError;
pub use ownership::{ExternalResource, Ownership, OwnershipReport, Tracked};
pub use sync::{BarrierScope, record_buffer_memory_barrier};
pub use tensor::*;
pub use types::*;

pub mod allocation;
mod error;
pub mod ownership;
pub mod sync;
pub mod tensor;
pub mod types;

pub use ash;

#[cfg(test)]
mod tests;
