use ash::vk::{self, Handle};

use crate::types::GpuDevice;

/// Whether a tensor is responsible for freeing a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ownership {
    /// Created by the tensor; destroyed on teardown.
    Owned,
    /// Supplied by the caller; left alive on teardown.
    Borrowed,
}

/// A handle paired with its ownership tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tracked<H> {
    handle: H,
    ownership: Ownership,
}

impl<H: Handle + Copy> Tracked<H> {
    pub fn owned(handle: H) -> Self {
        Self {
            handle,
            ownership: Ownership::Owned,
        }
    }

    pub fn borrowed(handle: H) -> Self {
        Self {
            handle,
            ownership: Ownership::Borrowed,
        }
    }

    pub fn handle(&self) -> H {
        self.handle
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        self.ownership == Ownership::Owned
    }
}

/// Buffer handle supplied by the caller together with the memory bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExternalResource {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
}

/// Ownership of each of a tensor's four handle slots. `None` marks a slot the
/// tensor's kind never uses or a tensor that has been destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OwnershipReport {
    pub primary_buffer: Option<Ownership>,
    pub primary_memory: Option<Ownership>,
    pub staging_buffer: Option<Ownership>,
    pub staging_memory: Option<Ownership>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct ReleaseSummary {
    pub freed: u32,
    pub retained: u32,
}

impl std::ops::AddAssign for ReleaseSummary {
    fn add_assign(&mut self, rhs: Self) {
        self.freed += rhs.freed;
        self.retained += rhs.retained;
    }
}

/// A buffer and the memory bound to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResourcePair {
    pub buffer: Tracked<vk::Buffer>,
    pub memory: Tracked<vk::DeviceMemory>,
    /// Usage the buffer was created with; unknown for borrowed buffers.
    pub usage: Option<vk::BufferUsageFlags>,
}

impl ResourcePair {
    pub fn owned(buffer: vk::Buffer, memory: vk::DeviceMemory, usage: vk::BufferUsageFlags) -> Self {
        Self {
            buffer: Tracked::owned(buffer),
            memory: Tracked::owned(memory),
            usage: Some(usage),
        }
    }

    pub fn borrowed(resource: ExternalResource) -> Self {
        Self {
            buffer: Tracked::borrowed(resource.buffer),
            memory: Tracked::borrowed(resource.memory),
            usage: None,
        }
    }

    pub fn owned_handles(&self) -> u32 {
        self.buffer.is_owned() as u32 + self.memory.is_owned() as u32
    }

    /// Destroys the owned handles, buffer before memory. Consumes the pair so
    /// a slot can only be released once.
    ///
    /// # Safety
    /// The handles must belong to `device` and no pending GPU work may use them.
    pub unsafe fn release(self, device: &dyn GpuDevice) -> ReleaseSummary {
        let mut summary = ReleaseSummary::default();
        if self.buffer.is_owned() {
            unsafe { device.destroy_buffer(self.buffer.handle()) };
            summary.freed += 1;
        } else {
            summary.retained += 1;
        }
        if self.memory.is_owned() {
            unsafe { device.free_memory(self.memory.handle()) };
            summary.freed += 1;
        } else {
            summary.retained += 1;
        }
        summary
    }
}

#[path = "ownership.test.rs"]
mod tests;
