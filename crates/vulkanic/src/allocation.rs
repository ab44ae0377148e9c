use std::ptr::NonNull;

use ash::vk;

use crate::{
    error::TensorError, ownership::{ExternalResource, ResourcePair}, tensor::TensorKind, types::GpuDevice
};

/// Buffer usage and memory properties requested for one resource pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceRequest {
    pub usage: vk::BufferUsageFlags,
    pub memory_flags: vk::MemoryPropertyFlags,
}

/// Per-kind allocation table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPolicy {
    pub primary: ResourceRequest,
    pub staging: Option<ResourceRequest>,
}

impl AllocationPolicy {
    pub fn for_kind(kind: TensorKind) -> Self {
        let transfer = vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST;
        let host_visible = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        match kind {
            TensorKind::Device => Self {
                primary: ResourceRequest {
                    usage: transfer | vk::BufferUsageFlags::STORAGE_BUFFER,
                    memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                },
                staging: Some(ResourceRequest {
                    usage: transfer,
                    memory_flags: host_visible,
                }),
            },
            TensorKind::Host => Self {
                primary: ResourceRequest {
                    usage: transfer | vk::BufferUsageFlags::STORAGE_BUFFER,
                    memory_flags: host_visible,
                },
                staging: None,
            },
            TensorKind::Storage => Self {
                primary: ResourceRequest {
                    usage: vk::BufferUsageFlags::STORAGE_BUFFER,
                    memory_flags: vk::MemoryPropertyFlags::DEVICE_LOCAL,
                },
                staging: None,
            },
        }
    }
}

/// First memory type allowed by `type_bits` whose properties contain `required`.
pub fn select_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = (properties.memory_type_count as usize).min(vk::MAX_MEMORY_TYPES);
    properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|(index, ty)| type_bits & (1 << index) != 0 && ty.property_flags.contains(required))
        .map(|(index, _)| index as u32)
}

/// Byte size of `size` elements of `data_type_memory_size` bytes.
pub fn memory_size_of(size: u32, data_type_memory_size: u32) -> Result<u32, TensorError> {
    if size == 0 {
        return Err(TensorError::EmptyTensor);
    }
    size.checked_mul(data_type_memory_size).ok_or(TensorError::SizeOverflow {
        elements: size,
        element_size: data_type_memory_size,
    })
}

/// Creates a buffer, allocates matching memory and binds it at offset 0.
/// Nothing created here survives an error.
pub(crate) fn create_resource_pair(device: &dyn GpuDevice, size: u64, request: ResourceRequest) -> Result<ResourcePair, TensorError> {
    let buffer = device
        .create_buffer(size, request.usage)
        .map_err(TensorError::backend("vkCreateBuffer"))?;

    match bind_new_memory(device, buffer, request) {
        Ok(memory) => Ok(ResourcePair::owned(buffer, memory, request.usage)),
        Err(err) => {
            unsafe { device.destroy_buffer(buffer) };
            Err(err)
        }
    }
}

fn bind_new_memory(device: &dyn GpuDevice, buffer: vk::Buffer, request: ResourceRequest) -> Result<vk::DeviceMemory, TensorError> {
    let requirements = unsafe { device.buffer_memory_requirements(buffer) };
    let type_index = select_memory_type(device.memory_properties(), requirements.memory_type_bits, request.memory_flags).ok_or(
        TensorError::NoCompatibleMemoryType {
            type_bits: requirements.memory_type_bits,
            required: request.memory_flags,
        },
    )?;
    let memory = device
        .allocate_memory(requirements.size, type_index)
        .map_err(TensorError::backend("vkAllocateMemory"))?;
    if let Err(result) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
        unsafe { device.free_memory(memory) };
        return Err(TensorError::backend("vkBindBufferMemory")(result));
    }
    tracing::debug!(
        allocation = requirements.size,
        memory_type = type_index,
        usage = ?request.usage,
        "buffer memory bound"
    );
    Ok(memory)
}

/// Primary and optional staging pair of a freshly allocated tensor.
#[derive(Debug)]
pub(crate) struct Allocation {
    pub primary: ResourcePair,
    pub staging: Option<ResourcePair>,
}

impl Allocation {
    /// Owned bytes split into (device-local, host-visible).
    pub fn owned_bytes(&self, kind: TensorKind, memory_size: u32) -> (u64, u64) {
        let policy = AllocationPolicy::for_kind(kind);
        let pairs = [(Some(&self.primary), Some(policy.primary)), (self.staging.as_ref(), policy.staging)];
        let mut device_local = 0;
        let mut host_visible = 0;
        for (pair, request) in pairs {
            if let (Some(pair), Some(request)) = (pair, request)
                && pair.memory.is_owned()
            {
                if request.memory_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
                    host_visible += u64::from(memory_size);
                } else {
                    device_local += u64::from(memory_size);
                }
            }
        }
        (device_local, host_visible)
    }

    /// Releases both pairs, staging last.
    ///
    /// # Safety
    /// Every handle must belong to `device` and be unused by pending GPU work.
    pub unsafe fn release(self, device: &dyn GpuDevice) {
        unsafe {
            self.primary.release(device);
            if let Some(staging) = self.staging {
                staging.release(device);
            }
        }
    }
}

/// Builds the resource pairs a tensor of `kind` needs, taking caller-supplied
/// pairs where given.
pub(crate) fn allocate(
    device: &dyn GpuDevice,
    kind: TensorKind,
    memory_size: u32,
    primary: Option<ExternalResource>,
    staging: Option<ExternalResource>,
) -> Result<Allocation, TensorError> {
    let policy = AllocationPolicy::for_kind(kind);
    if staging.is_some() && policy.staging.is_none() {
        return Err(TensorError::UnsupportedForKind {
            operation: "borrowed staging buffer",
            kind,
        });
    }

    let size = u64::from(memory_size);
    let primary = match primary {
        Some(resource) => ResourcePair::borrowed(resource),
        None => create_resource_pair(device, size, policy.primary)?,
    };
    let staging = match (policy.staging, staging) {
        (None, _) => None,
        (Some(_), Some(resource)) => Some(ResourcePair::borrowed(resource)),
        (Some(request), None) => match create_resource_pair(device, size, request) {
            Ok(pair) => Some(pair),
            Err(err) => {
                unsafe { primary.release(device) };
                return Err(err);
            }
        },
    };
    Ok(Allocation { primary, staging })
}

/// Maps `memory_size` bytes of a host-visible pair and seeds them with
/// `data`. Owned memory without data is zeroed; borrowed memory keeps its
/// contents.
pub(crate) fn map_and_upload(
    device: &dyn GpuDevice,
    pair: &ResourcePair,
    memory_size: u32,
    data: Option<&[u8]>,
) -> Result<NonNull<u8>, TensorError> {
    let memory = pair.memory.handle();
    let raw = unsafe { device.map_memory(memory, 0, u64::from(memory_size)) }.map_err(TensorError::backend("vkMapMemory"))?;
    let Some(mapped) = NonNull::new(raw.cast::<u8>()) else {
        unsafe { device.unmap_memory(memory) };
        return Err(TensorError::Backend {
            operation: "vkMapMemory",
            result: vk::Result::ERROR_MEMORY_MAP_FAILED,
        });
    };
    if let Some(bytes) = data {
        debug_assert_eq!(bytes.len(), memory_size as usize);
    }
    match data {
        Some(bytes) => unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.as_ptr(), memory_size as usize) },
        None if pair.memory.is_owned() => unsafe { std::ptr::write_bytes(mapped.as_ptr(), 0, memory_size as usize) },
        None => {}
    }
    Ok(mapped)
}

#[path = "allocation.test.rs"]
mod tests;
