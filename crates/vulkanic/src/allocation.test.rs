#![cfg(test)]

use super::*;
use crate::types::EmulatedDevice;

fn properties(types: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
    *EmulatedDevice::with_memory_types(types).memory_properties()
}

#[test]
fn policy_table_matches_kinds() {
    let device = AllocationPolicy::for_kind(TensorKind::Device);
    assert!(device.primary.usage.contains(
        vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST
    ));
    assert_eq!(device.primary.memory_flags, vk::MemoryPropertyFlags::DEVICE_LOCAL);
    let staging = device.staging.expect("device tensors stage through host memory");
    assert_eq!(staging.usage, vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST);
    assert_eq!(
        staging.memory_flags,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
    );

    let host = AllocationPolicy::for_kind(TensorKind::Host);
    assert!(host.staging.is_none());
    assert!(host.primary.memory_flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE));

    let storage = AllocationPolicy::for_kind(TensorKind::Storage);
    assert!(storage.staging.is_none());
    assert_eq!(storage.primary.usage, vk::BufferUsageFlags::STORAGE_BUFFER);
    assert_eq!(storage.primary.memory_flags, vk::MemoryPropertyFlags::DEVICE_LOCAL);
}

#[test]
fn select_memory_type_picks_first_allowed_superset() {
    let props = properties(&[
        vk::MemoryPropertyFlags::DEVICE_LOCAL,
        vk::MemoryPropertyFlags::HOST_VISIBLE,
        vk::MemoryPropertyFlags::DEVICE_LOCAL | vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    ]);
    let coherent = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

    assert_eq!(select_memory_type(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL), Some(0));
    assert_eq!(select_memory_type(&props, 0b110, vk::MemoryPropertyFlags::DEVICE_LOCAL), Some(2));
    assert_eq!(select_memory_type(&props, 0b111, vk::MemoryPropertyFlags::HOST_VISIBLE), Some(1));
    assert_eq!(select_memory_type(&props, 0b111, coherent), Some(2));
    assert_eq!(select_memory_type(&props, 0b011, coherent), None);
}

#[test]
fn memory_size_rejects_empty_and_overflow() {
    assert_eq!(memory_size_of(4, 4).unwrap(), 16);
    assert!(matches!(memory_size_of(0, 4), Err(TensorError::EmptyTensor)));
    assert!(matches!(
        memory_size_of(u32::MAX, 8),
        Err(TensorError::SizeOverflow { elements: u32::MAX, element_size: 8 })
    ));
}

#[test]
fn missing_memory_type_releases_the_buffer() {
    let device = EmulatedDevice::with_memory_types(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
    let policy = AllocationPolicy::for_kind(TensorKind::Host);

    let err = create_resource_pair(&device, 16, policy.primary).unwrap_err();
    assert!(matches!(err, TensorError::NoCompatibleMemoryType { .. }));
    assert!(err.is_capability_error());
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memories(), 0);
}

#[test]
fn failed_staging_releases_primary() {
    let device = EmulatedDevice::new();
    device.fail_allocations_after(1);

    let err = allocate(&device, TensorKind::Device, 16, None, None).unwrap_err();
    assert!(matches!(
        err,
        TensorError::Backend {
            operation: "vkAllocateMemory",
            result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY
        }
    ));
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memories(), 0);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn borrowed_staging_is_rejected_for_host_kind() {
    let device = EmulatedDevice::new();
    let (buffer, memory) = device
        .create_bound_buffer(
            16,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
        )
        .unwrap();
    let err = allocate(&device, TensorKind::Host, 16, None, Some(ExternalResource { buffer, memory })).unwrap_err();
    assert!(matches!(err, TensorError::UnsupportedForKind { kind: TensorKind::Host, .. }));
    assert_eq!(device.live_buffers(), 1);
}

#[test]
fn upload_seeds_mapped_memory() {
    let device = EmulatedDevice::new();
    let allocation = allocate(&device, TensorKind::Host, 8, None, None).unwrap();
    let mapped = map_and_upload(&device, &allocation.primary, 8, Some(&[9, 8, 7, 6, 5, 4, 3, 2])).unwrap();

    let view = unsafe { std::slice::from_raw_parts(mapped.as_ptr(), 8) };
    assert_eq!(view, &[9, 8, 7, 6, 5, 4, 3, 2]);
    assert!(device.is_mapped(allocation.primary.memory.handle()));

    unsafe {
        device.unmap_memory(allocation.primary.memory.handle());
        allocation.release(&device);
    }
    assert_eq!(device.live_buffers(), 0);
}
