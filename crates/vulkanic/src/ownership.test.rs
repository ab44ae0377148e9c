#![cfg(test)]

use super::*;
use crate::types::EmulatedDevice;

fn host_pair(device: &EmulatedDevice) -> ExternalResource {
    let (buffer, memory) = device
        .create_bound_buffer(
            32,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )
        .unwrap();
    ExternalResource { buffer, memory }
}

#[test]
fn release_frees_owned_buffer_before_memory() {
    let device = EmulatedDevice::new();
    let resource = host_pair(&device);
    let pair = ResourcePair::owned(resource.buffer, resource.memory, vk::BufferUsageFlags::TRANSFER_SRC);

    let summary = unsafe { pair.release(&device) };
    assert_eq!(summary, ReleaseSummary { freed: 2, retained: 0 });
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memories(), 0);
    assert!(device.violations().is_empty(), "{:?}", device.violations());
}

#[test]
fn release_leaves_borrowed_handles_alive() {
    let device = EmulatedDevice::new();
    let resource = host_pair(&device);
    let pair = ResourcePair::borrowed(resource);
    assert_eq!(pair.owned_handles(), 0);

    let summary = unsafe { pair.release(&device) };
    assert_eq!(summary, ReleaseSummary { freed: 0, retained: 2 });
    assert!(device.is_buffer_live(resource.buffer));
    assert!(device.is_memory_live(resource.memory));
}

#[test]
fn tracked_reports_ownership() {
    let owned = Tracked::owned(vk::Buffer::from_raw(7));
    let borrowed = Tracked::borrowed(vk::Buffer::from_raw(7));
    assert!(owned.is_owned());
    assert_eq!(borrowed.ownership(), Ownership::Borrowed);
    assert_eq!(owned.handle(), borrowed.handle());
}
