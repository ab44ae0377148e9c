#![cfg(test)]

use super::*;

const TRANSFER: vk::BufferUsageFlags = vk::BufferUsageFlags::from_raw(
    vk::BufferUsageFlags::TRANSFER_SRC.as_raw() | vk::BufferUsageFlags::TRANSFER_DST.as_raw(),
);

fn host_flags() -> vk::MemoryPropertyFlags {
    vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT
}

#[test]
fn default_layout_exposes_device_and_host_types() {
    let device = EmulatedDevice::new();
    let props = device.memory_properties();
    assert_eq!(props.memory_type_count, 2);
    assert_eq!(props.memory_types[0].property_flags, vk::MemoryPropertyFlags::DEVICE_LOCAL);
    assert!(props.memory_types[1].property_flags.contains(host_flags()));
}

#[test]
fn submit_applies_copies_in_order() {
    let device = EmulatedDevice::new();
    let (a, _) = device.create_bound_buffer(8, TRANSFER, host_flags()).unwrap();
    let (b, _) = device.create_bound_buffer(8, TRANSFER, host_flags()).unwrap();
    device.write_buffer(a, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();

    let cmd = device.allocate_command_buffer();
    unsafe {
        device.cmd_copy_buffer(cmd, a, b, &[vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 8 }]);
        device.cmd_copy_buffer(cmd, a, b, &[vk::BufferCopy { src_offset: 0, dst_offset: 4, size: 4 }]);
    }
    assert_eq!(device.recorded(cmd).len(), 2);
    device.submit(cmd).unwrap();

    assert_eq!(device.read_buffer(b, 8).unwrap(), vec![1, 2, 3, 4, 1, 2, 3, 4]);
    assert!(device.recorded(cmd).is_empty());
}

#[test]
fn submit_rejects_missing_transfer_usage() {
    let device = EmulatedDevice::new();
    let (src, _) = device
        .create_bound_buffer(4, vk::BufferUsageFlags::STORAGE_BUFFER, vk::MemoryPropertyFlags::DEVICE_LOCAL)
        .unwrap();
    let (dst, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let cmd = device.allocate_command_buffer();
    unsafe { device.cmd_copy_buffer(cmd, src, dst, &[vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 4 }]) };

    let err = device.submit(cmd).unwrap_err();
    assert_eq!(
        err,
        EmulationError::MissingUsage {
            buffer: src.as_raw(),
            required: vk::BufferUsageFlags::TRANSFER_SRC
        }
    );
}

#[test]
fn unbarriered_read_after_write_is_reported() {
    let device = EmulatedDevice::new();
    let (a, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let (b, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let (c, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let region = [vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 4 }];

    let cmd = device.allocate_command_buffer();
    unsafe {
        device.cmd_copy_buffer(cmd, a, b, &region);
        device.cmd_copy_buffer(cmd, b, c, &region);
    }
    device.submit(cmd).unwrap();
    let hazards = device.hazards();
    assert_eq!(hazards.len(), 1);
    assert_eq!(hazards[0].buffer, b);
    assert_eq!(hazards[0].command_index, 1);
}

#[test]
fn barrier_clears_pending_write() {
    let device = EmulatedDevice::new();
    let (a, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let (b, _) = device.create_bound_buffer(4, TRANSFER, host_flags()).unwrap();
    let region = [vk::BufferCopy { src_offset: 0, dst_offset: 0, size: 4 }];
    let barrier = vk::BufferMemoryBarrier::default()
        .src_access_mask(vk::AccessFlags::TRANSFER_WRITE)
        .dst_access_mask(vk::AccessFlags::TRANSFER_READ)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(b)
        .offset(0)
        .size(4);

    let cmd = device.allocate_command_buffer();
    unsafe {
        device.cmd_copy_buffer(cmd, a, b, &region);
        device.cmd_pipeline_barrier(cmd, vk::PipelineStageFlags::TRANSFER, vk::PipelineStageFlags::TRANSFER, &[barrier]);
        device.cmd_copy_buffer(cmd, b, a, &region);
    }
    device.submit(cmd).unwrap();
    assert!(device.hazards().is_empty());
}

#[test]
fn freeing_bound_memory_first_is_a_violation() {
    let device = EmulatedDevice::new();
    let (buffer, memory) = device.create_bound_buffer(16, TRANSFER, host_flags()).unwrap();
    unsafe {
        device.free_memory(memory);
        device.destroy_buffer(buffer);
    }
    assert_eq!(device.violations().len(), 1);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_memories(), 0);
}

#[test]
fn double_destroy_is_a_violation() {
    let device = EmulatedDevice::new();
    let buffer = device.create_buffer(16, TRANSFER).unwrap();
    unsafe {
        device.destroy_buffer(buffer);
        device.destroy_buffer(buffer);
    }
    assert_eq!(device.destroyed_buffers(), 1);
    assert_eq!(device.violations().len(), 1);
}

#[test]
fn device_local_memory_cannot_be_mapped() {
    let device = EmulatedDevice::new();
    let memory = device.allocate_memory(64, 0).unwrap();
    let result = unsafe { device.map_memory(memory, 0, 64) };
    assert_eq!(result.unwrap_err(), vk::Result::ERROR_MEMORY_MAP_FAILED);

    let host = device.allocate_memory(64, 1).unwrap();
    assert!(unsafe { device.map_memory(host, 0, vk::WHOLE_SIZE) }.is_ok());
    assert!(device.is_mapped(host));
    assert!(unsafe { device.map_memory(host, 0, 64) }.is_err());
}

#[test]
fn allocation_budget_fails_later_allocations() {
    let device = EmulatedDevice::new();
    device.fail_allocations_after(1);
    assert!(device.allocate_memory(64, 0).is_ok());
    assert_eq!(device.allocate_memory(64, 0).unwrap_err(), vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
}
