use std::ffi::c_void;

use ash::{prelude::VkResult, vk};

pub mod emulated;
pub mod vulkan;

pub use emulated::{CopyRegion, EmulatedDevice, EmulationError, Hazard, RecordedBarrier, RecordedCommand};
pub use vulkan::VulkanDevice;

/// Backend operations a tensor needs from a logical device.
///
/// Creation calls are safe because they only produce new handles. Calls that
/// consume or dereference handles are `unsafe`: the caller guarantees every
/// handle was created by this device and is still alive.
pub trait GpuDevice: Send + Sync {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties;

    /// Creates an exclusive-sharing buffer of `size` bytes.
    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer>;

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<vk::DeviceMemory>;

    /// # Safety
    /// `buffer` must be a live buffer of this device.
    unsafe fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements;

    /// # Safety
    /// Both handles must be live, and `buffer` must not already be bound.
    unsafe fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()>;

    /// # Safety
    /// `memory` must be live, host-visible and not currently mapped.
    unsafe fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void>;

    /// # Safety
    /// `memory` must be currently mapped; pointers from the mapping become dangling.
    unsafe fn unmap_memory(&self, memory: vk::DeviceMemory);

    /// # Safety
    /// `buffer` must be live and unused by pending GPU work.
    unsafe fn destroy_buffer(&self, buffer: vk::Buffer);

    /// # Safety
    /// `memory` must be live, and every buffer bound to it destroyed first.
    unsafe fn free_memory(&self, memory: vk::DeviceMemory);

    /// # Safety
    /// `command_buffer` must be in the recording state and both buffers live.
    unsafe fn cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]);

    /// # Safety
    /// `command_buffer` must be in the recording state and every barrier
    /// buffer live.
    unsafe fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
    );
}
