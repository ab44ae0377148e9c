use std::ffi::c_void;

use ash::{prelude::VkResult, vk};

use super::GpuDevice;

/// [`GpuDevice`] over a real `ash` logical device.
///
/// The wrapper never destroys the logical device; whoever created it stays
/// responsible for tearing it down after every tensor is gone.
pub struct VulkanDevice {
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
}

impl VulkanDevice {
    /// # Safety
    /// `physical_device` must belong to `instance`, and `device` must have been
    /// created from it. Both must outlive the returned wrapper.
    pub unsafe fn new(instance: &ash::Instance, physical_device: vk::PhysicalDevice, device: ash::Device) -> Self {
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        tracing::debug!(
            memory_types = memory_properties.memory_type_count,
            memory_heaps = memory_properties.memory_heap_count,
            "vulkan device wrapped"
        );
        Self { device, memory_properties }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }
}

impl std::fmt::Debug for VulkanDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VulkanDevice")
            .field("handle", &self.device.handle())
            .field("memory_types", &self.memory_properties.memory_type_count)
            .finish()
    }
}

impl GpuDevice for VulkanDevice {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);
        unsafe { self.device.create_buffer(&info, None) }
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let info = vk::MemoryAllocateInfo::default()
            .allocation_size(size)
            .memory_type_index(memory_type_index);
        unsafe { self.device.allocate_memory(&info, None) }
    }

    unsafe fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        unsafe { self.device.get_buffer_memory_requirements(buffer) }
    }

    unsafe fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        unsafe { self.device.bind_buffer_memory(buffer, memory, offset) }
    }

    unsafe fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void> {
        unsafe { self.device.map_memory(memory, offset, size, vk::MemoryMapFlags::empty()) }
    }

    unsafe fn unmap_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.unmap_memory(memory) }
    }

    unsafe fn destroy_buffer(&self, buffer: vk::Buffer) {
        unsafe { self.device.destroy_buffer(buffer, None) }
    }

    unsafe fn free_memory(&self, memory: vk::DeviceMemory) {
        unsafe { self.device.free_memory(memory, None) }
    }

    unsafe fn cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        unsafe { self.device.cmd_copy_buffer(command_buffer, src, dst, regions) }
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
    ) {
        unsafe {
            self.device.cmd_pipeline_barrier(
                command_buffer,
                src_stage,
                dst_stage,
                vk::DependencyFlags::empty(),
                &[],
                buffer_barriers,
                &[],
            )
        }
    }
}
