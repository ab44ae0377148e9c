//! Runs against a real Vulkan driver when one is installed; skips otherwise.

use std::sync::Arc;

use serial_test::serial;
use vulkanic::{GpuDevice, TensorKind, TensorT, VulkanDevice, ash::vk};

struct Gpu {
    _entry: ash::Entry,
    instance: ash::Instance,
    device: ash::Device,
    physical_device: vk::PhysicalDevice,
    queue: vk::Queue,
    pool: vk::CommandPool,
}

impl Gpu {
    fn new() -> Option<Self> {
        let entry = unsafe { ash::Entry::load() }.ok()?;
        let app_info = vk::ApplicationInfo::default().api_version(vk::API_VERSION_1_1);
        let instance_info = vk::InstanceCreateInfo::default().application_info(&app_info);
        let instance = unsafe { entry.create_instance(&instance_info, None) }.ok()?;

        let Some((physical_device, family)) = Self::pick_compute_queue(&instance) else {
            unsafe { instance.destroy_instance(None) };
            return None;
        };
        let priorities = [1.0f32];
        let queue_info = vk::DeviceQueueCreateInfo::default()
            .queue_family_index(family)
            .queue_priorities(&priorities);
        let device_info = vk::DeviceCreateInfo::default().queue_create_infos(std::slice::from_ref(&queue_info));
        let device = match unsafe { instance.create_device(physical_device, &device_info, None) } {
            Ok(device) => device,
            Err(_) => {
                unsafe { instance.destroy_instance(None) };
                return None;
            }
        };
        let queue = unsafe { device.get_device_queue(family, 0) };
        let pool_info = vk::CommandPoolCreateInfo::default().queue_family_index(family);
        let pool = match unsafe { device.create_command_pool(&pool_info, None) } {
            Ok(pool) => pool,
            Err(_) => {
                unsafe {
                    device.destroy_device(None);
                    instance.destroy_instance(None);
                }
                return None;
            }
        };

        Some(Self {
            _entry: entry,
            instance,
            device,
            physical_device,
            queue,
            pool,
        })
    }

    fn pick_compute_queue(instance: &ash::Instance) -> Option<(vk::PhysicalDevice, u32)> {
        let physical_devices = unsafe { instance.enumerate_physical_devices() }.ok()?;
        physical_devices.into_iter().find_map(|pdev| {
            let families = unsafe { instance.get_physical_device_queue_family_properties(pdev) };
            families
                .iter()
                .position(|f| f.queue_flags.contains(vk::QueueFlags::COMPUTE))
                .map(|index| (pdev, index as u32))
        })
    }

    fn tensor_device(&self) -> Arc<dyn GpuDevice> {
        Arc::new(unsafe { VulkanDevice::new(&self.instance, self.physical_device, self.device.clone()) })
    }

    /// Records with `record`, submits and waits for completion.
    fn run(&self, record: impl FnOnce(vk::CommandBuffer)) {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        unsafe {
            let cmd = self.device.allocate_command_buffers(&alloc_info).expect("command buffer")[0];
            let begin = vk::CommandBufferBeginInfo::default().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            self.device.begin_command_buffer(cmd, &begin).expect("begin");
            record(cmd);
            self.device.end_command_buffer(cmd).expect("end");

            let fence = self.device.create_fence(&vk::FenceCreateInfo::default(), None).expect("fence");
            let submit = vk::SubmitInfo::default().command_buffers(std::slice::from_ref(&cmd));
            self.device.queue_submit(self.queue, &[submit], fence).expect("submit");
            self.device.wait_for_fences(&[fence], true, u64::MAX).expect("wait");
            self.device.destroy_fence(fence, None);
            self.device.free_command_buffers(self.pool, &[cmd]);
        }
    }
}

impl Drop for Gpu {
    fn drop(&mut self) {
        unsafe {
            let _ = self.device.device_wait_idle();
            self.device.destroy_command_pool(self.pool, None);
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
    }
}

#[test]
#[serial]
fn device_tensor_round_trip() {
    let Some(gpu) = Gpu::new() else {
        eprintln!("skipping: no Vulkan device available");
        return;
    };
    let device = gpu.tensor_device();
    {
        let mut tensor = TensorT::new(device.clone(), &[1.0f32, 2.0, 3.0, 4.0], TensorKind::Device).unwrap();
        gpu.run(|cmd| tensor.record_copy_from_staging_to_device(cmd).unwrap());

        tensor.set_data(&[0.0; 4]).unwrap();
        gpu.run(|cmd| {
            tensor.record_copy_from_device_to_staging(cmd).unwrap();
            tensor
                .record_staging_buffer_memory_barrier(
                    cmd,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::HOST_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::HOST,
                )
                .unwrap();
        });
        assert_eq!(tensor.vector().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    }
}

#[test]
#[serial]
fn host_tensor_copy_truncates_to_destination() {
    let Some(gpu) = Gpu::new() else {
        eprintln!("skipping: no Vulkan device available");
        return;
    };
    let device = gpu.tensor_device();
    {
        let source = TensorT::new(device.clone(), &[10u32, 20, 30, 40], TensorKind::Host).unwrap();
        let target = TensorT::new(device.clone(), &[0u32, 0], TensorKind::Host).unwrap();
        gpu.run(|cmd| {
            target.record_copy_from(cmd, &source).unwrap();
            target
                .record_primary_buffer_memory_barrier(
                    cmd,
                    vk::AccessFlags::TRANSFER_WRITE,
                    vk::AccessFlags::HOST_READ,
                    vk::PipelineStageFlags::TRANSFER,
                    vk::PipelineStageFlags::HOST,
                )
                .unwrap();
        });
        assert_eq!(target.vector().unwrap(), vec![10, 20]);
    }
}
