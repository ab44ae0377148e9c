//! Copy and barrier recording between a tensor's staging and device-local
//! buffers. Nothing here executes GPU work: commands are appended to a
//! caller-owned command buffer in call order, and the caller submits and
//! fences it.

use ash::vk::{self, Handle};
use vulkanic_instrumentation::{AppConfig, MetricEvent, record_metric};

use crate::{error::TensorError, ownership::ResourcePair, tensor::Tensor, types::GpuDevice};

/// Access mask and pipeline stage on one side of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierScope {
    pub access: vk::AccessFlags,
    pub stage: vk::PipelineStageFlags,
}

impl BarrierScope {
    pub const TRANSFER_READ: Self = Self::new(vk::AccessFlags::TRANSFER_READ, vk::PipelineStageFlags::TRANSFER);
    pub const TRANSFER_WRITE: Self = Self::new(vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER);
    pub const SHADER_READ: Self = Self::new(vk::AccessFlags::SHADER_READ, vk::PipelineStageFlags::COMPUTE_SHADER);
    pub const SHADER_WRITE: Self = Self::new(vk::AccessFlags::SHADER_WRITE, vk::PipelineStageFlags::COMPUTE_SHADER);

    pub const fn new(access: vk::AccessFlags, stage: vk::PipelineStageFlags) -> Self {
        Self { access, stage }
    }
}

/// Records a whole-buffer memory barrier with no queue family transfer and
/// no dependency flags.
///
/// # Safety
/// `command_buffer` must be recording and `buffer` must be a live buffer of
/// `device` of at least `size` bytes.
#[allow(clippy::too_many_arguments)]
pub unsafe fn record_buffer_memory_barrier(
    device: &dyn GpuDevice,
    command_buffer: vk::CommandBuffer,
    buffer: vk::Buffer,
    size: vk::DeviceSize,
    src_access: vk::AccessFlags,
    dst_access: vk::AccessFlags,
    src_stage: vk::PipelineStageFlags,
    dst_stage: vk::PipelineStageFlags,
) {
    let barrier = vk::BufferMemoryBarrier::default()
        .src_access_mask(src_access)
        .dst_access_mask(dst_access)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .buffer(buffer)
        .offset(0)
        .size(size);
    unsafe { device.cmd_pipeline_barrier(command_buffer, src_stage, dst_stage, &[barrier]) };
    trace_command("barrier", command_buffer, size);
}

unsafe fn record_copy(device: &dyn GpuDevice, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, size: vk::DeviceSize) {
    let region = vk::BufferCopy {
        src_offset: 0,
        dst_offset: 0,
        size,
    };
    unsafe { device.cmd_copy_buffer(command_buffer, src, dst, &[region]) };
    trace_command("copy", command_buffer, size);
}

fn trace_command(command: &str, command_buffer: vk::CommandBuffer, bytes: u64) {
    if !AppConfig::trace_commands_enabled() {
        return;
    }
    tracing::trace!(command, command_buffer = command_buffer.as_raw(), bytes, "command recorded");
    record_metric!(MetricEvent::CommandRecorded {
        command: command.to_string(),
        command_buffer: command_buffer.as_raw(),
        bytes,
    });
}

fn require_usage(pair: &ResourcePair, required: vk::BufferUsageFlags) -> Result<(), TensorError> {
    match pair.usage {
        Some(usage) if !usage.contains(required) => Err(TensorError::MissingTransferUsage { required }),
        _ => Ok(()),
    }
}

impl Tensor {
    /// Records a copy of `source`'s primary buffer into this tensor's primary
    /// buffer, sized to the smaller of the two. Both tensors must be backed
    /// by distinct buffers.
    pub fn record_copy_from(&self, command_buffer: vk::CommandBuffer, source: &Tensor) -> Result<(), TensorError> {
        let device = self.device()?;
        let dst = self.primary()?;
        let src = source.primary()?;
        require_usage(src, vk::BufferUsageFlags::TRANSFER_SRC)?;
        require_usage(dst, vk::BufferUsageFlags::TRANSFER_DST)?;
        if src.buffer.handle() == dst.buffer.handle() {
            return Err(TensorError::OverlappingCopy {
                buffer: dst.buffer.handle(),
            });
        }

        let size = source.memory_size().min(self.memory_size());
        unsafe { record_copy(device, command_buffer, src.buffer.handle(), dst.buffer.handle(), u64::from(size)) };
        Ok(())
    }

    /// Records the staging-to-device copy followed by a barrier that makes
    /// the transfer visible to compute shader reads.
    pub fn record_copy_from_staging_to_device(&self, command_buffer: vk::CommandBuffer) -> Result<(), TensorError> {
        self.record_copy_from_staging_to_device_with(command_buffer, BarrierScope::SHADER_READ)
    }

    pub fn record_copy_from_staging_to_device_with(
        &self,
        command_buffer: vk::CommandBuffer,
        dst_scope: BarrierScope,
    ) -> Result<(), TensorError> {
        let staging = self.staging("record_copy_from_staging_to_device")?;
        let device = self.device()?;
        let primary = self.primary()?;
        let size = u64::from(self.memory_size());

        unsafe {
            record_copy(device, command_buffer, staging.buffer.handle(), primary.buffer.handle(), size);
            record_buffer_memory_barrier(
                device,
                command_buffer,
                primary.buffer.handle(),
                size,
                BarrierScope::TRANSFER_WRITE.access,
                dst_scope.access,
                BarrierScope::TRANSFER_WRITE.stage,
                dst_scope.stage,
            );
        }
        Ok(())
    }

    /// Records a barrier that waits for compute shader writes, followed by
    /// the device-to-staging copy.
    pub fn record_copy_from_device_to_staging(&self, command_buffer: vk::CommandBuffer) -> Result<(), TensorError> {
        self.record_copy_from_device_to_staging_with(command_buffer, BarrierScope::SHADER_WRITE)
    }

    pub fn record_copy_from_device_to_staging_with(
        &self,
        command_buffer: vk::CommandBuffer,
        src_scope: BarrierScope,
    ) -> Result<(), TensorError> {
        let staging = self.staging("record_copy_from_device_to_staging")?;
        let device = self.device()?;
        let primary = self.primary()?;
        let size = u64::from(self.memory_size());

        unsafe {
            record_buffer_memory_barrier(
                device,
                command_buffer,
                primary.buffer.handle(),
                size,
                src_scope.access,
                BarrierScope::TRANSFER_READ.access,
                src_scope.stage,
                BarrierScope::TRANSFER_READ.stage,
            );
            record_copy(device, command_buffer, primary.buffer.handle(), staging.buffer.handle(), size);
        }
        Ok(())
    }

    pub fn record_primary_buffer_memory_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) -> Result<(), TensorError> {
        let device = self.device()?;
        let primary = self.primary()?;
        unsafe {
            record_buffer_memory_barrier(
                device,
                command_buffer,
                primary.buffer.handle(),
                u64::from(self.memory_size()),
                src_access,
                dst_access,
                src_stage,
                dst_stage,
            )
        };
        Ok(())
    }

    pub fn record_staging_buffer_memory_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_access: vk::AccessFlags,
        dst_access: vk::AccessFlags,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
    ) -> Result<(), TensorError> {
        let staging = self.staging("record_staging_buffer_memory_barrier")?;
        let device = self.device()?;
        unsafe {
            record_buffer_memory_barrier(
                device,
                command_buffer,
                staging.buffer.handle(),
                u64::from(self.memory_size()),
                src_access,
                dst_access,
                src_stage,
                dst_stage,
            )
        };
        Ok(())
    }
}
