use std::{
    ffi::c_void, ptr::NonNull, sync::{Mutex, MutexGuard}
};

use ash::{
    prelude::VkResult, vk::{self, Handle}
};
use rustc_hash::FxHashMap;
use thiserror::Error;

use super::GpuDevice;

const BUFFER_ALIGNMENT: u64 = 64;
const HEAP_SIZE: u64 = 1 << 30;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmulationError {
    #[error("Unknown command buffer {0:#x}")]
    UnknownCommandBuffer(u64),
    #[error("Buffer {0:#x} is not live")]
    UnknownBuffer(u64),
    #[error("Buffer {0:#x} has no bound memory")]
    UnboundBuffer(u64),
    #[error("Buffer {buffer:#x} was created without {required:?} usage")]
    MissingUsage { buffer: u64, required: vk::BufferUsageFlags },
    #[error("Access of {size} bytes at offset {offset} exceeds buffer {buffer:#x} of {capacity} bytes")]
    OutOfBounds { buffer: u64, offset: u64, size: u64, capacity: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyRegion {
    pub src_offset: u64,
    pub dst_offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBarrier {
    pub buffer: vk::Buffer,
    pub src_access: vk::AccessFlags,
    pub dst_access: vk::AccessFlags,
    pub src_queue_family_index: u32,
    pub dst_queue_family_index: u32,
    pub offset: u64,
    pub size: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    CopyBuffer {
        src: vk::Buffer,
        dst: vk::Buffer,
        regions: Vec<CopyRegion>,
    },
    PipelineBarrier {
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        barriers: Vec<RecordedBarrier>,
    },
}

/// A transfer read of a buffer whose earlier write in the same submission
/// was never made available by a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hazard {
    pub buffer: vk::Buffer,
    pub pending: vk::AccessFlags,
    pub command_index: usize,
}

/// Zero-initialised host allocation addressed only through raw pointers, so
/// mappings handed out stay valid while copies run under the state lock.
struct HostAllocation {
    base: NonNull<u64>,
    words: usize,
    len: u64,
}

impl HostAllocation {
    fn zeroed(len: u64) -> Self {
        let words = (len.div_ceil(8) as usize).max(1);
        let boxed = vec![0u64; words].into_boxed_slice();
        let base = NonNull::from(Box::leak(boxed)).cast::<u64>();
        Self { base, words, len }
    }

    fn as_ptr(&self) -> *mut u8 {
        self.base.as_ptr().cast::<u8>()
    }
}

impl Drop for HostAllocation {
    fn drop(&mut self) {
        // SAFETY: `base`/`words` come from the leaked box in `zeroed`.
        unsafe { drop(Box::from_raw(std::ptr::slice_from_raw_parts_mut(self.base.as_ptr(), self.words))) }
    }
}

// SAFETY: the allocation is plain bytes owned by the device state mutex.
unsafe impl Send for HostAllocation {}

struct EmulatedBuffer {
    size: u64,
    usage: vk::BufferUsageFlags,
    binding: Option<(u64, u64)>,
}

struct EmulatedMemory {
    allocation: HostAllocation,
    type_index: u32,
    mapped: bool,
}

#[derive(Default)]
struct EmulatedState {
    next_handle: u64,
    buffers: FxHashMap<u64, EmulatedBuffer>,
    memories: FxHashMap<u64, EmulatedMemory>,
    command_buffers: FxHashMap<u64, Vec<RecordedCommand>>,
    violations: Vec<String>,
    hazards: Vec<Hazard>,
    destroyed_buffers: usize,
    freed_memories: usize,
    allocation_budget: Option<usize>,
}

impl EmulatedState {
    fn next_handle(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn violation(&mut self, message: String) {
        tracing::warn!(target: "vulkanic::emulated", "{message}");
        self.violations.push(message);
    }

    fn record(&mut self, command_buffer: vk::CommandBuffer, command: RecordedCommand) {
        match self.command_buffers.get_mut(&command_buffer.as_raw()) {
            Some(commands) => commands.push(command),
            None => self.violation(format!("recorded into unknown command buffer {:#x}", command_buffer.as_raw())),
        }
    }

    /// Resolves `offset..offset + size` of a buffer to host memory.
    fn buffer_ptr(&self, buffer: u64, required: vk::BufferUsageFlags, offset: u64, size: u64) -> Result<*mut u8, EmulationError> {
        let entry = self.buffers.get(&buffer).ok_or(EmulationError::UnknownBuffer(buffer))?;
        if !entry.usage.contains(required) {
            return Err(EmulationError::MissingUsage { buffer, required });
        }
        let (memory, memory_offset) = entry.binding.ok_or(EmulationError::UnboundBuffer(buffer))?;
        let end = offset.checked_add(size);
        if end.is_none_or(|end| end > entry.size) {
            return Err(EmulationError::OutOfBounds {
                buffer,
                offset,
                size,
                capacity: entry.size,
            });
        }
        let memory = self.memories.get(&memory).ok_or(EmulationError::UnboundBuffer(buffer))?;
        // SAFETY: binding validated `memory_offset + entry.size <= len`.
        Ok(unsafe { memory.allocation.as_ptr().add((memory_offset + offset) as usize) })
    }
}

/// In-process [`GpuDevice`] backed by host memory.
///
/// Commands are recorded per command buffer and executed in order by
/// [`EmulatedDevice::submit`]. Every handle is tracked so tests can assert on
/// leaks, double frees and teardown order.
pub struct EmulatedDevice {
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    state: Mutex<EmulatedState>,
}

impl Default for EmulatedDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl EmulatedDevice {
    /// A discrete-GPU layout: one device-local type and one host-visible,
    /// host-coherent type.
    pub fn new() -> Self {
        Self::with_memory_types(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ])
    }

    pub fn with_memory_types(types: &[vk::MemoryPropertyFlags]) -> Self {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 2,
            ..Default::default()
        };
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: HEAP_SIZE,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };
        memory_properties.memory_heaps[1] = vk::MemoryHeap {
            size: HEAP_SIZE,
            flags: vk::MemoryHeapFlags::empty(),
        };
        let count = types.len().min(vk::MAX_MEMORY_TYPES);
        for (slot, flags) in memory_properties.memory_types.iter_mut().zip(&types[..count]) {
            let heap_index = if flags.contains(vk::MemoryPropertyFlags::DEVICE_LOCAL) { 0 } else { 1 };
            *slot = vk::MemoryType {
                property_flags: *flags,
                heap_index,
            };
        }
        memory_properties.memory_type_count = count as u32;

        Self {
            memory_properties,
            state: Mutex::new(EmulatedState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, EmulatedState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Lets `count` more memory allocations succeed, then fails every
    /// following one with `ERROR_OUT_OF_DEVICE_MEMORY`.
    pub fn fail_allocations_after(&self, count: usize) {
        self.state().allocation_budget = Some(count);
    }

    pub fn allocate_command_buffer(&self) -> vk::CommandBuffer {
        let mut state = self.state();
        let handle = state.next_handle();
        state.command_buffers.insert(handle, Vec::new());
        vk::CommandBuffer::from_raw(handle)
    }

    pub fn recorded(&self, command_buffer: vk::CommandBuffer) -> Vec<RecordedCommand> {
        self.state()
            .command_buffers
            .get(&command_buffer.as_raw())
            .cloned()
            .unwrap_or_default()
    }

    /// Executes the recorded commands in order and clears the command buffer.
    ///
    /// Barriers only affect hazard tracking; every copy is applied
    /// immediately.
    pub fn submit(&self, command_buffer: vk::CommandBuffer) -> Result<(), EmulationError> {
        let mut state = self.state();
        let commands = state
            .command_buffers
            .get_mut(&command_buffer.as_raw())
            .map(std::mem::take)
            .ok_or(EmulationError::UnknownCommandBuffer(command_buffer.as_raw()))?;

        let mut pending: FxHashMap<u64, vk::AccessFlags> = FxHashMap::default();
        for (index, command) in commands.iter().enumerate() {
            match command {
                RecordedCommand::CopyBuffer { src, dst, regions } => {
                    if let Some(&flags) = pending.get(&src.as_raw()) {
                        state.hazards.push(Hazard {
                            buffer: *src,
                            pending: flags,
                            command_index: index,
                        });
                    }
                    for region in regions {
                        let from = state.buffer_ptr(src.as_raw(), vk::BufferUsageFlags::TRANSFER_SRC, region.src_offset, region.size)?;
                        let to = state.buffer_ptr(dst.as_raw(), vk::BufferUsageFlags::TRANSFER_DST, region.dst_offset, region.size)?;
                        // SAFETY: both ranges were bounds-checked against live allocations.
                        unsafe { std::ptr::copy(from, to, region.size as usize) };
                    }
                    *pending.entry(dst.as_raw()).or_insert_with(vk::AccessFlags::empty) |= vk::AccessFlags::TRANSFER_WRITE;
                }
                RecordedCommand::PipelineBarrier { barriers, .. } => {
                    for barrier in barriers {
                        if let Some(&flags) = pending.get(&barrier.buffer.as_raw())
                            && barrier.src_access.contains(flags)
                        {
                            pending.remove(&barrier.buffer.as_raw());
                        }
                    }
                }
            }
        }
        tracing::debug!(commands = commands.len(), "emulated submit complete");
        Ok(())
    }

    /// Writes `bytes` at the start of a buffer's bound memory, as a compute
    /// shader would.
    pub fn write_buffer(&self, buffer: vk::Buffer, bytes: &[u8]) -> Result<(), EmulationError> {
        let state = self.state();
        let ptr = state.buffer_ptr(buffer.as_raw(), vk::BufferUsageFlags::empty(), 0, bytes.len() as u64)?;
        // SAFETY: range checked by `buffer_ptr`.
        unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr, bytes.len()) };
        Ok(())
    }

    pub fn read_buffer(&self, buffer: vk::Buffer, len: u64) -> Result<Vec<u8>, EmulationError> {
        let state = self.state();
        let ptr = state.buffer_ptr(buffer.as_raw(), vk::BufferUsageFlags::empty(), 0, len)?;
        // SAFETY: range checked by `buffer_ptr`.
        Ok(unsafe { std::slice::from_raw_parts(ptr, len as usize) }.to_vec())
    }

    /// Creates a buffer bound to fresh memory of the first type carrying
    /// `flags`, for callers that hand resources to a tensor.
    pub fn create_bound_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        flags: vk::MemoryPropertyFlags,
    ) -> VkResult<(vk::Buffer, vk::DeviceMemory)> {
        let type_index = self.memory_properties.memory_types[..self.memory_properties.memory_type_count as usize]
            .iter()
            .position(|ty| ty.property_flags.contains(flags))
            .ok_or(vk::Result::ERROR_FEATURE_NOT_PRESENT)? as u32;
        let buffer = self.create_buffer(size, usage)?;
        let requirements = unsafe { self.buffer_memory_requirements(buffer) };
        let memory = self.allocate_memory(requirements.size, type_index)?;
        unsafe { self.bind_buffer_memory(buffer, memory, 0)? };
        Ok((buffer, memory))
    }

    pub fn live_buffers(&self) -> usize {
        self.state().buffers.len()
    }

    pub fn live_memories(&self) -> usize {
        self.state().memories.len()
    }

    pub fn destroyed_buffers(&self) -> usize {
        self.state().destroyed_buffers
    }

    pub fn freed_memories(&self) -> usize {
        self.state().freed_memories
    }

    pub fn is_buffer_live(&self, buffer: vk::Buffer) -> bool {
        self.state().buffers.contains_key(&buffer.as_raw())
    }

    pub fn is_memory_live(&self, memory: vk::DeviceMemory) -> bool {
        self.state().memories.contains_key(&memory.as_raw())
    }

    pub fn is_mapped(&self, memory: vk::DeviceMemory) -> bool {
        self.state().memories.get(&memory.as_raw()).is_some_and(|m| m.mapped)
    }

    /// Misuse observed so far: double frees, unknown handles, memory freed
    /// while still bound.
    pub fn violations(&self) -> Vec<String> {
        self.state().violations.clone()
    }

    pub fn hazards(&self) -> Vec<Hazard> {
        self.state().hazards.clone()
    }
}

impl GpuDevice for EmulatedDevice {
    fn memory_properties(&self) -> &vk::PhysicalDeviceMemoryProperties {
        &self.memory_properties
    }

    fn create_buffer(&self, size: vk::DeviceSize, usage: vk::BufferUsageFlags) -> VkResult<vk::Buffer> {
        let mut state = self.state();
        if size == 0 {
            state.violation("buffer created with size 0".to_string());
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        let handle = state.next_handle();
        state.buffers.insert(handle, EmulatedBuffer { size, usage, binding: None });
        Ok(vk::Buffer::from_raw(handle))
    }

    fn allocate_memory(&self, size: vk::DeviceSize, memory_type_index: u32) -> VkResult<vk::DeviceMemory> {
        let mut state = self.state();
        if memory_type_index >= self.memory_properties.memory_type_count {
            state.violation(format!("allocation from missing memory type {memory_type_index}"));
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        if let Some(remaining) = state.allocation_budget.as_mut() {
            if *remaining == 0 {
                return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
            }
            *remaining -= 1;
        }
        let handle = state.next_handle();
        state.memories.insert(
            handle,
            EmulatedMemory {
                allocation: HostAllocation::zeroed(size),
                type_index: memory_type_index,
                mapped: false,
            },
        );
        Ok(vk::DeviceMemory::from_raw(handle))
    }

    unsafe fn buffer_memory_requirements(&self, buffer: vk::Buffer) -> vk::MemoryRequirements {
        let mut state = self.state();
        let Some(size) = state.buffers.get(&buffer.as_raw()).map(|b| b.size) else {
            state.violation(format!("requirements queried for unknown buffer {:#x}", buffer.as_raw()));
            return vk::MemoryRequirements::default();
        };
        let count = self.memory_properties.memory_type_count;
        vk::MemoryRequirements {
            size: size.div_ceil(BUFFER_ALIGNMENT) * BUFFER_ALIGNMENT,
            alignment: BUFFER_ALIGNMENT,
            memory_type_bits: if count >= 32 { u32::MAX } else { (1u32 << count) - 1 },
        }
    }

    unsafe fn bind_buffer_memory(&self, buffer: vk::Buffer, memory: vk::DeviceMemory, offset: vk::DeviceSize) -> VkResult<()> {
        let mut state = self.state();
        let Some(len) = state.memories.get(&memory.as_raw()).map(|m| m.allocation.len) else {
            state.violation(format!("bind to unknown memory {:#x}", memory.as_raw()));
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        };
        let Some(entry) = state.buffers.get_mut(&buffer.as_raw()) else {
            state.violation(format!("bind of unknown buffer {:#x}", buffer.as_raw()));
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        };
        if entry.binding.is_some() {
            state.violation(format!("buffer {:#x} bound twice", buffer.as_raw()));
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT);
        }
        if offset + entry.size > len {
            return Err(vk::Result::ERROR_OUT_OF_DEVICE_MEMORY);
        }
        entry.binding = Some((memory.as_raw(), offset));
        Ok(())
    }

    unsafe fn map_memory(&self, memory: vk::DeviceMemory, offset: vk::DeviceSize, size: vk::DeviceSize) -> VkResult<*mut c_void> {
        let mut state = self.state();
        let Some(entry) = state.memories.get_mut(&memory.as_raw()) else {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        };
        let flags = self.memory_properties.memory_types[entry.type_index as usize].property_flags;
        if entry.mapped || !flags.contains(vk::MemoryPropertyFlags::HOST_VISIBLE) {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        let len = entry.allocation.len;
        let size = if size == vk::WHOLE_SIZE { len.saturating_sub(offset) } else { size };
        if offset.checked_add(size).is_none_or(|end| end > len) {
            return Err(vk::Result::ERROR_MEMORY_MAP_FAILED);
        }
        entry.mapped = true;
        // SAFETY: `offset` is within the allocation.
        Ok(unsafe { entry.allocation.as_ptr().add(offset as usize) }.cast::<c_void>())
    }

    unsafe fn unmap_memory(&self, memory: vk::DeviceMemory) {
        let mut state = self.state();
        match state.memories.get_mut(&memory.as_raw()) {
            Some(entry) if entry.mapped => entry.mapped = false,
            _ => state.violation(format!("unmap of memory {:#x} that is not mapped", memory.as_raw())),
        }
    }

    unsafe fn destroy_buffer(&self, buffer: vk::Buffer) {
        if buffer == vk::Buffer::null() {
            return;
        }
        let mut state = self.state();
        if state.buffers.remove(&buffer.as_raw()).is_some() {
            state.destroyed_buffers += 1;
        } else {
            state.violation(format!("destroy of unknown buffer {:#x}", buffer.as_raw()));
        }
    }

    unsafe fn free_memory(&self, memory: vk::DeviceMemory) {
        if memory == vk::DeviceMemory::null() {
            return;
        }
        let mut state = self.state();
        let still_bound = state
            .buffers
            .values()
            .any(|b| b.binding.is_some_and(|(bound, _)| bound == memory.as_raw()));
        if still_bound {
            state.violation(format!("memory {:#x} freed while a buffer is still bound", memory.as_raw()));
        }
        if state.memories.remove(&memory.as_raw()).is_some() {
            state.freed_memories += 1;
        } else {
            state.violation(format!("free of unknown memory {:#x}", memory.as_raw()));
        }
    }

    unsafe fn cmd_copy_buffer(&self, command_buffer: vk::CommandBuffer, src: vk::Buffer, dst: vk::Buffer, regions: &[vk::BufferCopy]) {
        let regions = regions
            .iter()
            .map(|r| CopyRegion {
                src_offset: r.src_offset,
                dst_offset: r.dst_offset,
                size: r.size,
            })
            .collect();
        self.state().record(command_buffer, RecordedCommand::CopyBuffer { src, dst, regions });
    }

    unsafe fn cmd_pipeline_barrier(
        &self,
        command_buffer: vk::CommandBuffer,
        src_stage: vk::PipelineStageFlags,
        dst_stage: vk::PipelineStageFlags,
        buffer_barriers: &[vk::BufferMemoryBarrier<'_>],
    ) {
        let barriers = buffer_barriers
            .iter()
            .map(|b| RecordedBarrier {
                buffer: b.buffer,
                src_access: b.src_access_mask,
                dst_access: b.dst_access_mask,
                src_queue_family_index: b.src_queue_family_index,
                dst_queue_family_index: b.dst_queue_family_index,
                offset: b.offset,
                size: b.size,
            })
            .collect();
        self.state().record(
            command_buffer,
            RecordedCommand::PipelineBarrier {
                src_stage,
                dst_stage,
                barriers,
            },
        );
    }
}

#[path = "emulated.test.rs"]
mod tests;
