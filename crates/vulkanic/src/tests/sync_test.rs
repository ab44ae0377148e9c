use std::sync::Arc;

use ash::vk;

use crate::{BarrierScope, Dtype, EmulatedDevice, ExternalResource, RecordedBarrier, RecordedCommand, Tensor, TensorError, TensorKind, TensorT};

fn barrier(command: &RecordedCommand) -> (vk::PipelineStageFlags, vk::PipelineStageFlags, RecordedBarrier) {
    match command {
        RecordedCommand::PipelineBarrier {
            src_stage,
            dst_stage,
            barriers,
        } => {
            assert_eq!(barriers.len(), 1);
            (*src_stage, *dst_stage, barriers[0])
        }
        other => panic!("expected a barrier, got {other:?}"),
    }
}

fn copy(command: &RecordedCommand) -> (vk::Buffer, vk::Buffer, u64) {
    match command {
        RecordedCommand::CopyBuffer { src, dst, regions } => {
            assert_eq!(regions.len(), 1);
            assert_eq!((regions[0].src_offset, regions[0].dst_offset), (0, 0));
            (*src, *dst, regions[0].size)
        }
        other => panic!("expected a copy, got {other:?}"),
    }
}

#[test]
fn staging_to_device_copies_then_barriers_for_shader_reads() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1.0f32, 2.0, 3.0, 4.0], TensorKind::Device).unwrap();
    let primary = tensor.descriptor_buffer_info().unwrap().buffer;
    let cmd = device.allocate_command_buffer();

    tensor.record_copy_from_staging_to_device(cmd).unwrap();
    let commands = device.recorded(cmd);
    assert_eq!(commands.len(), 2);

    let (src, dst, size) = copy(&commands[0]);
    assert_ne!(src, primary);
    assert_eq!(dst, primary);
    assert_eq!(size, 16);

    let (src_stage, dst_stage, b) = barrier(&commands[1]);
    assert_eq!(b.buffer, primary);
    assert_eq!(b.src_access, vk::AccessFlags::TRANSFER_WRITE);
    assert_eq!(b.dst_access, vk::AccessFlags::SHADER_READ);
    assert_eq!(src_stage, vk::PipelineStageFlags::TRANSFER);
    assert_eq!(dst_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
    assert_eq!((b.src_queue_family_index, b.dst_queue_family_index), (vk::QUEUE_FAMILY_IGNORED, vk::QUEUE_FAMILY_IGNORED));
    assert_eq!((b.offset, b.size), (0, 16));
}

#[test]
fn device_to_staging_barriers_then_copies() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[7u32, 8], TensorKind::Device).unwrap();
    let primary = tensor.descriptor_buffer_info().unwrap().buffer;
    let cmd = device.allocate_command_buffer();

    tensor.record_copy_from_device_to_staging(cmd).unwrap();
    let commands = device.recorded(cmd);
    assert_eq!(commands.len(), 2);

    let (src_stage, dst_stage, b) = barrier(&commands[0]);
    assert_eq!(b.buffer, primary);
    assert_eq!(b.src_access, vk::AccessFlags::SHADER_WRITE);
    assert_eq!(b.dst_access, vk::AccessFlags::TRANSFER_READ);
    assert_eq!(src_stage, vk::PipelineStageFlags::COMPUTE_SHADER);
    assert_eq!(dst_stage, vk::PipelineStageFlags::TRANSFER);

    let (src, dst, size) = copy(&commands[1]);
    assert_eq!(src, primary);
    assert_ne!(dst, primary);
    assert_eq!(size, 8);
}

#[test]
fn custom_scopes_replace_defaults() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1i32], TensorKind::Device).unwrap();
    let cmd = device.allocate_command_buffer();
    let vertex = BarrierScope::new(vk::AccessFlags::UNIFORM_READ, vk::PipelineStageFlags::VERTEX_SHADER);

    tensor.record_copy_from_staging_to_device_with(cmd, vertex).unwrap();
    tensor.record_copy_from_device_to_staging_with(cmd, BarrierScope::TRANSFER_WRITE).unwrap();
    let commands = device.recorded(cmd);
    assert_eq!(commands.len(), 4);

    let (_, dst_stage, b) = barrier(&commands[1]);
    assert_eq!((b.dst_access, dst_stage), (vk::AccessFlags::UNIFORM_READ, vk::PipelineStageFlags::VERTEX_SHADER));
    let (src_stage, _, b) = barrier(&commands[2]);
    assert_eq!((b.src_access, src_stage), (vk::AccessFlags::TRANSFER_WRITE, vk::PipelineStageFlags::TRANSFER));
}

#[test]
fn round_trip_through_device_memory() {
    let device = Arc::new(EmulatedDevice::new());
    let mut tensor = TensorT::new(device.clone(), &[1.0f32, 2.0, 3.0, 4.0], TensorKind::Device).unwrap();
    let primary = tensor.descriptor_buffer_info().unwrap().buffer;

    let upload = device.allocate_command_buffer();
    tensor.record_copy_from_staging_to_device(upload).unwrap();
    device.submit(upload).unwrap();
    assert_eq!(device.read_buffer(primary, 16).unwrap(), bytemuck::cast_slice::<f32, u8>(&[1.0, 2.0, 3.0, 4.0]));

    tensor.set_data(&[0.0; 4]).unwrap();
    let download = device.allocate_command_buffer();
    tensor.record_copy_from_device_to_staging(download).unwrap();
    device.submit(download).unwrap();

    assert_eq!(tensor.vector().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
    assert!(device.hazards().is_empty(), "{:?}", device.hazards());
}

#[test]
fn download_observes_gpu_writes() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[0i32; 3], TensorKind::Device).unwrap();
    let primary = tensor.descriptor_buffer_info().unwrap().buffer;
    device.write_buffer(primary, bytemuck::cast_slice(&[5i32, 6, 7])).unwrap();
    assert_eq!(tensor.vector().unwrap(), vec![0, 0, 0]);

    let cmd = device.allocate_command_buffer();
    tensor.record_copy_from_device_to_staging(cmd).unwrap();
    device.submit(cmd).unwrap();
    assert_eq!(tensor.vector().unwrap(), vec![5, 6, 7]);
}

#[test]
fn staging_operations_require_device_kind() {
    let device = Arc::new(EmulatedDevice::new());
    let cmd = device.allocate_command_buffer();
    for kind in [TensorKind::Host, TensorKind::Storage] {
        let tensor = TensorT::new(device.clone(), &[1.0f32], kind).unwrap();
        assert!(matches!(
            tensor.record_copy_from_staging_to_device(cmd),
            Err(TensorError::UnsupportedForKind { kind: k, .. }) if k == kind
        ));
        assert!(matches!(
            tensor.record_copy_from_device_to_staging(cmd),
            Err(TensorError::UnsupportedForKind { .. })
        ));
        assert!(matches!(
            tensor.record_staging_buffer_memory_barrier(
                cmd,
                vk::AccessFlags::HOST_WRITE,
                vk::AccessFlags::TRANSFER_READ,
                vk::PipelineStageFlags::HOST,
                vk::PipelineStageFlags::TRANSFER,
            ),
            Err(TensorError::UnsupportedForKind { .. })
        ));
    }
    assert!(device.recorded(cmd).is_empty());
}

#[test]
fn copy_from_uses_smaller_tensor_size() {
    let device = Arc::new(EmulatedDevice::new());
    let large = TensorT::new(device.clone(), &[1.0f32, 2.0, 3.0, 4.0], TensorKind::Host).unwrap();
    let small = TensorT::new(device.clone(), &[0.0f32, 0.0], TensorKind::Host).unwrap();
    let cmd = device.allocate_command_buffer();

    small.record_copy_from(cmd, &large).unwrap();
    let (src, dst, size) = copy(&device.recorded(cmd)[0]);
    assert_eq!(size, 8);
    assert_eq!(src, large.descriptor_buffer_info().unwrap().buffer);
    assert_eq!(dst, small.descriptor_buffer_info().unwrap().buffer);

    device.submit(cmd).unwrap();
    assert_eq!(small.vector().unwrap(), vec![1.0, 2.0]);
    assert_eq!(large.vector().unwrap(), vec![1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn copy_from_storage_tensor_is_rejected() {
    let device = Arc::new(EmulatedDevice::new());
    let storage = TensorT::new(device.clone(), &[1u32], TensorKind::Storage).unwrap();
    let host = TensorT::new(device.clone(), &[0u32], TensorKind::Host).unwrap();
    let cmd = device.allocate_command_buffer();

    let err = host.record_copy_from(cmd, &storage).unwrap_err();
    assert!(matches!(err, TensorError::MissingTransferUsage { required } if required == vk::BufferUsageFlags::TRANSFER_SRC));
    let err = storage.record_copy_from(cmd, &host).unwrap_err();
    assert!(matches!(err, TensorError::MissingTransferUsage { required } if required == vk::BufferUsageFlags::TRANSFER_DST));
    assert!(device.recorded(cmd).is_empty());
}

#[test]
fn copy_into_itself_is_rejected() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1.0f32, 2.0], TensorKind::Host).unwrap();
    let cmd = device.allocate_command_buffer();

    let err = tensor.record_copy_from(cmd, &tensor).unwrap_err();
    let buffer = tensor.descriptor_buffer_info().unwrap().buffer;
    assert!(matches!(err, TensorError::OverlappingCopy { buffer: b } if b == buffer));
    assert!(!err.is_capability_error());
    assert!(device.recorded(cmd).is_empty());
}

#[test]
fn copy_between_tensors_sharing_a_buffer_is_rejected() {
    let device = Arc::new(EmulatedDevice::new());
    let (buffer, memory) = device
        .create_bound_buffer(
            8,
            vk::BufferUsageFlags::STORAGE_BUFFER | vk::BufferUsageFlags::TRANSFER_SRC | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )
        .unwrap();
    let shared = |device: &Arc<EmulatedDevice>| {
        Tensor::builder(device.clone(), Dtype::Float, TensorKind::Device)
            .elements(2)
            .borrowed_primary(ExternalResource { buffer, memory })
            .build()
            .unwrap()
    };
    let first = shared(&device);
    let second = shared(&device);
    let cmd = device.allocate_command_buffer();

    assert!(matches!(
        second.record_copy_from(cmd, &first),
        Err(TensorError::OverlappingCopy { buffer: b }) if b == buffer
    ));
    assert!(device.recorded(cmd).is_empty());
}

#[test]
fn primary_barrier_records_caller_flags() {
    let device = Arc::new(EmulatedDevice::new());
    let tensor = TensorT::new(device.clone(), &[1.0f64, 2.0], TensorKind::Storage).unwrap();
    let cmd = device.allocate_command_buffer();

    tensor
        .record_primary_buffer_memory_barrier(
            cmd,
            vk::AccessFlags::SHADER_WRITE,
            vk::AccessFlags::SHADER_READ,
            vk::PipelineStageFlags::COMPUTE_SHADER,
            vk::PipelineStageFlags::COMPUTE_SHADER,
        )
        .unwrap();
    let (src_stage, dst_stage, b) = barrier(&device.recorded(cmd)[0]);
    assert_eq!(b.buffer, tensor.descriptor_buffer_info().unwrap().buffer);
    assert_eq!((b.src_access, b.dst_access), (vk::AccessFlags::SHADER_WRITE, vk::AccessFlags::SHADER_READ));
    assert_eq!((src_stage, dst_stage), (vk::PipelineStageFlags::COMPUTE_SHADER, vk::PipelineStageFlags::COMPUTE_SHADER));
    assert_eq!(b.size, 16);
}

#[test]
fn destroyed_tensor_records_nothing() {
    let device = Arc::new(EmulatedDevice::new());
    let mut tensor = TensorT::new(device.clone(), &[1.0f32], TensorKind::Device).unwrap();
    tensor.destroy();
    let cmd = device.allocate_command_buffer();

    assert!(matches!(tensor.record_copy_from_staging_to_device(cmd), Err(TensorError::NotInitialized)));
    assert!(device.recorded(cmd).is_empty());
}
