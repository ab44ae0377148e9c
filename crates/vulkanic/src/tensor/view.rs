use std::ffi::c_void;

use super::{Tensor, TensorElement};
use crate::error::TensorError;

/// Typed access to the mapped host-visible memory.
///
/// For [`TensorKind::Device`](super::TensorKind::Device) tensors this is the
/// staging buffer: writes only reach the GPU after a recorded
/// staging-to-device copy, and GPU results only show up after a
/// device-to-staging copy has completed.
impl Tensor {
    fn host_bytes(&self, operation: &'static str) -> Result<&[u8], TensorError> {
        if !self.kind.is_host_accessible() {
            return Err(TensorError::UnsupportedForKind { operation, kind: self.kind });
        }
        let mapped = self.mapped.ok_or(TensorError::NotInitialized)?;
        // SAFETY: the mapping covers `memory_size` bytes and lives until
        // `destroy`, which needs `&mut self`.
        Ok(unsafe { std::slice::from_raw_parts(mapped.as_ptr(), self.memory_size() as usize) })
    }

    fn host_bytes_mut(&mut self, operation: &'static str) -> Result<&mut [u8], TensorError> {
        if !self.kind.is_host_accessible() {
            return Err(TensorError::UnsupportedForKind { operation, kind: self.kind });
        }
        let mapped = self.mapped.ok_or(TensorError::NotInitialized)?;
        // SAFETY: as in `host_bytes`; `&mut self` makes the view exclusive.
        Ok(unsafe { std::slice::from_raw_parts_mut(mapped.as_ptr(), self.memory_size() as usize) })
    }

    fn check_dtype<T: TensorElement>(&self) -> Result<(), TensorError> {
        if T::DTYPE != self.dtype {
            return Err(TensorError::DtypeMismatch {
                expected: self.dtype,
                actual: T::DTYPE,
            });
        }
        Ok(())
    }

    pub fn data<T: TensorElement>(&self) -> Result<&[T], TensorError> {
        let bytes = self.host_bytes("data")?;
        self.check_dtype::<T>()?;
        bytemuck::try_cast_slice(bytes).map_err(|reason| TensorError::MisalignedView { dtype: self.dtype, reason })
    }

    pub fn data_mut<T: TensorElement>(&mut self) -> Result<&mut [T], TensorError> {
        self.check_dtype::<T>()?;
        let dtype = self.dtype;
        let bytes = self.host_bytes_mut("data_mut")?;
        bytemuck::try_cast_slice_mut(bytes).map_err(|reason| TensorError::MisalignedView { dtype, reason })
    }

    pub fn vector<T: TensorElement>(&self) -> Result<Vec<T>, TensorError> {
        Ok(self.data::<T>()?.to_vec())
    }

    /// Overwrites every element. Nothing is written unless `data` holds
    /// exactly `size()` elements.
    pub fn set_data<T: TensorElement>(&mut self, data: &[T]) -> Result<(), TensorError> {
        self.check_dtype::<T>()?;
        let expected = self.size as usize;
        let target = self.host_bytes_mut("set_data")?;
        if data.len() != expected {
            return Err(TensorError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }
        target.copy_from_slice(bytemuck::cast_slice(data));
        Ok(())
    }

    /// Start of the mapped region, or null for storage and destroyed tensors.
    pub fn raw_data(&self) -> *mut c_void {
        self.mapped.map_or(std::ptr::null_mut(), |mapped| mapped.as_ptr().cast::<c_void>())
    }

    pub fn set_raw_data(&mut self, bytes: &[u8]) -> Result<(), TensorError> {
        let expected = self.memory_size() as usize;
        let target = self.host_bytes_mut("set_raw_data")?;
        if bytes.len() != expected {
            return Err(TensorError::DimensionMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        target.copy_from_slice(bytes);
        Ok(())
    }
}
