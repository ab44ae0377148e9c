use std::{
    marker::PhantomData, ops::{Deref, DerefMut, Index, IndexMut}, sync::Arc
};

use super::{Tensor, TensorElement, TensorKind};
use crate::{error::TensorError, types::GpuDevice};

/// A [`Tensor`] whose element type is fixed at compile time.
pub struct TensorT<T: TensorElement> {
    inner: Tensor,
    _marker: PhantomData<T>,
}

impl<T: TensorElement> TensorT<T> {
    pub fn new(device: Arc<dyn GpuDevice>, data: &[T], kind: TensorKind) -> Result<Self, TensorError> {
        let size = u32::try_from(data.len()).map_err(|_| TensorError::SizeOverflow {
            elements: u32::MAX,
            element_size: T::DTYPE.size_bytes(),
        })?;
        let inner = Tensor::new(device, bytemuck::cast_slice(data), size, T::DTYPE.size_bytes(), T::DTYPE, kind)?;
        Ok(Self { inner, _marker: PhantomData })
    }

    /// Wraps an untyped tensor whose dtype matches `T`.
    pub fn from_tensor(inner: Tensor) -> Result<Self, TensorError> {
        if inner.data_type() != T::DTYPE {
            return Err(TensorError::DtypeMismatch {
                expected: inner.data_type(),
                actual: T::DTYPE,
            });
        }
        Ok(Self { inner, _marker: PhantomData })
    }

    pub fn into_inner(self) -> Tensor {
        self.inner
    }

    pub fn data(&self) -> Result<&[T], TensorError> {
        self.inner.data::<T>()
    }

    pub fn data_mut(&mut self) -> Result<&mut [T], TensorError> {
        self.inner.data_mut::<T>()
    }

    pub fn vector(&self) -> Result<Vec<T>, TensorError> {
        self.inner.vector::<T>()
    }

    pub fn set_data(&mut self, data: &[T]) -> Result<(), TensorError> {
        self.inner.set_data(data)
    }

    pub fn rebuild(&mut self, data: &[T]) -> Result<(), TensorError> {
        let size = u32::try_from(data.len()).map_err(|_| TensorError::SizeOverflow {
            elements: u32::MAX,
            element_size: T::DTYPE.size_bytes(),
        })?;
        self.inner.rebuild(bytemuck::cast_slice(data), size, T::DTYPE.size_bytes())
    }
}

impl<T: TensorElement> Deref for TensorT<T> {
    type Target = Tensor;

    fn deref(&self) -> &Tensor {
        &self.inner
    }
}

impl<T: TensorElement> DerefMut for TensorT<T> {
    fn deref_mut(&mut self) -> &mut Tensor {
        &mut self.inner
    }
}

impl<T: TensorElement> Index<usize> for TensorT<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.data() {
            Ok(data) => &data[index],
            Err(e) => panic!("Tensor access violation: {}", e),
        }
    }
}

impl<T: TensorElement> IndexMut<usize> for TensorT<T> {
    fn index_mut(&mut self, index: usize) -> &mut T {
        match self.data_mut() {
            Ok(data) => &mut data[index],
            Err(e) => panic!("Tensor access violation: {}", e),
        }
    }
}

impl<T: TensorElement> std::fmt::Debug for TensorT<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TensorT").field(&self.inner).finish()
    }
}
