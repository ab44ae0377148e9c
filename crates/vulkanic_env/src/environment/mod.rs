//! Process environment abstractions shared across the vulkanic crates.

pub mod guard;
pub mod instrument;
pub mod tensor;
pub mod value;

use std::sync::{Mutex, MutexGuard, OnceLock};

use instrument::InstrumentEnvVar;
use tensor::TensorEnvVar;

/// Namespaced environment variable identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EnvVar {
    /// Variables consumed by the logging and metrics pipeline.
    Instrument(InstrumentEnvVar),
    /// Variables consumed by the tensor core.
    Tensor(TensorEnvVar),
}

impl From<InstrumentEnvVar> for EnvVar {
    fn from(value: InstrumentEnvVar) -> Self {
        Self::Instrument(value)
    }
}

impl From<TensorEnvVar> for EnvVar {
    fn from(value: TensorEnvVar) -> Self {
        Self::Tensor(value)
    }
}

impl EnvVar {
    /// Retrieve the canonical environment variable key for the identifier.
    pub const fn key(self) -> &'static str {
        match self {
            EnvVar::Instrument(inner) => inner.key(),
            EnvVar::Tensor(inner) => inner.key(),
        }
    }
}

/// Process environment facade that centralises access and synchronisation.
pub struct Environment;

impl Environment {
    /// Acquire the global environment mutex, ensuring serialised mutations.
    pub fn lock() -> MutexGuard<'static, ()> {
        static ENV_MUTEX: OnceLock<Mutex<()>> = OnceLock::new();
        // A poisoned lock only means a test panicked mid-mutation; the unit
        // payload carries no state worth discarding.
        ENV_MUTEX
            .get_or_init(|| Mutex::new(()))
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Read the environment variable as a UTF-8 string if present.
    pub fn get(var: impl Into<EnvVar>) -> Option<String> {
        let var = var.into();
        std::env::var(var.key()).ok()
    }

    /// Set the environment variable using the provided UTF-8 value.
    ///
    /// Acquires the global environment mutex internally. Prefer
    /// [`Environment::lock`] when batching several operations so they share a
    /// single critical section.
    pub fn set(var: impl Into<EnvVar>, value: &str) {
        let var = var.into();
        let mut guard = Self::lock();
        Self::set_locked(var, value, &mut guard);
    }

    /// Remove the environment variable from the process environment.
    pub fn remove(var: impl Into<EnvVar>) {
        let var = var.into();
        let mut guard = Self::lock();
        Self::remove_locked(var, &mut guard);
    }

    pub(crate) fn set_locked(var: EnvVar, value: &str, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: The guard parameter proves the caller holds the global
        // environment mutex, preventing concurrent mutation.
        unsafe { std::env::set_var(var.key(), value) };
    }

    pub(crate) fn remove_locked(var: EnvVar, _guard: &mut MutexGuard<'static, ()>) {
        // SAFETY: Serialisation is enforced by the guard parameter.
        unsafe { std::env::remove_var(var.key()) };
    }
}
