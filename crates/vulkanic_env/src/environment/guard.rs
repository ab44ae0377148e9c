//! Scoped overrides of raw environment variables.

use super::{EnvVar, Environment};

/// Overrides one or more variables and puts every one back when dropped.
///
/// Restoration runs in reverse order under a single lock, so stacking two
/// overrides of the same variable in one guard still restores the value seen
/// before the first.
pub struct EnvVarGuard {
    saved: Vec<(EnvVar, Option<String>)>,
}

impl EnvVarGuard {
    pub fn set(var: impl Into<EnvVar>, value: &str) -> Self {
        Self { saved: Vec::new() }.and_set(var, value)
    }

    pub fn unset(var: impl Into<EnvVar>) -> Self {
        Self { saved: Vec::new() }.and_unset(var)
    }

    /// Adds another override to this guard.
    pub fn and_set(self, var: impl Into<EnvVar>, value: &str) -> Self {
        self.apply(var.into(), Some(value))
    }

    /// Adds a removal to this guard.
    pub fn and_unset(self, var: impl Into<EnvVar>) -> Self {
        self.apply(var.into(), None)
    }

    fn apply(mut self, var: EnvVar, value: Option<&str>) -> Self {
        let mut lock = Environment::lock();
        self.saved.push((var, Environment::get(var)));
        match value {
            Some(value) => Environment::set_locked(var, value, &mut lock),
            None => Environment::remove_locked(var, &mut lock),
        }
        self
    }
}

impl Drop for EnvVarGuard {
    fn drop(&mut self) {
        let mut lock = Environment::lock();
        for (var, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(previous) => Environment::set_locked(var, &previous, &mut lock),
                None => Environment::remove_locked(var, &mut lock),
            }
        }
    }
}
