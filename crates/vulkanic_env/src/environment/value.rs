//! Typed environment variable descriptors and guard helpers.
//!
//! [`TypedEnvVar`] wraps an [`EnvVar`] with caller-supplied parse and format
//! callbacks, and hands out scoped guards that restore the previous process
//! environment state when dropped.
//!
//! # Examples
//!
//! ```
//! use vulkanic_env::LOG_LEVEL;
//! use tracing::Level;
//!
//! let guard = LOG_LEVEL.set_guard(Level::DEBUG).expect("set log level");
//! assert_eq!(*guard, Level::DEBUG);
//! ```

use std::{marker::PhantomData, ops::Deref};

use super::{EnvVar, Environment, guard::EnvVarGuard};

/// Errors emitted when interacting with typed environment variables.
#[derive(Debug, thiserror::Error)]
pub enum EnvVarError {
    /// The environment value could not be parsed into the desired type.
    #[error("failed to parse environment variable {name} from '{value}': {source}")]
    Parse {
        name: &'static str,
        value: String,
        source: EnvVarParseError,
    },
    /// The provided value could not be formatted for storage.
    #[error("failed to format environment variable {name}: {source}")]
    Format { name: &'static str, source: EnvVarFormatError },
}

/// Error produced by a [`TypedEnvVar`] parsing callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EnvVarParseError {
    message: String,
}

impl EnvVarParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Error produced by a [`TypedEnvVar`] formatting callback.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct EnvVarFormatError {
    message: String,
}

impl EnvVarFormatError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// Callback used to parse an environment string into a concrete value.
pub type ParseFn<T> = fn(&str) -> Result<T, EnvVarParseError>;
/// Callback used to format a typed value before storing it in the environment.
pub type FormatFn<T> = fn(&T) -> Result<String, EnvVarFormatError>;

/// Descriptor for a strongly-typed environment variable.
#[derive(Clone, Copy)]
pub struct TypedEnvVar<T> {
    var: EnvVar,
    parse: ParseFn<T>,
    format: FormatFn<T>,
    _marker: PhantomData<T>,
}

impl<T> TypedEnvVar<T> {
    fn format_value(&self, value: &T) -> Result<String, EnvVarError> {
        (self.format)(value).map_err(|source| EnvVarError::Format { name: self.key(), source })
    }

    /// Create a new typed descriptor using the provided callbacks.
    pub const fn new(var: EnvVar, parse: ParseFn<T>, format: FormatFn<T>) -> Self {
        Self {
            var,
            parse,
            format,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn key(&self) -> &'static str {
        self.var.key()
    }

    #[must_use]
    pub const fn var(&self) -> EnvVar {
        self.var
    }

    /// Read the environment variable and parse it into the typed value.
    pub fn get(&self) -> Result<Option<T>, EnvVarError> {
        match Environment::get(self.var) {
            Some(raw) => (self.parse)(&raw).map(Some).map_err(|source| EnvVarError::Parse {
                name: self.key(),
                value: raw,
                source,
            }),
            None => Ok(None),
        }
    }

    /// Set the environment variable to the provided typed value.
    pub fn set(&self, value: T) -> Result<(), EnvVarError> {
        let formatted = self.format_value(&value)?;
        Environment::set(self.var, &formatted);
        Ok(())
    }

    /// Remove the environment variable from the process environment.
    pub fn unset(&self) {
        Environment::remove(self.var);
    }

    /// Set the environment variable for the lifetime of the returned guard.
    pub fn set_guard(&self, value: T) -> Result<TypedEnvVarGuard<'_, T>, EnvVarError> {
        let formatted = self.format_value(&value)?;
        let mut lock = Environment::lock();
        let previous = Environment::get(self.var);
        Environment::set_locked(self.var, &formatted, &mut lock);
        Ok(TypedEnvVarGuard {
            var: self.var,
            previous,
            value,
            _marker: PhantomData,
        })
    }

    /// Unset the environment variable for the lifetime of the guard.
    #[must_use]
    pub fn unset_guard(&self) -> EnvVarGuard {
        EnvVarGuard::unset(self.var)
    }
}

/// Guard that restores the previous state of a typed environment variable.
pub struct TypedEnvVarGuard<'a, T> {
    var: EnvVar,
    previous: Option<String>,
    value: T,
    _marker: PhantomData<&'a TypedEnvVar<T>>,
}

impl<T> Deref for TypedEnvVarGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<T> Drop for TypedEnvVarGuard<'_, T> {
    fn drop(&mut self) {
        let mut lock = Environment::lock();
        match &self.previous {
            Some(previous) => Environment::set_locked(self.var, previous, &mut lock),
            None => Environment::remove_locked(self.var, &mut lock),
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, EnvVarParseError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(EnvVarParseError::new("value is not a recognised boolean")),
    }
}

pub(crate) fn format_bool(value: &bool) -> Result<String, EnvVarFormatError> {
    Ok(value.to_string())
}
