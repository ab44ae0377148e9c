//! Tensor-core environment variable identifiers and descriptors.

use super::value::{TypedEnvVar, format_bool, parse_bool};
use super::{EnvVar, Environment};

/// Environment variables read by the tensor core.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TensorEnvVar {
    /// Emit a trace event for every recorded copy and barrier.
    TraceCommands,
}

impl TensorEnvVar {
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            TensorEnvVar::TraceCommands => "VULKANIC_TRACE_COMMANDS",
        }
    }

    pub const fn into_env(self) -> EnvVar {
        EnvVar::Tensor(self)
    }
}

#[must_use]
pub fn is_set(var: TensorEnvVar) -> bool {
    Environment::get(var).is_some()
}

/// Typed descriptor for VULKANIC_TRACE_COMMANDS.
pub const TRACE_COMMANDS: TypedEnvVar<bool> = TypedEnvVar::new(TensorEnvVar::TraceCommands.into_env(), parse_bool, format_bool);
