use std::{fmt::Display, str::FromStr};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Element kinds a tensor can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Dtype {
    Bool,
    Int,
    UnsignedInt,
    Float,
    Double,
}

impl Dtype {
    pub const ALL: [Dtype; 5] = [Dtype::Bool, Dtype::Int, Dtype::UnsignedInt, Dtype::Float, Dtype::Double];

    /// Byte width of a single element.
    pub const fn size_bytes(&self) -> u32 {
        match self {
            Dtype::Bool => 1,
            Dtype::Int | Dtype::UnsignedInt | Dtype::Float => 4,
            Dtype::Double => 8,
        }
    }
}

impl Display for Dtype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Dtype::Bool => "Bool",
            Dtype::Int => "Int",
            Dtype::UnsignedInt => "UnsignedInt",
            Dtype::Float => "Float",
            Dtype::Double => "Double",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Dtype {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BOOL" => Ok(Dtype::Bool),
            "INT" | "I32" => Ok(Dtype::Int),
            "UNSIGNEDINT" | "U32" => Ok(Dtype::UnsignedInt),
            "FLOAT" | "F32" => Ok(Dtype::Float),
            "DOUBLE" | "F64" => Ok(Dtype::Double),
            _ => Err(format!("Unknown Dtype: {}", s)),
        }
    }
}

/// Host scalar types that can view tensor memory.
pub trait TensorElement: Pod + std::fmt::Debug + PartialEq + 'static {
    const DTYPE: Dtype;
}

/// One-byte boolean as laid out in shader storage buffers.
///
/// Any byte value is valid; non-zero reads as `true`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(pub u8);

impl Bool {
    pub const TRUE: Bool = Bool(1);
    pub const FALSE: Bool = Bool(0);

    pub fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    fn from(value: bool) -> Self {
        Bool(value as u8)
    }
}

impl From<Bool> for bool {
    fn from(value: Bool) -> Self {
        value.get()
    }
}

impl TensorElement for Bool {
    const DTYPE: Dtype = Dtype::Bool;
}

impl TensorElement for i32 {
    const DTYPE: Dtype = Dtype::Int;
}

impl TensorElement for u32 {
    const DTYPE: Dtype = Dtype::UnsignedInt;
}

impl TensorElement for f32 {
    const DTYPE: Dtype = Dtype::Float;
}

impl TensorElement for f64 {
    const DTYPE: Dtype = Dtype::Double;
}

#[path = "dtypes.test.rs"]
mod tests;
