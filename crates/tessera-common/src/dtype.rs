//! Element data types accepted by the vector operator library.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Returned when a string names no known [`DType`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown dtype: {0}")]
pub struct ParseDTypeError(pub String);

/// Element data type of every tensor in a planning request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    F16,
    BF16,
    F32,
    F64,
    I8,
    I16,
    I32,
    I64,
    U8,
    Bool,
}

impl DType {
    /// Every supported data type, in declaration order.
    pub const ALL: [DType; 10] = [
        Self::F16,
        Self::BF16,
        Self::F32,
        Self::F64,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::U8,
        Self::Bool,
    ];

    /// Size of a single element in bytes.
    #[must_use]
    pub const fn size_bytes(self) -> u32 {
        match self {
            Self::I8 | Self::U8 | Self::Bool => 1,
            Self::F16 | Self::BF16 | Self::I16 => 2,
            Self::F32 | Self::I32 => 4,
            Self::F64 | Self::I64 => 8,
        }
    }

    /// Kernel variant selector written into the launch descriptor.
    ///
    /// Types without a dedicated kernel variant report `0`.
    #[must_use]
    pub const fn tiling_key(self) -> u32 {
        match self {
            Self::F16 => 1,
            Self::F32 => 2,
            Self::I32 => 3,
            Self::BF16 => 4,
            Self::I8 => 7,
            Self::I64 => 10,
            Self::F64 => 11,
            Self::Bool => 12,
            Self::I16 | Self::U8 => 0,
        }
    }

    /// Half-width floating point types that kernels up-cast to f32.
    #[must_use]
    pub const fn is_half_float(self) -> bool {
        matches!(self, Self::F16 | Self::BF16)
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::F16 => "f16",
            Self::BF16 => "bf16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::U8 => "u8",
            Self::Bool => "bool",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for DType {
    type Err = ParseDTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "f16" | "half" | "float16" => Ok(Self::F16),
            "bf16" | "bfloat16" => Ok(Self::BF16),
            "f32" | "float" | "float32" => Ok(Self::F32),
            "f64" | "double" | "float64" => Ok(Self::F64),
            "i8" | "int8" => Ok(Self::I8),
            "i16" | "int16" => Ok(Self::I16),
            "i32" | "int32" => Ok(Self::I32),
            "i64" | "int64" => Ok(Self::I64),
            "u8" | "uint8" => Ok(Self::U8),
            "bool" => Ok(Self::Bool),
            _ => Err(ParseDTypeError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_match_element_widths() {
        assert_eq!(DType::F32.size_bytes(), 4);
        assert_eq!(DType::BF16.size_bytes(), 2);
        assert_eq!(DType::Bool.size_bytes(), 1);
        assert_eq!(DType::I64.size_bytes(), 8);
    }

    #[test]
    fn every_size_divides_a_32_byte_block() {
        for dtype in DType::ALL {
            assert_eq!(32 % dtype.size_bytes(), 0, "{dtype}");
        }
    }

    #[test]
    fn tiling_keys_are_stable() {
        assert_eq!(DType::F16.tiling_key(), 1);
        assert_eq!(DType::F32.tiling_key(), 2);
        assert_eq!(DType::I32.tiling_key(), 3);
        assert_eq!(DType::BF16.tiling_key(), 4);
        assert_eq!(DType::U8.tiling_key(), 0);
    }

    #[test]
    fn display_parse_roundtrip() {
        for dtype in DType::ALL {
            let parsed: DType = dtype.to_string().parse().unwrap();
            assert_eq!(parsed, dtype);
        }
    }

    #[test]
    fn parse_accepts_aliases_case_insensitively() {
        assert_eq!("Float".parse::<DType>().unwrap(), DType::F32);
        assert_eq!("BFLOAT16".parse::<DType>().unwrap(), DType::BF16);
        let err = "complex64".parse::<DType>().unwrap_err();
        assert_eq!(err, ParseDTypeError("complex64".into()));
        assert_eq!(err.to_string(), "unknown dtype: complex64");
    }
}
