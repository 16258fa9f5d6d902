//! Scratch profiles of the elementwise multi-tensor operator families.
//!
//! Each family keeps a fixed number of same-sized queues live per core.
//! Half-width and some integer inputs are up-cast to f32 inside the kernel,
//! which multiplies the per-element footprint by [`CAST_SCRATCH_FACTOR`] and
//! aligns chunks to [`CAST_CHUNK_ALIGN_BYTES`].

use crate::budget::{BufferProfile, RegionSizing};
use serde::{Deserialize, Serialize};
use std::fmt;
use tessera_common::DType;
use thiserror::Error;

/// Footprint multiplier applied when a kernel casts its inputs through f32.
pub const CAST_SCRATCH_FACTOR: u32 = 10;

/// Chunk alignment for cast paths.
pub const CAST_CHUNK_ALIGN_BYTES: u32 = 64;

/// Bytes processed by one vector repeat.
pub const BYTES_PER_REPEAT: u32 = 256;

const SCALAR_SLOT_BYTES: u64 = 32;
const LERP_SCALAR_RESERVE_BYTES: u64 = 128;
const SIGN_TABLE_REPEATS: u64 = 3 * 1024 * 8;

/// Returned when a string names no known [`OpFamily`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operator family: {0}")]
pub struct ParseOpFamilyError(pub String);

/// Operator families sharing a scratch layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpFamily {
    /// One input queue and one output queue, double buffered.
    Unary,
    /// Unary with a broadcast scalar operand.
    UnaryScalar,
    BinaryList,
    PointwiseScalar,
    PointwiseList,
    LerpScalar,
    LerpList,
    /// Single in-place queue.
    Copy,
    /// Sign keeps a lookup table for float inputs.
    Sign,
    /// Rounding with a reduction temporary.
    RoundOffNumber,
}

impl OpFamily {
    pub const ALL: [OpFamily; 10] = [
        Self::Unary,
        Self::UnaryScalar,
        Self::BinaryList,
        Self::PointwiseScalar,
        Self::PointwiseList,
        Self::LerpScalar,
        Self::LerpList,
        Self::Copy,
        Self::Sign,
        Self::RoundOffNumber,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Unary => "unary",
            Self::UnaryScalar => "unary_scalar",
            Self::BinaryList => "binary_list",
            Self::PointwiseScalar => "pointwise_scalar",
            Self::PointwiseList => "pointwise_list",
            Self::LerpScalar => "lerp_scalar",
            Self::LerpList => "lerp_list",
            Self::Copy => "copy",
            Self::Sign => "sign",
            Self::RoundOffNumber => "round_off_number",
        }
    }

    /// Same-sized primary regions per core.
    #[must_use]
    pub const fn multiplicity(self) -> u32 {
        match self {
            Self::Copy => 1,
            Self::Unary | Self::RoundOffNumber => 2,
            Self::UnaryScalar | Self::Sign => 4,
            Self::BinaryList | Self::LerpScalar => 6,
            Self::PointwiseScalar | Self::PointwiseList => 8,
            Self::LerpList => 11,
        }
    }

    /// Whether the family's kernels up-cast `dtype` through f32.
    #[must_use]
    pub const fn casts(self, dtype: DType) -> bool {
        match self {
            Self::PointwiseScalar
            | Self::UnaryScalar
            | Self::LerpScalar
            | Self::LerpList
            | Self::RoundOffNumber => dtype.is_half_float(),
            Self::Sign => matches!(dtype, DType::BF16 | DType::I64 | DType::I8),
            _ => matches!(dtype, DType::BF16),
        }
    }

    /// Scratch profile of the family for `dtype`.
    #[must_use]
    pub fn profile(self, dtype: DType) -> BufferProfile {
        let eb = dtype.size_bytes();
        let multiplicity = self.multiplicity();
        let mut profile = BufferProfile::new(format!("{}/{dtype}", self.name()), multiplicity);

        match self {
            Self::UnaryScalar => profile = profile.with_fixed_reserve(SCALAR_SLOT_BYTES),
            Self::LerpScalar => profile = profile.with_fixed_reserve(LERP_SCALAR_RESERVE_BYTES),
            Self::LerpList => profile = profile.with_chunk_align(BYTES_PER_REPEAT),
            Self::Sign if matches!(dtype, DType::F32 | DType::F16) => {
                profile = profile.with_region(
                    "sign_table",
                    RegionSizing::Fixed { bytes: SIGN_TABLE_REPEATS * u64::from(eb) },
                );
            }
            Self::RoundOffNumber => {
                profile = profile.with_region(
                    "reduce_tmp",
                    RegionSizing::ReductionTemp { factor: 2, elems_per_repeat: BYTES_PER_REPEAT / eb },
                );
            }
            _ => {}
        }

        if self.casts(dtype) {
            profile = profile.with_region(
                "f32_cast",
                RegionSizing::PerElement { bytes_per_elem: (CAST_SCRATCH_FACTOR - 1) * multiplicity * eb },
            );
            if self != Self::Copy && profile.chunk_align_bytes.is_none() {
                profile = profile.with_chunk_align(CAST_CHUNK_ALIGN_BYTES);
            }
        }
        profile
    }
}

impl fmt::Display for OpFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for OpFamily {
    type Err = ParseOpFamilyError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseOpFamilyError(s.to_string()))
    }
}
