//! Planning error types.

use std::fmt;
use thiserror::Error;

/// Which fixed capacity of the launch descriptor was exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CapacityKind {
    Cores,
    Tensors,
}

impl fmt::Display for CapacityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cores => write!(f, "core"),
            Self::Tensors => write!(f, "tensor"),
        }
    }
}

/// Errors produced while planning a kernel launch.
///
/// Every variant means the operator invocation cannot run with the given
/// inputs and must be rejected before any device work is issued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error(
        "invalid alignment: element size {element_bytes} bytes does not evenly divide block size {block_bytes} bytes"
    )]
    InvalidAlignment { element_bytes: u32, block_bytes: u32 },

    #[error("invalid core count: platform reports zero compute cores")]
    InvalidCoreCount,

    #[error(
        "insufficient scratch: budget of {budget_bytes} bytes cannot hold one aligned chunk ({required_bytes} bytes required)"
    )]
    InsufficientScratch { budget_bytes: u64, required_bytes: u64 },

    #[error("{kind} count {count} exceeds descriptor capacity {cap}")]
    CapacityExceeded { kind: CapacityKind, count: usize, cap: usize },

    #[error("element count of tensor {tensor} overflows u64")]
    ElementCountOverflow { tensor: usize },

    #[error("invalid buffer profile: {0}")]
    InvalidProfile(String),
}

/// Convenience result alias.
pub type Result<T> = std::result::Result<T, PlanError>;
