//! Common types, errors, and configuration for the tessera tiling planner
//!
//! This crate provides the foundational pieces shared by every planning stage:
//! element data types, integer alignment helpers, the typed planning error,
//! and the platform-limit configuration loaded from TOML and the environment.

pub mod dtype;
pub mod error;
pub mod math;
pub mod platform;

pub use dtype::*;
pub use error::*;
pub use math::{align_down, align_up, ceil_div};
pub use platform::{PlatformConfigError, PlatformLimits};
