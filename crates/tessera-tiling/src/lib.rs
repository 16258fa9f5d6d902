//! Launch planning for multi-tensor vector kernels.
//!
//! Given an ordered list of tensor shapes, an element type, a scratch profile
//! and the target's [`PlatformLimits`](tessera_common::PlatformLimits), the
//! planner decides which contiguous slice of which tensors every core owns and
//! how many elements a core moves through scratch per inner iteration.
//!
//! The stages run leaf first and are pure functions of their inputs:
//!
//! 1. [`shape`] normalises shapes into raw and block-aligned element counts.
//! 2. [`partition`] splits the aligned elements across cores.
//! 3. [`budget`] sizes the per-iteration chunk against the scratch budget.
//! 4. [`descriptor`] flattens the result into a [`PlanDescriptor`], which
//!    [`schema`] encodes into a versioned byte format.
//!
//! [`planner::plan`] runs all four.
//!
//! ```
//! use tessera_common::{DType, PlatformLimits};
//! use tessera_tiling::{OpFamily, PlanRequest, plan};
//!
//! let request = PlanRequest::for_family(vec![vec![128, 64], vec![7]], DType::F32, OpFamily::Unary);
//! let desc = plan(&request, &PlatformLimits::default()).unwrap();
//! assert_eq!(desc.tensor_count(), 2);
//! ```

pub mod budget;
pub mod descriptor;
pub mod partition;
pub mod planner;
pub mod profiles;
pub mod schema;
pub mod shape;

pub use budget::{BufferPlan, BufferProfile, ChunkBudget, ExtraRegion, RegionSizing, solve_chunk};
pub use descriptor::{MAX_CORES, MAX_TENSORS, PlanDescriptor, PlanDescriptorBuilder, WORKSPACE_BYTES};
pub use partition::{CorePartitioner, CoreRange, InvariantViolation, PartitionPlan, Segment};
pub use planner::{PlanRequest, plan};
pub use profiles::{OpFamily, ParseOpFamilyError};
pub use schema::SchemaError;
pub use shape::{AlignedSize, AlignedSizeList, normalize};
