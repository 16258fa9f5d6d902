//! Single entry point that runs every planning stage in order.

use crate::budget::{BufferProfile, solve_chunk};
use crate::descriptor::{PlanDescriptor, PlanDescriptorBuilder, check_record_capacity};
use crate::partition::CorePartitioner;
use crate::profiles::OpFamily;
use crate::shape::normalize;
use serde::{Deserialize, Serialize};
use tessera_common::{DType, PlatformLimits, Result};

/// Everything the planner needs to know about one operator invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanRequest {
    /// Tensor shapes in iteration order.
    pub shapes: Vec<Vec<u64>>,
    pub dtype: DType,
    pub profile: BufferProfile,
}

impl PlanRequest {
    #[must_use]
    pub fn new(shapes: Vec<Vec<u64>>, dtype: DType, profile: BufferProfile) -> Self {
        Self { shapes, dtype, profile }
    }

    /// Request using the catalogue profile of `family` for `dtype`.
    #[must_use]
    pub fn for_family(shapes: Vec<Vec<u64>>, dtype: DType, family: OpFamily) -> Self {
        Self::new(shapes, dtype, family.profile(dtype))
    }
}

/// Plan one kernel launch.
///
/// Normalises shapes, partitions the aligned elements across cores, sizes the
/// per-core chunk against the usable scratch budget and assembles the
/// descriptor. Identical inputs always produce an identical descriptor.
///
/// # Errors
///
/// Any [`tessera_common::PlanError`] raised by a stage; nothing is returned
/// for a request that cannot run as given.
pub fn plan(request: &PlanRequest, limits: &PlatformLimits) -> Result<PlanDescriptor> {
    check_record_capacity(request.shapes.len(), 0)?;

    let element_bytes = request.dtype.size_bytes();
    let sizes = normalize(&request.shapes, element_bytes, limits.block_bytes)?;

    let partition = CorePartitioner::new(limits.core_count)
        .with_granule_bytes(limits.core_granule_bytes)
        .partition(&sizes)?;
    debug_assert!(partition.check(&sizes).is_ok(), "{:?}", partition.check(&sizes));

    let budget = solve_chunk(
        &request.profile,
        element_bytes,
        sizes.block_elems(),
        limits.usable_scratch_bytes(),
    )?;
    log::debug!(
        "{} {}: chunk {} elements ({} of {} scratch bytes)",
        request.profile.name,
        request.dtype,
        budget.chunk_elems,
        budget.footprint_bytes,
        limits.usable_scratch_bytes()
    );

    PlanDescriptorBuilder::default().build(
        request.dtype.tiling_key(),
        &sizes,
        &partition,
        budget.chunk_elems,
    )
}
