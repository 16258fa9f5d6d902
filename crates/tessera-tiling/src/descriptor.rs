//! Flat launch descriptor handed to the kernel dispatch layer.
//!
//! Per-tensor and per-core data live in parallel arrays. The arrays are sized
//! to the actual plan, and [`PlanDescriptorBuilder`] rejects plans that exceed
//! the launch record's capacity instead of truncating them.

use crate::budget::BufferPlan;
use crate::partition::{CoreRange, PartitionPlan};
use crate::shape::AlignedSizeList;
use serde::Serialize;
use tessera_common::{CapacityKind, PlanError, Result};

/// Most cores a launch record can program.
pub const MAX_CORES: usize = 64;

/// Most tensors a launch record can describe.
pub const MAX_TENSORS: usize = 256;

/// Global workspace requested for every launch. The vector kernels need none,
/// but the dispatch layer rejects a zero size.
pub const WORKSPACE_BYTES: u64 = 32;

/// Immutable result of planning one kernel launch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct PlanDescriptor {
    pub(crate) tiling_key: u32,
    pub(crate) block_elems: u32,
    pub(crate) chunk_elems: u64,
    pub(crate) workspace_bytes: u64,

    pub(crate) raw_counts: Vec<u64>,
    pub(crate) aligned_counts: Vec<u64>,

    pub(crate) start_tensors: Vec<u32>,
    pub(crate) start_offsets: Vec<u64>,
    pub(crate) end_tensors: Vec<u32>,
    pub(crate) end_offsets: Vec<u64>,
    pub(crate) iteration_counts: Vec<u64>,
    pub(crate) tail_chunk_elems: Vec<u64>,
}

impl PlanDescriptor {
    /// Kernel variant selector for the element type.
    #[must_use]
    pub const fn tiling_key(&self) -> u32 {
        self.tiling_key
    }

    /// Cores the launch programs (the launch block dimension).
    #[must_use]
    pub fn used_core_count(&self) -> usize {
        self.start_tensors.len()
    }

    #[must_use]
    pub fn tensor_count(&self) -> usize {
        self.raw_counts.len()
    }

    #[must_use]
    pub const fn block_elems(&self) -> u32 {
        self.block_elems
    }

    /// Elements a core processes per inner iteration.
    #[must_use]
    pub const fn chunk_elems(&self) -> u64 {
        self.chunk_elems
    }

    #[must_use]
    pub const fn workspace_bytes(&self) -> u64 {
        self.workspace_bytes
    }

    #[must_use]
    pub fn raw_counts(&self) -> &[u64] {
        &self.raw_counts
    }

    #[must_use]
    pub fn aligned_counts(&self) -> &[u64] {
        &self.aligned_counts
    }

    #[must_use]
    pub fn start_tensors(&self) -> &[u32] {
        &self.start_tensors
    }

    #[must_use]
    pub fn start_offsets(&self) -> &[u64] {
        &self.start_offsets
    }

    #[must_use]
    pub fn end_tensors(&self) -> &[u32] {
        &self.end_tensors
    }

    #[must_use]
    pub fn end_offsets(&self) -> &[u64] {
        &self.end_offsets
    }

    #[must_use]
    pub fn iteration_counts(&self) -> &[u64] {
        &self.iteration_counts
    }

    #[must_use]
    pub fn tail_chunk_elems(&self) -> &[u64] {
        &self.tail_chunk_elems
    }

    /// Range of core `core`, if the launch uses it.
    #[must_use]
    pub fn core_range(&self, core: usize) -> Option<CoreRange> {
        Some(CoreRange {
            start_tensor: *self.start_tensors.get(core)? as usize,
            start_offset: *self.start_offsets.get(core)?,
            end_tensor: *self.end_tensors.get(core)? as usize,
            end_offset: *self.end_offsets.get(core)?,
        })
    }

    /// Inner-loop schedule of core `core`, if the launch uses it.
    #[must_use]
    pub fn buffer_plan(&self, core: usize) -> Option<BufferPlan> {
        Some(BufferPlan {
            chunk_elems: self.chunk_elems,
            iteration_count: *self.iteration_counts.get(core)?,
            tail_chunk_elems: *self.tail_chunk_elems.get(core)?,
        })
    }

    /// Pretty JSON view for logs and debugging.
    ///
    /// # Errors
    ///
    /// Propagates serializer failures.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Check decoded counts against the launch record's capacity.
pub(crate) fn check_record_capacity(tensors: usize, cores: usize) -> Result<()> {
    check_capacity(tensors, cores, MAX_TENSORS, MAX_CORES)
}

fn check_capacity(tensors: usize, cores: usize, max_tensors: usize, max_cores: usize) -> Result<()> {
    if tensors > max_tensors {
        log::warn!("rejecting plan: {tensors} tensors exceed capacity {max_tensors}");
        return Err(PlanError::CapacityExceeded {
            kind: CapacityKind::Tensors,
            count: tensors,
            cap: max_tensors,
        });
    }
    if cores > max_cores {
        log::warn!("rejecting plan: {cores} cores exceed capacity {max_cores}");
        return Err(PlanError::CapacityExceeded {
            kind: CapacityKind::Cores,
            count: cores,
            cap: max_cores,
        });
    }
    Ok(())
}

/// Copies partition and buffer results into a [`PlanDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanDescriptorBuilder {
    max_cores: usize,
    max_tensors: usize,
}

impl Default for PlanDescriptorBuilder {
    fn default() -> Self {
        Self { max_cores: MAX_CORES, max_tensors: MAX_TENSORS }
    }
}

impl PlanDescriptorBuilder {
    /// Builder with caps lower than the launch record's.
    ///
    /// Caps above [`MAX_CORES`] / [`MAX_TENSORS`] are clamped to them.
    #[must_use]
    pub fn with_caps(max_cores: usize, max_tensors: usize) -> Self {
        Self { max_cores: max_cores.min(MAX_CORES), max_tensors: max_tensors.min(MAX_TENSORS) }
    }

    /// Assemble the descriptor.
    ///
    /// # Errors
    ///
    /// [`PlanError::CapacityExceeded`] when the tensor list or the used core
    /// count exceeds the builder's caps.
    pub fn build(
        &self,
        tiling_key: u32,
        sizes: &AlignedSizeList,
        partition: &PartitionPlan,
        chunk_elems: u64,
    ) -> Result<PlanDescriptor> {
        check_capacity(sizes.len(), partition.used_core_count(), self.max_tensors, self.max_cores)?;
        let block_elems = u32::try_from(sizes.block_elems()).map_err(|_| PlanError::InvalidAlignment {
            element_bytes: sizes.element_bytes(),
            block_bytes: u32::MAX,
        })?;

        let cores = partition.used_core_count();
        let mut desc = PlanDescriptor {
            tiling_key,
            block_elems,
            chunk_elems,
            workspace_bytes: WORKSPACE_BYTES,
            raw_counts: sizes.iter().map(|s| s.raw).collect(),
            aligned_counts: sizes.iter().map(|s| s.aligned).collect(),
            start_tensors: Vec::with_capacity(cores),
            start_offsets: Vec::with_capacity(cores),
            end_tensors: Vec::with_capacity(cores),
            end_offsets: Vec::with_capacity(cores),
            iteration_counts: Vec::with_capacity(cores),
            tail_chunk_elems: Vec::with_capacity(cores),
        };

        // Tensor indices fit in u32: the tensor cap is far below u32::MAX.
        for (range, &elems) in partition.ranges().iter().zip(partition.core_elems()) {
            let schedule = BufferPlan::for_elems(chunk_elems, elems);
            desc.start_tensors.push(range.start_tensor as u32);
            desc.start_offsets.push(range.start_offset);
            desc.end_tensors.push(range.end_tensor as u32);
            desc.end_offsets.push(range.end_offset);
            desc.iteration_counts.push(schedule.iteration_count);
            desc.tail_chunk_elems.push(schedule.tail_chunk_elems);
        }

        log::debug!(
            "descriptor: key={} cores={} tensors={} chunk={}",
            desc.tiling_key,
            desc.used_core_count(),
            desc.tensor_count(),
            desc.chunk_elems
        );
        Ok(desc)
    }
}
