//! Core partitioning of a concatenated multi-tensor address space.
//!
//! [`CorePartitioner`] splits the block-aligned elements of every tensor,
//! taken in list order, into one contiguous [`CoreRange`] per used core.
//! Shares are handed out in whole quanta (one alignment block by default)
//! and earlier cores receive the extra quantum when the split is uneven.

use crate::shape::AlignedSizeList;
use serde::Serialize;
use tessera_common::{PlanError, Result, ceil_div};

// ── Core range ──────────────────────────────────────────────────────────

/// Inclusive slice of the concatenated address space owned by one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct CoreRange {
    pub start_tensor: usize,
    pub start_offset: u64,
    pub end_tensor: usize,
    /// Last element owned by the core (inclusive).
    pub end_offset: u64,
}

/// Part of a [`CoreRange`] that lies inside a single tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub tensor: usize,
    pub start: u64,
    pub len: u64,
    /// Elements of the segment that lie below the tensor's raw count.
    pub data_elems: u64,
}

impl Segment {
    #[must_use]
    pub const fn padding_elems(&self) -> u64 {
        self.len - self.data_elems
    }

    #[must_use]
    pub const fn end(&self) -> u64 {
        self.start + self.len
    }
}

impl CoreRange {
    /// Replay the range as per-tensor segments, skipping empty tensors.
    ///
    /// Tensor indices outside `sizes` are ignored, so a range checked against
    /// the wrong list yields fewer segments rather than panicking.
    #[must_use]
    pub fn segments(&self, sizes: &AlignedSizeList) -> Vec<Segment> {
        let mut out = Vec::new();
        for tensor in self.start_tensor..=self.end_tensor {
            let Some(size) = sizes.get(tensor) else { break };
            if size.is_empty() {
                continue;
            }
            let start = if tensor == self.start_tensor { self.start_offset } else { 0 };
            let end = if tensor == self.end_tensor {
                self.end_offset.saturating_add(1).min(size.aligned)
            } else {
                size.aligned
            };
            if end <= start {
                continue;
            }
            let data_elems = end.min(size.raw).saturating_sub(start);
            out.push(Segment { tensor, start, len: end - start, data_elems });
        }
        out
    }

    /// Number of elements the range covers.
    #[must_use]
    pub fn elem_count(&self, sizes: &AlignedSizeList) -> u64 {
        self.segments(sizes).iter().map(|s| s.len).sum()
    }

    /// Number of real (non-padding) elements the range covers.
    #[must_use]
    pub fn data_count(&self, sizes: &AlignedSizeList) -> u64 {
        self.segments(sizes).iter().map(|s| s.data_elems).sum()
    }
}

// ── Partition plan ──────────────────────────────────────────────────────

/// Ordered per-core ranges produced by [`CorePartitioner::partition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionPlan {
    ranges: Vec<CoreRange>,
    core_elems: Vec<u64>,
    quantum_elems: u64,
}

impl PartitionPlan {
    fn empty(quantum_elems: u64) -> Self {
        Self { ranges: Vec::new(), core_elems: Vec::new(), quantum_elems }
    }

    #[must_use]
    pub fn ranges(&self) -> &[CoreRange] {
        &self.ranges
    }

    /// Elements assigned to each used core, in core order.
    #[must_use]
    pub fn core_elems(&self) -> &[u64] {
        &self.core_elems
    }

    #[must_use]
    pub fn used_core_count(&self) -> usize {
        self.ranges.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Share granularity the plan was built with, in elements.
    #[must_use]
    pub const fn quantum_elems(&self) -> u64 {
        self.quantum_elems
    }

    /// Largest per-core share, or 0 for an empty plan.
    #[must_use]
    pub fn max_core_elems(&self) -> u64 {
        self.core_elems.iter().copied().max().unwrap_or(0)
    }

    /// Verify coverage, contiguity and alignment against `sizes`.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found, in core order.
    pub fn check(&self, sizes: &AlignedSizeList) -> std::result::Result<(), InvariantViolation> {
        if self.ranges.len() != self.core_elems.len() {
            return Err(InvariantViolation::ShareCountMismatch {
                ranges: self.ranges.len(),
                shares: self.core_elems.len(),
            });
        }
        let prefix = sizes.prefix_offsets();
        let block = sizes.block_elems();
        let total = sizes.total_aligned();
        let last = self.ranges.len().saturating_sub(1);
        let mut expected = 0u64;

        for (core, range) in self.ranges.iter().enumerate() {
            let start = global_offset(sizes, &prefix, range.start_tensor, range.start_offset)
                .ok_or(InvariantViolation::OutOfBounds {
                    core,
                    tensor: range.start_tensor,
                    offset: range.start_offset,
                })?;
            let end = global_offset(sizes, &prefix, range.end_tensor, range.end_offset)
                .ok_or(InvariantViolation::OutOfBounds {
                    core,
                    tensor: range.end_tensor,
                    offset: range.end_offset,
                })?
                + 1;
            if start != expected {
                return Err(InvariantViolation::Discontiguous { core, expected, found: start });
            }
            if end <= start {
                return Err(InvariantViolation::Reversed { core });
            }
            if core > 0 && start % block != 0 {
                return Err(InvariantViolation::Misaligned { core, offset: start, block_elems: block });
            }
            if core < last && end % block != 0 {
                return Err(InvariantViolation::Misaligned { core, offset: end, block_elems: block });
            }
            if self.core_elems[core] != end - start {
                return Err(InvariantViolation::ShareMismatch {
                    core,
                    recorded: self.core_elems[core],
                    covered: end - start,
                });
            }
            expected = end;
        }

        if expected != total {
            return Err(InvariantViolation::Uncovered { covered: expected, total });
        }
        Ok(())
    }
}

fn global_offset(sizes: &AlignedSizeList, prefix: &[u64], tensor: usize, offset: u64) -> Option<u64> {
    let size = sizes.get(tensor)?;
    (offset < size.aligned).then(|| prefix[tensor] + offset)
}

/// First broken partition invariant reported by [`PartitionPlan::check`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("core {core} references tensor {tensor} offset {offset} outside its aligned extent")]
    OutOfBounds { core: usize, tensor: usize, offset: u64 },

    #[error("core {core} starts at {found}, expected {expected}")]
    Discontiguous { core: usize, expected: u64, found: u64 },

    #[error("core {core} ends before it starts")]
    Reversed { core: usize },

    #[error("core {core} boundary {offset} is not a multiple of {block_elems}")]
    Misaligned { core: usize, offset: u64, block_elems: u64 },

    #[error("core {core} records {recorded} elements but covers {covered}")]
    ShareMismatch { core: usize, recorded: u64, covered: u64 },

    #[error("{ranges} ranges but {shares} recorded shares")]
    ShareCountMismatch { ranges: usize, shares: usize },

    #[error("ranges cover {covered} of {total} elements")]
    Uncovered { covered: u64, total: u64 },
}

// ── Core partitioner ────────────────────────────────────────────────────

/// Splits a concatenated tensor list across up to `core_count` cores.
///
/// Without a granule every share is a whole number of alignment blocks and
/// shares differ by at most one block. With [`Self::with_granule_bytes`] the
/// quantum grows to the granule, and the final core may come up short of its
/// quota by less than one granule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorePartitioner {
    core_count: u32,
    granule_bytes: Option<u64>,
}

impl CorePartitioner {
    #[must_use]
    pub const fn new(core_count: u32) -> Self {
        Self { core_count, granule_bytes: None }
    }

    /// Hand out work in granules of `bytes` instead of single blocks.
    ///
    /// The granule is rounded up to whole alignment blocks.
    #[must_use]
    pub const fn with_granule_bytes(mut self, bytes: Option<u64>) -> Self {
        self.granule_bytes = bytes;
        self
    }

    /// Share quantum in elements for a list aligned to `sizes.block_elems()`.
    #[must_use]
    pub fn quantum_elems(&self, sizes: &AlignedSizeList) -> u64 {
        let block = sizes.block_elems();
        match self.granule_bytes {
            Some(bytes) if bytes > 0 => {
                let elems = bytes / u64::from(sizes.element_bytes().max(1));
                tessera_common::math::checked_align_up(elems, block)
                    .unwrap_or_else(|| tessera_common::align_down(elems, block))
                    .max(block)
            }
            _ => block,
        }
    }

    /// Per-core element quotas before the cursor walk.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidCoreCount`] when the partitioner has zero cores.
    pub fn core_quotas(&self, sizes: &AlignedSizeList) -> Result<Vec<u64>> {
        if self.core_count == 0 {
            return Err(PlanError::InvalidCoreCount);
        }
        let quantum = self.quantum_elems(sizes);
        let total_quanta = ceil_div(sizes.total_aligned(), quantum);
        let used = total_quanta.min(u64::from(self.core_count));
        if used == 0 {
            return Ok(Vec::new());
        }
        let base = total_quanta / used;
        let remainder = total_quanta % used;
        // The last quantum may be partial: cap each quota at what is left.
        let mut left = sizes.total_aligned();
        Ok((0..used)
            .map(|core| {
                let quota = (base + u64::from(core < remainder)).saturating_mul(quantum).min(left);
                left -= quota;
                quota
            })
            .collect())
    }

    /// Assign every aligned element of `sizes` to exactly one core.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidCoreCount`] when the partitioner has zero cores.
    pub fn partition(&self, sizes: &AlignedSizeList) -> Result<PartitionPlan> {
        let quotas = self.core_quotas(sizes)?;
        let quantum = self.quantum_elems(sizes);
        let Some(first) = sizes.next_non_empty(0) else {
            return Ok(PartitionPlan::empty(quantum));
        };

        let aligned = |t: usize| sizes.get(t).map_or(0, |s| s.aligned);
        let mut ranges = Vec::with_capacity(quotas.len());
        let mut core_elems = Vec::with_capacity(quotas.len());
        let mut cursor = Some((first, 0u64));

        for quota in quotas {
            let Some((start_tensor, start_offset)) = cursor else { break };
            let (mut tensor, mut offset) = (start_tensor, start_offset);
            let mut remaining = quota;
            let mut end: (usize, u64);

            loop {
                let take = (aligned(tensor) - offset).min(remaining);
                offset += take;
                remaining -= take;
                end = (tensor, offset - 1);
                if offset == aligned(tensor) {
                    // Tensor exhausted: continue at the next non-empty tensor.
                    cursor = sizes.next_non_empty(tensor + 1).map(|t| (t, 0));
                    match cursor {
                        Some((next, _)) => (tensor, offset) = (next, 0),
                        None => break,
                    }
                } else {
                    cursor = Some((tensor, offset));
                }
                if remaining == 0 {
                    break;
                }
            }

            // A quota left unfilled with no tensors remaining already ends at
            // the final aligned offset, so the range stands as is.
            ranges.push(CoreRange {
                start_tensor,
                start_offset,
                end_tensor: end.0,
                end_offset: end.1,
            });
            core_elems.push(quota - remaining);
        }

        let plan = PartitionPlan { ranges, core_elems, quantum_elems: quantum };
        log::debug!(
            "partitioned {} elements over {} of {} cores (quantum {})",
            sizes.total_aligned(),
            plan.used_core_count(),
            self.core_count,
            quantum
        );
        Ok(plan)
    }
}
