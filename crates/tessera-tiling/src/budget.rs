//! Scratch-memory budgeting: how many elements a core processes per step.
//!
//! A [`BufferProfile`] describes every scratch region an operator family keeps
//! live at once. [`solve_chunk`] finds a block-aligned chunk length whose
//! footprint fits the per-core budget, and [`BufferPlan`] turns that chunk
//! into an iteration count and tail for one core's share.
//!
//! Solving order: pass 1 folds every region that is linear in the chunk
//! length (primary regions and [`RegionSizing::PerElement`]) together with all
//! fixed bytes into a closed form. If the profile has chunk-dependent
//! [`RegionSizing::ReductionTemp`] regions, pass 2 reserves their size at the
//! provisional chunk and re-solves. Those sizes never shrink as the chunk
//! grows and pass 2 never grows the chunk, so the pass-2 chunk always fits.

use serde::{Deserialize, Serialize};
use tessera_common::{PlanError, Result, align_down, align_up, ceil_div};

/// How an extra scratch region scales with the chunk length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RegionSizing {
    /// `bytes_per_elem * chunk` bytes.
    PerElement { bytes_per_elem: u32 },
    /// `ceil(factor * chunk / elems_per_repeat)` elements, rounded up to a
    /// block, at the element width.
    ReductionTemp { factor: u32, elems_per_repeat: u32 },
    /// A constant number of bytes.
    Fixed { bytes: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtraRegion {
    pub name: String,
    pub sizing: RegionSizing,
}

/// Scratch layout of one operator family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BufferProfile {
    pub name: String,
    /// Same-sized primary regions live at once (queues times buffer depth).
    pub multiplicity: u32,
    /// Bytes carved out of the budget before anything else.
    #[serde(default)]
    pub fixed_reserve_bytes: u64,
    /// Coarser chunk alignment in bytes; must be a multiple of the block.
    #[serde(default)]
    pub chunk_align_bytes: Option<u32>,
    #[serde(default)]
    pub extra_regions: Vec<ExtraRegion>,
}

impl BufferProfile {
    #[must_use]
    pub fn new(name: impl Into<String>, multiplicity: u32) -> Self {
        Self {
            name: name.into(),
            multiplicity,
            fixed_reserve_bytes: 0,
            chunk_align_bytes: None,
            extra_regions: Vec::new(),
        }
    }

    #[must_use]
    pub const fn with_fixed_reserve(mut self, bytes: u64) -> Self {
        self.fixed_reserve_bytes = bytes;
        self
    }

    #[must_use]
    pub const fn with_chunk_align(mut self, bytes: u32) -> Self {
        self.chunk_align_bytes = Some(bytes);
        self
    }

    #[must_use]
    pub fn with_region(mut self, name: impl Into<String>, sizing: RegionSizing) -> Self {
        self.extra_regions.push(ExtraRegion { name: name.into(), sizing });
        self
    }

    /// Reject profiles that cannot describe any layout.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidProfile`] for a zero multiplicity, a reduction
    /// region with zero elements per repeat, or a chunk alignment that is not
    /// a positive multiple of `block_bytes`.
    pub fn validate(&self, block_bytes: u32) -> Result<()> {
        if self.multiplicity == 0 {
            return Err(PlanError::InvalidProfile(format!(
                "{}: multiplicity must be > 0",
                self.name
            )));
        }
        if let Some(align) = self.chunk_align_bytes {
            if align == 0 || block_bytes == 0 || align % block_bytes != 0 {
                return Err(PlanError::InvalidProfile(format!(
                    "{}: chunk alignment {align} bytes is not a multiple of the {block_bytes}-byte block",
                    self.name
                )));
            }
        }
        for region in &self.extra_regions {
            if let RegionSizing::ReductionTemp { elems_per_repeat: 0, .. } = region.sizing {
                return Err(PlanError::InvalidProfile(format!(
                    "{}: region {} has zero elements per repeat",
                    self.name, region.name
                )));
            }
        }
        Ok(())
    }

    /// Bytes per chunk element across primary and per-element regions.
    fn linear_bytes_per_elem(&self, element_bytes: u32) -> u64 {
        let primary = u64::from(self.multiplicity) * u64::from(element_bytes);
        self.extra_regions.iter().fold(primary, |acc, r| match r.sizing {
            RegionSizing::PerElement { bytes_per_elem } => acc + u64::from(bytes_per_elem),
            _ => acc,
        })
    }

    /// Bytes that do not depend on the chunk length.
    fn constant_bytes(&self) -> u64 {
        self.extra_regions.iter().fold(self.fixed_reserve_bytes, |acc, r| match r.sizing {
            RegionSizing::Fixed { bytes } => acc.saturating_add(bytes),
            _ => acc,
        })
    }

    fn has_nonlinear_regions(&self) -> bool {
        self.extra_regions.iter().any(|r| matches!(r.sizing, RegionSizing::ReductionTemp { .. }))
    }

    /// Bytes of the chunk-dependent non-linear regions at `chunk_elems`.
    fn nonlinear_bytes(&self, chunk_elems: u64, element_bytes: u32, block_elems: u64) -> u64 {
        self.extra_regions
            .iter()
            .filter_map(|r| match r.sizing {
                RegionSizing::ReductionTemp { factor, elems_per_repeat } => {
                    let elems = ceil_div(
                        u64::from(factor).saturating_mul(chunk_elems),
                        u64::from(elems_per_repeat),
                    );
                    Some(align_up(elems, block_elems).saturating_mul(u64::from(element_bytes)))
                }
                _ => None,
            })
            .fold(0u64, u64::saturating_add)
    }

    /// Bytes of every extra region at `chunk_elems`, excluding primary regions
    /// and the fixed reserve.
    #[must_use]
    pub fn extra_regions_bytes(&self, chunk_elems: u64, element_bytes: u32, block_elems: u64) -> u64 {
        self.extra_regions
            .iter()
            .map(|r| match r.sizing {
                RegionSizing::PerElement { bytes_per_elem } => {
                    u64::from(bytes_per_elem).saturating_mul(chunk_elems)
                }
                RegionSizing::Fixed { bytes } => bytes,
                RegionSizing::ReductionTemp { .. } => 0,
            })
            .fold(self.nonlinear_bytes(chunk_elems, element_bytes, block_elems), u64::saturating_add)
    }

    /// Total scratch bytes a core needs to process chunks of `chunk_elems`.
    #[must_use]
    pub fn footprint_bytes(&self, chunk_elems: u64, element_bytes: u32, block_elems: u64) -> u64 {
        u64::from(self.multiplicity)
            .saturating_mul(chunk_elems)
            .saturating_mul(u64::from(element_bytes))
            .saturating_add(self.extra_regions_bytes(chunk_elems, element_bytes, block_elems))
            .saturating_add(self.fixed_reserve_bytes)
    }

    /// Chunk alignment in elements.
    fn align_elems(&self, element_bytes: u32, block_elems: u64) -> u64 {
        match self.chunk_align_bytes {
            Some(bytes) => align_up(u64::from(bytes / element_bytes.max(1)), block_elems),
            None => block_elems,
        }
    }
}

/// Result of [`solve_chunk`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChunkBudget {
    pub chunk_elems: u64,
    pub footprint_bytes: u64,
    /// Solver passes used: 1 for purely linear profiles, otherwise 2.
    pub passes: u8,
}

/// Largest aligned chunk the two-pass solver finds for `profile`.
///
/// # Errors
///
/// [`PlanError::InvalidProfile`] if the profile fails validation and
/// [`PlanError::InsufficientScratch`] if not even one aligned chunk fits.
pub fn solve_chunk(
    profile: &BufferProfile,
    element_bytes: u32,
    block_elems: u64,
    budget_bytes: u64,
) -> Result<ChunkBudget> {
    let block_bytes = u32::try_from(block_elems.saturating_mul(u64::from(element_bytes)))
        .map_err(|_| PlanError::InvalidAlignment { element_bytes, block_bytes: u32::MAX })?;
    profile.validate(block_bytes)?;

    let align = profile.align_elems(element_bytes, block_elems);
    let linear = profile.linear_bytes_per_elem(element_bytes);
    let constant = profile.constant_bytes();
    let insufficient = || {
        log::warn!(
            "profile {} cannot fit one {align}-element chunk in {budget_bytes} scratch bytes",
            profile.name
        );
        PlanError::InsufficientScratch {
            budget_bytes,
            required_bytes: profile.footprint_bytes(align, element_bytes, block_elems),
        }
    };

    let available = budget_bytes.checked_sub(constant).ok_or_else(insufficient)?;
    let provisional = align_down(available / linear, align);
    if provisional == 0 {
        return Err(insufficient());
    }
    if !profile.has_nonlinear_regions() {
        return Ok(ChunkBudget {
            chunk_elems: provisional,
            footprint_bytes: profile.footprint_bytes(provisional, element_bytes, block_elems),
            passes: 1,
        });
    }

    let reserved = profile.nonlinear_bytes(provisional, element_bytes, block_elems);
    let mut chunk = align_down(available.saturating_sub(reserved) / linear, align);
    if chunk == 0 {
        // The reservation taken at the provisional chunk is pessimistic; a
        // single aligned unit may still fit on its own.
        if profile.footprint_bytes(align, element_bytes, block_elems) > budget_bytes {
            return Err(insufficient());
        }
        chunk = align;
    }
    let footprint = profile.footprint_bytes(chunk, element_bytes, block_elems);
    log::debug!(
        "profile {}: provisional chunk {provisional}, reserved {reserved} bytes, final chunk {chunk}",
        profile.name
    );
    Ok(ChunkBudget { chunk_elems: chunk, footprint_bytes: footprint, passes: 2 })
}

/// Inner-loop schedule of one core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BufferPlan {
    pub chunk_elems: u64,
    pub iteration_count: u64,
    /// Elements processed by the last iteration; equals `chunk_elems` when the
    /// share divides evenly, and 0 when the share is empty.
    pub tail_chunk_elems: u64,
}

impl BufferPlan {
    /// Schedule `total_elems` in chunks of `chunk_elems`.
    #[must_use]
    pub const fn for_elems(chunk_elems: u64, total_elems: u64) -> Self {
        if chunk_elems == 0 || total_elems == 0 {
            return Self { chunk_elems, iteration_count: 0, tail_chunk_elems: 0 };
        }
        let iteration_count = ceil_div(total_elems, chunk_elems);
        let tail_chunk_elems = total_elems - (iteration_count - 1) * chunk_elems;
        Self { chunk_elems, iteration_count, tail_chunk_elems }
    }

    /// Elements covered by all iterations together.
    #[must_use]
    pub const fn total_elems(&self) -> u64 {
        if self.iteration_count == 0 {
            return 0;
        }
        (self.iteration_count - 1) * self.chunk_elems + self.tail_chunk_elems
    }
}
