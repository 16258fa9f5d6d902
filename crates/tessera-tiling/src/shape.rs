//! Shape normalisation: element counts and block-aligned element counts.
//!
//! Every tensor is padded on its own to a whole number of alignment blocks.
//! Padding belongs to the tensor it follows and is never shared, so the
//! concatenated address space the partitioner walks is always a sequence of
//! whole blocks.

use serde::Serialize;
use tessera_common::math::checked_align_up;
use tessera_common::{PlanError, Result};

/// Element counts of one tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AlignedSize {
    /// Product of the tensor's dimensions.
    pub raw: u64,
    /// `raw` rounded up to a multiple of the block size in elements.
    pub aligned: u64,
}

impl AlignedSize {
    /// Padding elements appended after the tensor's data.
    #[must_use]
    pub const fn padding(&self) -> u64 {
        self.aligned - self.raw
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.aligned == 0
    }
}

/// Ordered per-tensor sizes plus the alignment they were computed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlignedSizeList {
    sizes: Vec<AlignedSize>,
    element_bytes: u32,
    block_elems: u64,
    total_aligned: u64,
}

impl AlignedSizeList {
    /// Build the list from raw element counts.
    ///
    /// # Errors
    ///
    /// [`PlanError::InvalidAlignment`] when the element size does not evenly
    /// divide the block size, [`PlanError::ElementCountOverflow`] when an
    /// aligned count or the running total does not fit in `u64`.
    pub fn from_raw_counts(raw_counts: &[u64], element_bytes: u32, block_bytes: u32) -> Result<Self> {
        let block_elems = block_elems(element_bytes, block_bytes)?;
        let mut sizes = Vec::with_capacity(raw_counts.len());
        let mut total_aligned = 0u64;
        for (tensor, &raw) in raw_counts.iter().enumerate() {
            let aligned = checked_align_up(raw, block_elems)
                .ok_or(PlanError::ElementCountOverflow { tensor })?;
            total_aligned = total_aligned
                .checked_add(aligned)
                .ok_or(PlanError::ElementCountOverflow { tensor })?;
            sizes.push(AlignedSize { raw, aligned });
        }
        Ok(Self { sizes, element_bytes, block_elems, total_aligned })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    #[must_use]
    pub fn get(&self, tensor: usize) -> Option<&AlignedSize> {
        self.sizes.get(tensor)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AlignedSize> {
        self.sizes.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[AlignedSize] {
        &self.sizes
    }

    #[must_use]
    pub const fn element_bytes(&self) -> u32 {
        self.element_bytes
    }

    /// Alignment granularity in elements.
    #[must_use]
    pub const fn block_elems(&self) -> u64 {
        self.block_elems
    }

    /// Sum of the aligned counts: the length of the concatenated address space.
    #[must_use]
    pub const fn total_aligned(&self) -> u64 {
        self.total_aligned
    }

    /// Sum of the raw counts.
    #[must_use]
    pub fn total_raw(&self) -> u64 {
        self.sizes.iter().map(|s| s.raw).sum()
    }

    /// Start of each tensor in the concatenated address space.
    #[must_use]
    pub fn prefix_offsets(&self) -> Vec<u64> {
        let mut acc = 0u64;
        self.sizes
            .iter()
            .map(|s| {
                let start = acc;
                acc += s.aligned;
                start
            })
            .collect()
    }

    /// Index of the first tensor at or after `from` that owns any elements.
    #[must_use]
    pub fn next_non_empty(&self, from: usize) -> Option<usize> {
        self.sizes.iter().enumerate().skip(from).find(|(_, s)| !s.is_empty()).map(|(i, _)| i)
    }

    /// Index of the last tensor that owns any elements.
    #[must_use]
    pub fn last_non_empty(&self) -> Option<usize> {
        self.sizes.iter().rposition(|s| !s.is_empty())
    }
}

impl<'a> IntoIterator for &'a AlignedSizeList {
    type Item = &'a AlignedSize;
    type IntoIter = std::slice::Iter<'a, AlignedSize>;

    fn into_iter(self) -> Self::IntoIter {
        self.sizes.iter()
    }
}

/// Alignment block size in elements.
///
/// # Errors
///
/// [`PlanError::InvalidAlignment`] if `element_bytes` is zero, does not divide
/// `block_bytes`, or the quotient is zero.
pub fn block_elems(element_bytes: u32, block_bytes: u32) -> Result<u64> {
    if element_bytes == 0 || block_bytes == 0 || block_bytes % element_bytes != 0 {
        return Err(PlanError::InvalidAlignment { element_bytes, block_bytes });
    }
    Ok(u64::from(block_bytes / element_bytes))
}

/// Element count of a shape. A shape with no dimensions is a scalar.
///
/// # Errors
///
/// [`PlanError::ElementCountOverflow`] when the product overflows `u64`.
pub fn element_count(dims: &[u64], tensor: usize) -> Result<u64> {
    dims.iter()
        .try_fold(1u64, |acc, &d| acc.checked_mul(d))
        .ok_or(PlanError::ElementCountOverflow { tensor })
}

/// Convert an ordered shape list into raw and aligned element counts.
///
/// # Errors
///
/// See [`block_elems`] and [`AlignedSizeList::from_raw_counts`].
pub fn normalize<S: AsRef<[u64]>>(
    shapes: &[S],
    element_bytes: u32,
    block_bytes: u32,
) -> Result<AlignedSizeList> {
    let raw = shapes
        .iter()
        .enumerate()
        .map(|(tensor, dims)| element_count(dims.as_ref(), tensor))
        .collect::<Result<Vec<_>>>()?;
    let list = AlignedSizeList::from_raw_counts(&raw, element_bytes, block_bytes)?;
    log::debug!(
        "normalised {} tensors: raw={} aligned={} block_elems={}",
        list.len(),
        list.total_raw(),
        list.total_aligned(),
        list.block_elems()
    );
    Ok(list)
}
