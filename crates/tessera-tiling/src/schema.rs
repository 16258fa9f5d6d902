//! Versioned little-endian wire format of [`PlanDescriptor`].
//!
//! Layout, version 1:
//!
//! | field             | width | repeated   |
//! |-------------------|-------|------------|
//! | magic `TSPL`      | 4     |            |
//! | version           | u16   |            |
//! | reserved (0)      | u16   |            |
//! | tiling_key        | u32   |            |
//! | used_core_count   | u32   |            |
//! | tensor_count      | u32   |            |
//! | block_elems       | u32   |            |
//! | chunk_elems       | u64   |            |
//! | workspace_bytes   | u64   |            |
//! | raw_count         | u64   | per tensor |
//! | aligned_count     | u64   | per tensor |
//! | start_tensor      | u32   | per core   |
//! | start_offset      | u64   | per core   |
//! | end_tensor        | u32   | per core   |
//! | end_offset        | u64   | per core   |
//! | iteration_count   | u64   | per core   |
//! | tail_chunk_elems  | u64   | per core   |

use crate::descriptor::{PlanDescriptor, check_record_capacity};
use tessera_common::PlanError;
use thiserror::Error;

pub const MAGIC: [u8; 4] = *b"TSPL";
pub const SCHEMA_VERSION: u16 = 1;

/// Bytes before the per-tensor records.
pub const HEADER_LEN: usize = 40;
const TENSOR_RECORD_LEN: usize = 16;
const CORE_RECORD_LEN: usize = 40;

/// Errors returned when decoding a descriptor.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("bad magic: {0:02x?}")]
    BadMagic([u8; 4]),
    #[error("unsupported descriptor version: {0}")]
    UnsupportedVersion(u16),
    #[error("reserved header field is {0:#06x}, expected 0")]
    ReservedNonZero(u16),
    #[error("truncated descriptor: need {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("{0} trailing bytes after descriptor")]
    TrailingBytes(usize),
    #[error("core {core} references tensor {tensor} of {tensor_count}")]
    TensorIndexOutOfRange { core: usize, tensor: u32, tensor_count: usize },
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Exact encoded size of a descriptor with the given counts.
#[must_use]
pub const fn encoded_len(tensor_count: usize, core_count: usize) -> usize {
    HEADER_LEN + tensor_count * TENSOR_RECORD_LEN + core_count * CORE_RECORD_LEN
}

impl PlanDescriptor {
    /// Serialize to the version-1 wire format.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let tensors = self.tensor_count();
        let cores = self.used_core_count();
        let mut d = Vec::with_capacity(encoded_len(tensors, cores));

        d.extend_from_slice(&MAGIC);
        d.extend_from_slice(&SCHEMA_VERSION.to_le_bytes());
        d.extend_from_slice(&0u16.to_le_bytes());
        d.extend_from_slice(&self.tiling_key.to_le_bytes());
        // Counts are bounded by the descriptor caps.
        d.extend_from_slice(&(cores as u32).to_le_bytes());
        d.extend_from_slice(&(tensors as u32).to_le_bytes());
        d.extend_from_slice(&self.block_elems.to_le_bytes());
        d.extend_from_slice(&self.chunk_elems.to_le_bytes());
        d.extend_from_slice(&self.workspace_bytes.to_le_bytes());

        for (raw, aligned) in self.raw_counts.iter().zip(&self.aligned_counts) {
            d.extend_from_slice(&raw.to_le_bytes());
            d.extend_from_slice(&aligned.to_le_bytes());
        }
        for core in 0..cores {
            d.extend_from_slice(&self.start_tensors[core].to_le_bytes());
            d.extend_from_slice(&self.start_offsets[core].to_le_bytes());
            d.extend_from_slice(&self.end_tensors[core].to_le_bytes());
            d.extend_from_slice(&self.end_offsets[core].to_le_bytes());
            d.extend_from_slice(&self.iteration_counts[core].to_le_bytes());
            d.extend_from_slice(&self.tail_chunk_elems[core].to_le_bytes());
        }
        d
    }

    /// Parse the version-1 wire format.
    ///
    /// # Errors
    ///
    /// Any [`SchemaError`]; capacity violations surface as
    /// [`SchemaError::Plan`] wrapping [`PlanError::CapacityExceeded`].
    pub fn decode(buf: &[u8]) -> Result<Self, SchemaError> {
        let mut r = Reader { buf, pos: 0 };

        let magic = r.array::<4>()?;
        if magic != MAGIC {
            return Err(SchemaError::BadMagic(magic));
        }
        let version = r.u16()?;
        if version != SCHEMA_VERSION {
            return Err(SchemaError::UnsupportedVersion(version));
        }
        let reserved = r.u16()?;
        if reserved != 0 {
            return Err(SchemaError::ReservedNonZero(reserved));
        }
        let tiling_key = r.u32()?;
        let cores = r.u32()? as usize;
        let tensors = r.u32()? as usize;
        let block_elems = r.u32()?;
        let chunk_elems = r.u64()?;
        let workspace_bytes = r.u64()?;

        // Caps first, so a corrupt count cannot drive a huge allocation.
        check_record_capacity(tensors, cores)?;

        let mut desc = PlanDescriptor {
            tiling_key,
            block_elems,
            chunk_elems,
            workspace_bytes,
            raw_counts: Vec::with_capacity(tensors),
            aligned_counts: Vec::with_capacity(tensors),
            start_tensors: Vec::with_capacity(cores),
            start_offsets: Vec::with_capacity(cores),
            end_tensors: Vec::with_capacity(cores),
            end_offsets: Vec::with_capacity(cores),
            iteration_counts: Vec::with_capacity(cores),
            tail_chunk_elems: Vec::with_capacity(cores),
        };

        let needed = encoded_len(tensors, cores);
        if buf.len() < needed {
            return Err(SchemaError::Truncated { needed, available: buf.len() });
        }
        if buf.len() > needed {
            return Err(SchemaError::TrailingBytes(buf.len() - needed));
        }

        for _ in 0..tensors {
            desc.raw_counts.push(r.u64()?);
            desc.aligned_counts.push(r.u64()?);
        }
        for core in 0..cores {
            let start_tensor = r.u32()?;
            desc.start_offsets.push(r.u64()?);
            let end_tensor = r.u32()?;
            desc.end_offsets.push(r.u64()?);
            desc.iteration_counts.push(r.u64()?);
            desc.tail_chunk_elems.push(r.u64()?);
            for tensor in [start_tensor, end_tensor] {
                if tensor as usize >= tensors {
                    return Err(SchemaError::TensorIndexOutOfRange { core, tensor, tensor_count: tensors });
                }
            }
            desc.start_tensors.push(start_tensor);
            desc.end_tensors.push(end_tensor);
        }
        Ok(desc)
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn array<const N: usize>(&mut self) -> Result<[u8; N], SchemaError> {
        let end = self.pos + N;
        let bytes = self
            .buf
            .get(self.pos..end)
            .ok_or(SchemaError::Truncated { needed: end, available: self.buf.len() })?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u16(&mut self) -> Result<u16, SchemaError> {
        self.array().map(u16::from_le_bytes)
    }

    fn u32(&mut self) -> Result<u32, SchemaError> {
        self.array().map(u32::from_le_bytes)
    }

    fn u64(&mut self) -> Result<u64, SchemaError> {
        self.array().map(u64::from_le_bytes)
    }
}
