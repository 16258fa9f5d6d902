//! Parity with the accumulator-style cursor walk used by earlier elementwise
//! kernels.
//!
//! That walk tracks elements assigned to the current core and closes a core
//! once the accumulator reaches its quota, patching the last core's end if
//! the accumulator is still non-zero when tensors run out. On lists where
//! every tensor is already block-aligned and non-empty it must agree with
//! [`CorePartitioner`] boundary for boundary.

use proptest::prelude::*;
use tessera_common::ceil_div;
use tessera_tiling::{AlignedSizeList, CorePartitioner};

type Bounds = (usize, u64, usize, u64);

fn accumulator_walk(counts: &[u64], block: u64, cores: u64) -> Vec<Bounds> {
    let total: u64 = counts.iter().sum();
    let blocks = ceil_div(total, block);
    let cores = cores.min(blocks).max(1);
    let per_core = blocks / cores * block;
    let remainder = blocks % cores;

    let mut starts = vec![(0usize, 0u64)];
    let mut ends = Vec::new();
    let (mut core, mut assigned, mut cursor) = (0u64, 0u64, 0u64);
    let mut i = 0usize;
    while i < counts.len() {
        let quota = if core < remainder { per_core + block } else { per_core };
        let available = counts[i] - cursor;
        if assigned + available < quota {
            assigned += available;
            cursor = 0;
            i += 1;
            continue;
        }
        cursor = cursor + quota - assigned;
        ends.push((i, cursor - 1));
        assigned = 0;
        core += 1;
        if cursor < counts[i] {
            starts.push((i, cursor));
        } else {
            if core != cores {
                starts.push((i + 1, 0));
            }
            cursor = 0;
            i += 1;
        }
    }
    if assigned != 0 {
        ends.push((counts.len() - 1, counts[counts.len() - 1] - 1));
    }
    starts.into_iter().zip(ends).map(|((st, so), (et, eo))| (st, so, et, eo)).collect()
}

fn partitioner_walk(counts: &[u64], element_bytes: u32, cores: u32) -> Vec<Bounds> {
    let sizes = AlignedSizeList::from_raw_counts(counts, element_bytes, 32).unwrap();
    let plan = CorePartitioner::new(cores).partition(&sizes).unwrap();
    plan.ranges()
        .iter()
        .map(|r| (r.start_tensor, r.start_offset, r.end_tensor, r.end_offset))
        .collect()
}

#[test]
fn fixture_three_tensor_list() {
    let counts = [8192, 2048, 4096];
    assert_eq!(accumulator_walk(&counts, 8, 4), partitioner_walk(&counts, 4, 4));
}

#[test]
fn fixture_exact_tensor_boundaries() {
    let counts = [256, 256, 256, 256];
    assert_eq!(accumulator_walk(&counts, 16, 4), partitioner_walk(&counts, 2, 4));
    assert_eq!(accumulator_walk(&counts, 16, 2), partitioner_walk(&counts, 2, 2));
}

#[test]
fn fixture_more_cores_than_blocks() {
    let counts = [32, 64];
    assert_eq!(accumulator_walk(&counts, 32, 48), partitioner_walk(&counts, 1, 48));
}

#[test]
fn fixture_uneven_remainder() {
    let counts = [40, 8, 120, 16];
    assert_eq!(accumulator_walk(&counts, 8, 7), partitioner_walk(&counts, 4, 7));
}

proptest! {
    #[test]
    fn walks_agree_on_aligned_lists(
        blocks in prop::collection::vec(1u64..500, 1..30),
        eb in prop::sample::select(vec![1u32, 2, 4, 8]),
        cores in 1u32..=64,
    ) {
        let block = u64::from(32 / eb);
        let counts: Vec<u64> = blocks.iter().map(|b| b * block).collect();
        prop_assert_eq!(
            accumulator_walk(&counts, block, u64::from(cores)),
            partitioner_walk(&counts, eb, cores)
        );
    }
}
