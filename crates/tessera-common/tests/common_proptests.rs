//! Property-based tests for `tessera-common` foundational types.
//!
//! Covers:
//! - Alignment helpers (`ceil_div`, `align_up`, `align_down`)
//! - `DType` display/parse and serde round-trip
//! - `PlatformLimits` TOML round-trip and validation invariants

use proptest::prelude::*;
use serial_test::serial;
use tessera_common::{DType, PlatformLimits, align_down, align_up, ceil_div};

// ── Alignment helpers ───────────────────────────────────────────────────────

proptest! {
    /// `align_up` is the smallest multiple at or above the value.
    #[test]
    fn prop_align_up_is_tight(value in 0u64..1 << 48, multiple in 1u64..4096) {
        let up = align_up(value, multiple);
        prop_assert_eq!(up % multiple, 0);
        prop_assert!(up >= value);
        prop_assert!(up - value < multiple);
    }

    /// `align_down` is the largest multiple at or below the value.
    #[test]
    fn prop_align_down_is_tight(value in 0u64..1 << 48, multiple in 1u64..4096) {
        let down = align_down(value, multiple);
        prop_assert_eq!(down % multiple, 0);
        prop_assert!(down <= value);
        prop_assert!(value - down < multiple);
    }

    /// `ceil_div(v, d) * d` equals `align_up(v, d)`.
    #[test]
    fn prop_ceil_div_matches_align_up(value in 0u64..1 << 48, divisor in 1u64..4096) {
        prop_assert_eq!(ceil_div(value, divisor) * divisor, align_up(value, divisor));
    }
}

// ── DType ───────────────────────────────────────────────────────────────────

proptest! {
    /// Every dtype survives a JSON round-trip and its width divides a 32-byte block.
    #[test]
    fn prop_dtype_serde_round_trip(dtype in prop::sample::select(DType::ALL.to_vec())) {
        let json = serde_json::to_string(&dtype).unwrap();
        prop_assert_eq!(json.trim_matches('"'), dtype.to_string());
        let back: DType = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back, dtype);
        prop_assert_eq!(32 % dtype.size_bytes(), 0);
    }
}

// ── PlatformLimits ──────────────────────────────────────────────────────────

fn valid_limits() -> impl Strategy<Value = PlatformLimits> {
    (1u32..=128, 5u32..=8, 1u64..=64, 0u64..=1024, prop::option::of(1u64..=256)).prop_map(
        |(core_count, block_shift, scratch_kib, reserved, granule_blocks)| {
            let block_bytes = 1u32 << block_shift;
            PlatformLimits {
                core_count,
                scratch_bytes: scratch_kib * 4096,
                block_bytes,
                reserved_scratch_bytes: reserved,
                core_granule_bytes: granule_blocks.map(|n| n * u64::from(block_bytes)),
            }
        },
    )
}

proptest! {
    /// Valid limits survive a TOML round-trip unchanged.
    #[test]
    #[serial(tessera_env)]
    fn prop_limits_toml_round_trip(limits in valid_limits()) {
        prop_assert!(limits.validate().is_ok());
        let toml_str = limits.to_toml().unwrap();
        let parsed = temp_env::with_vars(
            [
                ("TESSERA_PLATFORM_CORE_COUNT", None::<&str>),
                ("TESSERA_PLATFORM_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_BLOCK_BYTES", None),
                ("TESSERA_PLATFORM_RESERVED_SCRATCH_BYTES", None),
                ("TESSERA_PLATFORM_CORE_GRANULE_BYTES", None),
            ],
            || PlatformLimits::from_toml(&toml_str),
        )
        .unwrap();
        prop_assert_eq!(parsed, limits);
    }

    /// Usable scratch never exceeds the raw scratch size.
    #[test]
    fn prop_usable_scratch_bounded(limits in valid_limits()) {
        prop_assert!(limits.usable_scratch_bytes() <= limits.scratch_bytes);
        prop_assert!(limits.usable_scratch_bytes() > 0);
    }

    /// A block size that is not a power of two always fails validation.
    #[test]
    fn prop_non_power_of_two_block_rejected(block in 1u32..=4096) {
        prop_assume!(!block.is_power_of_two());
        let limits = PlatformLimits { block_bytes: block, ..Default::default() };
        prop_assert!(limits.validate().is_err());
    }
}
