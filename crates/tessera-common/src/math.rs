//! Integer helpers for block alignment.
//!
//! All helpers treat a zero divisor / multiple as "no alignment" and return
//! the input unchanged rather than panicking; callers that require a non-zero
//! granularity validate it first and report [`crate::PlanError`].

/// Ceiling division. Returns `value` when `divisor` is zero.
#[inline]
pub const fn ceil_div(value: u64, divisor: u64) -> u64 {
    if divisor == 0 {
        return value;
    }
    value / divisor + (value % divisor != 0) as u64
}

/// Round `value` up to the next multiple of `multiple`.
#[inline]
pub const fn align_up(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return value;
    }
    ceil_div(value, multiple) * multiple
}

/// Round `value` down to a multiple of `multiple`.
#[inline]
pub const fn align_down(value: u64, multiple: u64) -> u64 {
    if multiple == 0 {
        return value;
    }
    value / multiple * multiple
}

/// Checked variant of [`align_up`]; `None` when the result overflows `u64`.
#[inline]
pub fn checked_align_up(value: u64, multiple: u64) -> Option<u64> {
    if multiple == 0 {
        return Some(value);
    }
    ceil_div(value, multiple).checked_mul(multiple)
}
