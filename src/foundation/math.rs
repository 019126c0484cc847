/// `round(x * y / 255)` for 8-bit channel math.
///
/// Ties cannot occur for integer inputs, so this matches float rounding exactly.
pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

pub(crate) fn mul_div255_u8(x: u16, y: u16) -> u8 {
    mul_div255_u16(x, y) as u8
}

/// `min(255, round(c * 255 / a))` with half-up rounding, for `0 < a < 255`.
///
/// Computed as `floor((2 * 255 * c + a) / (2 * a))` so there is no float drift.
pub(crate) fn div_alpha_round_u8(c: u8, a: u8) -> u8 {
    debug_assert!(a != 0, "alpha must be non-zero");
    let c = u32::from(c);
    let a = u32::from(a);
    ((c * 510 + a) / (a * 2)).min(255) as u8
}

/// Round `n` up to the next power of two, never below `floor`.
///
/// `floor` itself is expected to be a power of two. Saturates at the largest representable
/// power of two instead of overflowing.
pub(crate) fn round_up_pow2(n: usize, floor: usize) -> usize {
    if n <= floor {
        return floor;
    }
    n.checked_next_power_of_two()
        .unwrap_or(1usize << (usize::BITS - 1))
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/math.rs"]
mod tests;
