use super::*;

#[test]
fn mul_div255_variants_align() {
    for x in [0u16, 1, 127, 255] {
        for y in [0u16, 1, 127, 255] {
            assert_eq!(u16::from(mul_div255_u8(x, y)), mul_div255_u16(x, y));
        }
    }
}

#[test]
fn mul_div255_matches_float_rounding() {
    for x in 0u16..=255 {
        for y in 0u16..=255 {
            let expected = (f64::from(x) * f64::from(y) / 255.0).round() as u16;
            assert_eq!(mul_div255_u16(x, y), expected, "x={x} y={y}");
        }
    }
}

#[test]
fn div_alpha_matches_float_rounding_with_clamp() {
    for a in 1u8..255 {
        for c in 0u8..=255 {
            let expected = (f64::from(c) * 255.0 / f64::from(a)).round().min(255.0) as u8;
            assert_eq!(div_alpha_round_u8(c, a), expected, "c={c} a={a}");
        }
    }
}

#[test]
fn div_alpha_rounds_half_up() {
    // 1 * 255 / 2 = 127.5
    assert_eq!(div_alpha_round_u8(1, 2), 128);
    assert_eq!(div_alpha_round_u8(128, 128), 255);
}

#[test]
fn round_up_pow2_respects_floor() {
    assert_eq!(round_up_pow2(0, 1024), 1024);
    assert_eq!(round_up_pow2(1, 1024), 1024);
    assert_eq!(round_up_pow2(1024, 1024), 1024);
    assert_eq!(round_up_pow2(1025, 1024), 2048);
    assert_eq!(round_up_pow2(3_000_000, 1024), 4_194_304);
    assert_eq!(round_up_pow2(usize::MAX, 1024), 1usize << (usize::BITS - 1));
}
