//! Per-pixel math: un-premultiply, dual-channel packing and black-background flattening.
//!
//! Everything here is pure. The block scheduler owns buffers and offsets; this module only
//! computes values and writes them where it is told to.

use crate::foundation::core::{BYTES_PER_PIXEL, ChannelMode, Frame};
use crate::foundation::math::{div_alpha_round_u8, mul_div255_u8};

/// Recover straight color from a premultiplied RGBA8 pixel. Alpha is passed through.
///
/// `a == 0` yields black, `a == 255` is the identity, anything in between is
/// `min(255, round(c * 255 / a))`. Low alphas amplify quantization error; that loss is part of
/// the format and is kept bit-exact.
#[inline]
pub fn unpremultiply(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = px;
    match a {
        0 => [0, 0, 0, 0],
        255 => px,
        _ => [
            div_alpha_round_u8(r, a),
            div_alpha_round_u8(g, a),
            div_alpha_round_u8(b, a),
            a,
        ],
    }
}

/// The grayscale alpha-half pixel for a source alpha.
#[inline]
pub fn alpha_pixel(a: u8) -> [u8; 4] {
    [a, a, a, 255]
}

/// Composite one straight-color pixel over opaque black. The result is always opaque.
#[inline]
pub fn flatten_pixel(px: [u8; 4]) -> [u8; 4] {
    let [r, g, b, a] = px;
    match a {
        255 => [r, g, b, 255],
        0 => [0, 0, 0, 255],
        _ => {
            let a = u16::from(a);
            [
                mul_div255_u8(u16::from(r), a),
                mul_div255_u8(u16::from(g), a),
                mul_div255_u8(u16::from(b), a),
                255,
            ]
        }
    }
}

/// Split a premultiplied source pixel into its `(color, alpha)` composite pixels.
#[inline]
pub fn split_pixel(src: [u8; 4]) -> ([u8; 4], [u8; 4]) {
    (unpremultiply(src), alpha_pixel(src[3]))
}

/// Arrange `(color, alpha)` into `(left, right)` for a channel mode.
#[inline]
pub fn arrange(mode: ChannelMode, color: [u8; 4], alpha: [u8; 4]) -> ([u8; 4], [u8; 4]) {
    if mode.is_color_left() {
        (color, alpha)
    } else {
        (alpha, color)
    }
}

/// Both composite pixels produced from one source pixel, plus where they go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransformedPixel {
    /// Straight color with the original alpha.
    pub color: [u8; 4],
    /// `(A, A, A, 255)`.
    pub alpha: [u8; 4],
    /// Placement of the two halves.
    pub mode: ChannelMode,
}

impl TransformedPixel {
    /// Transform one premultiplied source pixel.
    #[inline]
    pub fn from_source(src: [u8; 4], mode: ChannelMode) -> Self {
        let (color, alpha) = split_pixel(src);
        Self { color, alpha, mode }
    }

    /// Pixel for the left half of the composite.
    #[inline]
    pub fn left(&self) -> [u8; 4] {
        arrange(self.mode, self.color, self.alpha).0
    }

    /// Pixel for the right half of the composite.
    #[inline]
    pub fn right(&self) -> [u8; 4] {
        arrange(self.mode, self.color, self.alpha).1
    }

    /// Flattened `(left, right)` pixels.
    #[inline]
    pub fn flattened(&self) -> ([u8; 4], [u8; 4]) {
        (flatten_pixel(self.left()), flatten_pixel(self.right()))
    }
}

/// Transform the source pixel at `(x, y)`. Panics when `(x, y)` is outside the frame.
pub fn transform_pixel(x: u32, y: u32, frame: &Frame, mode: ChannelMode) -> TransformedPixel {
    TransformedPixel::from_source(frame.pixel(x, y), mode)
}

/// Write one source pixel into composite and flattened buffers.
///
/// `left` and `right` are byte offsets of the two destination pixels inside `composite`;
/// `flattened` uses the same offsets. Callers guarantee the offsets are in bounds.
#[inline]
pub(crate) fn write_pixel(
    src: [u8; 4],
    mode: ChannelMode,
    left: usize,
    right: usize,
    composite: &mut [u8],
    flattened: &mut [u8],
) {
    let px = TransformedPixel::from_source(src, mode);
    let (l, r) = (px.left(), px.right());
    let (fl, fr) = (flatten_pixel(l), flatten_pixel(r));
    composite[left..left + BYTES_PER_PIXEL].copy_from_slice(&l);
    composite[right..right + BYTES_PER_PIXEL].copy_from_slice(&r);
    flattened[left..left + BYTES_PER_PIXEL].copy_from_slice(&fl);
    flattened[right..right + BYTES_PER_PIXEL].copy_from_slice(&fr);
}

#[cfg(test)]
#[path = "../../tests/unit/compose/transform.rs"]
mod tests;
