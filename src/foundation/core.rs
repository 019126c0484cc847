use crate::foundation::error::{DualFrameError, DualFrameResult};
use crate::foundation::math::mul_div255_u8;

/// Bytes per RGBA8 pixel.
pub const BYTES_PER_PIXEL: usize = 4;

/// Source frame dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a validated, non-empty size.
    pub fn new(width: u32, height: u32) -> DualFrameResult<Self> {
        if width == 0 || height == 0 {
            return Err(DualFrameError::validation(format!(
                "frame dimensions must be non-zero, got {width}x{height}"
            )));
        }
        if width > u32::MAX / 2 {
            return Err(DualFrameError::validation(format!(
                "frame width {width} is too large for a dual-channel composite"
            )));
        }
        let dims = Self { width, height };
        if dims.composite_byte_len().is_none() {
            return Err(DualFrameError::validation(format!(
                "frame dimensions {width}x{height} overflow the addressable size"
            )));
        }
        Ok(dims)
    }

    /// Source buffer length (`W * H * 4`).
    pub fn byte_len(self) -> usize {
        (self.width as usize)
            .saturating_mul(self.height as usize)
            .saturating_mul(BYTES_PER_PIXEL)
    }

    /// Width of the dual-channel composite (`2 * W`).
    pub fn composite_width(self) -> u32 {
        self.width.saturating_mul(2)
    }

    /// Composite buffer length (`2W * H * 4`), `None` on overflow.
    pub fn composite_byte_len(self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(2)?
            .checked_mul(self.height as usize)?
            .checked_mul(BYTES_PER_PIXEL)
    }

    /// Total pixel count of the composite image.
    pub fn composite_pixels(self) -> u64 {
        u64::from(self.width) * 2 * u64::from(self.height)
    }
}

/// Which half of the composite carries straight color.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum ChannelMode {
    /// Color on the left half, alpha grayscale on the right.
    #[default]
    #[serde(alias = "color-left-alpha-right")]
    ColorLeft,
    /// Alpha grayscale on the left half, color on the right.
    #[serde(alias = "alpha-left-color-right")]
    AlphaLeft,
}

impl ChannelMode {
    /// Return `true` when the color half is on the left.
    pub fn is_color_left(self) -> bool {
        matches!(self, Self::ColorLeft)
    }

    /// Stable string name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ColorLeft => "color-left",
            Self::AlphaLeft => "alpha-left",
        }
    }
}

impl std::fmt::Display for ChannelMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChannelMode {
    type Err = DualFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "color-left" | "color-left-alpha-right" => Ok(Self::ColorLeft),
            "alpha-left" | "alpha-left-color-right" => Ok(Self::AlphaLeft),
            other => Err(DualFrameError::validation(format!(
                "unsupported channel mode '{other}' (expected 'color-left' or 'alpha-left')"
            ))),
        }
    }
}

/// One input animation frame: RGBA8, row-major, **premultiplied** alpha.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major, premultiplied.
    pub data: Vec<u8>,
}

impl Frame {
    /// Create a frame, checking that `data` holds exactly `W * H * 4` bytes.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> DualFrameResult<Self> {
        let dims = Dimensions::new(width, height)?;
        if data.len() != dims.byte_len() {
            return Err(DualFrameError::validation(format!(
                "frame data is {} bytes, expected {} for {width}x{height} RGBA",
                data.len(),
                dims.byte_len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Create a frame from straight-alpha RGBA8, premultiplying every pixel.
    pub fn from_straight_rgba(width: u32, height: u32, mut data: Vec<u8>) -> DualFrameResult<Self> {
        for px in data.chunks_exact_mut(BYTES_PER_PIXEL) {
            let a = u16::from(px[3]);
            px[0] = mul_div255_u8(u16::from(px[0]), a);
            px[1] = mul_div255_u8(u16::from(px[1]), a);
            px[2] = mul_div255_u8(u16::from(px[2]), a);
        }
        Self::new(width, height, data)
    }

    /// A frame filled with one premultiplied RGBA value.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> DualFrameResult<Self> {
        let dims = Dimensions::new(width, height)?;
        let data = rgba
            .iter()
            .copied()
            .cycle()
            .take(dims.byte_len())
            .collect();
        Self::new(width, height, data)
    }

    /// Frame size.
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// Read one pixel. Panics when `(x, y)` is out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        [
            self.data[i],
            self.data[i + 1],
            self.data[i + 2],
            self.data[i + 3],
        ]
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
