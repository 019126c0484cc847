use anyhow::Context;
use image::ImageEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

use crate::compose::scheduler::FlattenedBuffer;
use crate::foundation::core::{BYTES_PER_PIXEL, Dimensions};
use crate::foundation::error::{DualFrameError, DualFrameResult};

/// Composite pixel count below which the lossy path uses its highest default quality.
pub const SMALL_COMPOSITE_PIXELS: u64 = 500_000;
/// Composite pixel count above which the lossy path uses its lowest default quality.
pub const LARGE_COMPOSITE_PIXELS: u64 = 2_000_000;

/// Still-image format of an encoded composite.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// JPEG, lossy.
    #[default]
    #[serde(alias = "lossy", alias = "jpg")]
    Jpeg,
    /// PNG, lossless.
    #[serde(alias = "lossless")]
    Png,
}

impl OutputFormat {
    /// Return `true` for PNG.
    pub fn is_lossless(self) -> bool {
        matches!(self, Self::Png)
    }

    /// File extension without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        })
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = DualFrameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" | "lossy" => Ok(Self::Jpeg),
            "png" | "lossless" => Ok(Self::Png),
            other => Err(DualFrameError::validation(format!(
                "unsupported output format '{other}' (expected 'jpeg' or 'png')"
            ))),
        }
    }
}

/// One encoded composite, `2W x H`, opaque.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedFrame {
    /// Composite width (`2 * W`).
    pub width: u32,
    /// Composite height.
    pub height: u32,
    /// Container format of `bytes`.
    pub format: OutputFormat,
    /// Encoded file bytes.
    pub bytes: Vec<u8>,
}

/// Default JPEG quality for a source size, judged on the composite pixel count.
pub fn adaptive_quality(dims: Dimensions) -> u8 {
    let pixels = dims.composite_pixels();
    if pixels < SMALL_COMPOSITE_PIXELS {
        70
    } else if pixels > LARGE_COMPOSITE_PIXELS {
        50
    } else {
        60
    }
}

/// Check an explicit quality or fall back to [`adaptive_quality`].
pub fn resolve_quality(explicit: Option<u8>, dims: Dimensions) -> DualFrameResult<u8> {
    match explicit {
        Some(q) if (1..=100).contains(&q) => Ok(q),
        Some(q) => Err(DualFrameError::validation(format!(
            "quality must be in 1..=100, got {q}"
        ))),
        None => Ok(adaptive_quality(dims)),
    }
}

/// Drop the alpha byte of every pixel. Flattened buffers are opaque.
pub(crate) fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(rgba.len() / BYTES_PER_PIXEL * 3);
    for px in rgba.chunks_exact(BYTES_PER_PIXEL) {
        out.extend_from_slice(&px[..3]);
    }
    out
}

/// Encode a flattened composite as an RGB still image.
///
/// `quality` only affects JPEG.
pub fn encode_flattened(
    buf: &FlattenedBuffer,
    format: OutputFormat,
    quality: u8,
) -> anyhow::Result<EncodedFrame> {
    let expected = (buf.width as usize)
        .saturating_mul(buf.height as usize)
        .saturating_mul(BYTES_PER_PIXEL);
    anyhow::ensure!(
        buf.data.len() == expected,
        "flattened buffer is {} bytes, expected {expected} for {}x{}",
        buf.data.len(),
        buf.width,
        buf.height
    );

    let rgb = rgba_to_rgb(&buf.data);
    let mut bytes = Vec::new();
    match format {
        OutputFormat::Jpeg => {
            JpegEncoder::new_with_quality(&mut bytes, quality)
                .encode(&rgb, buf.width, buf.height, image::ExtendedColorType::Rgb8)
                .context("encode jpeg")?;
        }
        OutputFormat::Png => {
            PngEncoder::new_with_quality(&mut bytes, CompressionType::Default, FilterType::Adaptive)
                .write_image(&rgb, buf.width, buf.height, image::ExtendedColorType::Rgb8)
                .context("encode png")?;
        }
    }

    Ok(EncodedFrame {
        width: buf.width,
        height: buf.height,
        format,
        bytes,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/encode/still.rs"]
mod tests;
