use anyhow::Context;
use image::ImageEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};

/// Default optimization level handed to a [`PngOptimizer`].
pub const DEFAULT_PNG_LEVEL: u8 = 2;

/// Post-compression step for encoded PNG files.
pub trait PngOptimizer: Send + Sync {
    /// Return a smaller (or equal) PNG with the same pixels. `level` is an effort hint.
    fn optimize(&self, png: &[u8], level: u8) -> anyhow::Result<Vec<u8>>;
}

/// Decode and re-encode with the `image` PNG encoder.
///
/// Levels above 2 use the slowest compression; anything else uses the default. Filtering is
/// always adaptive.
#[derive(Clone, Copy, Debug, Default)]
pub struct RecompressPng;

impl PngOptimizer for RecompressPng {
    fn optimize(&self, png: &[u8], level: u8) -> anyhow::Result<Vec<u8>> {
        let img = image::load_from_memory_with_format(png, image::ImageFormat::Png)
            .context("decode png for recompression")?;
        let compression = if level > 2 {
            CompressionType::Best
        } else {
            CompressionType::Default
        };
        let mut out = Vec::with_capacity(png.len());
        PngEncoder::new_with_quality(&mut out, compression, FilterType::Adaptive)
            .write_image(img.as_bytes(), img.width(), img.height(), img.color().into())
            .context("re-encode png")?;
        Ok(out)
    }
}

/// Run `optimizer`, keeping the input when it fails.
pub fn optimize_png_or_passthrough(
    optimizer: &dyn PngOptimizer,
    png: Vec<u8>,
    level: u8,
) -> Vec<u8> {
    match optimizer.optimize(&png, level) {
        Ok(optimized) => {
            tracing::trace!(before = png.len(), after = optimized.len(), "png optimized");
            optimized
        }
        Err(e) => {
            tracing::warn!(error = %e, "png optimizer failed, keeping original encoding");
            png
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/encode/png_opt.rs"]
mod tests;
