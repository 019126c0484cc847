use rayon::prelude::*;

use crate::compose::transform::write_pixel;
use crate::foundation::core::{BYTES_PER_PIXEL, ChannelMode, Frame};
use crate::foundation::error::{DualFrameError, DualFrameResult};
use crate::memory::pool::BytePool;

/// Default block edge in pixels.
pub const DEFAULT_BLOCK_SIZE: u32 = 128;

/// A rectangular tile of a frame. Scheduling unit only; owns no data.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Block {
    /// Left edge in source pixels.
    pub x: u32,
    /// Top edge in source pixels.
    pub y: u32,
    /// Width, at most the block size.
    pub width: u32,
    /// Height, at most the block size.
    pub height: u32,
}

/// Dual-channel composite: `2W x H` RGBA8, straight color in one half, alpha gray in the other.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompositeBuffer {
    /// Composite width (`2 * W`).
    pub width: u32,
    /// Composite height (`H`).
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

/// The composite flattened over opaque black. Alpha is 255 everywhere.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlattenedBuffer {
    /// Composite width (`2 * W`).
    pub width: u32,
    /// Composite height (`H`).
    pub height: u32,
    /// RGBA8 bytes, tightly packed, row-major.
    pub data: Vec<u8>,
}

macro_rules! impl_pixel_access {
    ($ty:ty) => {
        impl $ty {
            /// Read one RGBA pixel. Panics when `(x, y)` is out of bounds.
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
    };
}

impl_pixel_access!(CompositeBuffer);
impl_pixel_access!(FlattenedBuffer);

/// Row-major tiling of a `width x height` frame. Edge blocks are clipped to the frame.
///
/// A `block_size` of zero is treated as one.
pub fn partition(width: u32, height: u32, block_size: u32) -> Vec<Block> {
    let bs = block_size.max(1);
    let mut out =
        Vec::with_capacity((width.div_ceil(bs) as usize).saturating_mul(height.div_ceil(bs) as usize));
    for y in (0..height).step_by(bs as usize) {
        for x in (0..width).step_by(bs as usize) {
            out.push(Block {
                x,
                y,
                width: bs.min(width - x),
                height: bs.min(height - y),
            });
        }
    }
    out
}

/// Run the blocks in exactly the given order, single-threaded.
///
/// Blocks never overlap, so every order writes the same bytes. Blocks outside the frame are
/// rejected before anything is written.
pub fn process_blocks_in_order(
    frame: &Frame,
    mode: ChannelMode,
    blocks: &[Block],
    composite: &mut [u8],
    flattened: &mut [u8],
) -> DualFrameResult<()> {
    check_buffers(frame, composite, flattened)?;
    for block in blocks {
        let in_bounds = block.x.checked_add(block.width).is_some_and(|r| r <= frame.width)
            && block.y.checked_add(block.height).is_some_and(|b| b <= frame.height);
        if !in_bounds {
            return Err(DualFrameError::validation(format!(
                "block {block:?} exceeds frame {}x{}",
                frame.width, frame.height
            )));
        }
    }
    for block in blocks {
        process_block(frame, mode, *block, 0, composite, flattened);
    }
    Ok(())
}

fn check_buffers(frame: &Frame, composite: &[u8], flattened: &[u8]) -> DualFrameResult<()> {
    let dims = frame.dimensions();
    if dims.width == 0 || dims.height == 0 {
        return Err(DualFrameError::validation("frame has zero width or height"));
    }
    if frame.data.len() != dims.byte_len() {
        return Err(DualFrameError::validation(format!(
            "frame buffer is {} bytes, expected {} for {}x{} RGBA",
            frame.data.len(),
            dims.byte_len(),
            dims.width,
            dims.height
        )));
    }
    let want = dims
        .composite_byte_len()
        .ok_or_else(|| DualFrameError::validation("composite size overflows"))?;
    if composite.len() != want || flattened.len() != want {
        return Err(DualFrameError::validation(format!(
            "composite buffers must be {want} bytes, got {} and {}",
            composite.len(),
            flattened.len()
        )));
    }
    Ok(())
}

/// Transform every pixel of `block`.
///
/// `composite` and `flattened` start at source row `band_y`; the full buffers use `band_y == 0`.
fn process_block(
    frame: &Frame,
    mode: ChannelMode,
    block: Block,
    band_y: u32,
    composite: &mut [u8],
    flattened: &mut [u8],
) {
    let w = frame.width as usize;
    let src_stride = w * BYTES_PER_PIXEL;
    let dst_stride = src_stride * 2;
    for y in block.y..block.y + block.height {
        let src_row = y as usize * src_stride;
        let dst_row = (y - band_y) as usize * dst_stride;
        for x in block.x as usize..(block.x + block.width) as usize {
            let s = src_row + x * BYTES_PER_PIXEL;
            let src = [
                frame.data[s],
                frame.data[s + 1],
                frame.data[s + 2],
                frame.data[s + 3],
            ];
            let left = dst_row + x * BYTES_PER_PIXEL;
            let right = dst_row + (x + w) * BYTES_PER_PIXEL;
            write_pixel(src, mode, left, right, composite, flattened);
        }
    }
}

/// Drives the pixel transform over a frame block by block.
///
/// Sequential by default. With an inner thread pool, each horizontal band of blocks becomes a
/// disjoint `&mut` slice of both outputs and bands run on rayon.
pub struct BlockScheduler {
    block_size: u32,
    threads: Option<rayon::ThreadPool>,
}

impl std::fmt::Debug for BlockScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockScheduler")
            .field("block_size", &self.block_size)
            .field(
                "threads",
                &self.threads.as_ref().map(rayon::ThreadPool::current_num_threads),
            )
            .finish()
    }
}

impl BlockScheduler {
    /// Sequential scheduler.
    pub fn new(block_size: u32) -> Self {
        Self {
            block_size: block_size.max(1),
            threads: None,
        }
    }

    /// Scheduler with its own rayon pool. `threads == None` uses rayon defaults.
    pub fn parallel(block_size: u32, threads: Option<usize>) -> DualFrameResult<Self> {
        Ok(Self {
            block_size: block_size.max(1),
            threads: Some(build_thread_pool(threads)?),
        })
    }

    /// Block edge in pixels.
    pub fn block_size(&self) -> u32 {
        self.block_size
    }

    /// Return `true` when blocks run on an inner thread pool.
    pub fn is_parallel(&self) -> bool {
        self.threads.is_some()
    }

    /// Compose `frame` into caller-provided buffers of exactly `2W * H * 4` bytes each.
    pub fn process_into(
        &self,
        frame: &Frame,
        mode: ChannelMode,
        composite: &mut [u8],
        flattened: &mut [u8],
    ) -> DualFrameResult<()> {
        check_buffers(frame, composite, flattened)?;
        let blocks = partition(frame.width, frame.height, self.block_size);

        let Some(pool) = self.threads.as_ref() else {
            for block in &blocks {
                process_block(frame, mode, *block, 0, composite, flattened);
            }
            return Ok(());
        };

        let blocks_per_band = frame.width.div_ceil(self.block_size) as usize;
        let band_bytes = self.block_size as usize * frame.width as usize * 2 * BYTES_PER_PIXEL;
        let block_size = self.block_size;
        pool.install(|| {
            composite
                .par_chunks_mut(band_bytes)
                .zip(flattened.par_chunks_mut(band_bytes))
                .zip(blocks.par_chunks(blocks_per_band))
                .enumerate()
                .for_each(|(band, ((c, f), band_blocks))| {
                    let band_y = band as u32 * block_size;
                    for block in band_blocks {
                        process_block(frame, mode, *block, band_y, c, f);
                    }
                });
        });
        Ok(())
    }

    /// Compose one frame using pool buffers and copy both results out.
    pub fn process_frame(
        &self,
        frame: &Frame,
        mode: ChannelMode,
        pool: &mut BytePool,
    ) -> DualFrameResult<(CompositeBuffer, FlattenedBuffer)> {
        let (composite, flattened) = self.process_pooled(frame, mode, pool, true)?;
        match composite {
            Some(composite) => Ok((composite, flattened)),
            None => Err(DualFrameError::validation("composite buffer was not kept")),
        }
    }

    /// Compose one frame and keep only the flattened result.
    pub fn process_frame_flattened(
        &self,
        frame: &Frame,
        mode: ChannelMode,
        pool: &mut BytePool,
    ) -> DualFrameResult<FlattenedBuffer> {
        self.process_pooled(frame, mode, pool, false)
            .map(|(_, flattened)| flattened)
    }

    pub(crate) fn process_pooled(
        &self,
        frame: &Frame,
        mode: ChannelMode,
        pool: &mut BytePool,
        keep_composite: bool,
    ) -> DualFrameResult<(Option<CompositeBuffer>, FlattenedBuffer)> {
        let dims = frame.dimensions();
        let len = dims
            .composite_byte_len()
            .ok_or_else(|| DualFrameError::validation("composite size overflows"))?;

        let mut composite = pool.acquire(len);
        let mut flattened = pool.acquire(len);
        // Pool buffers never leave this function; results are copied out before release.
        let res = self.process_into(frame, mode, &mut composite, &mut flattened);
        let out = res.map(|()| {
            let width = dims.composite_width();
            (
                keep_composite.then(|| CompositeBuffer {
                    width,
                    height: dims.height,
                    data: composite.to_vec(),
                }),
                FlattenedBuffer {
                    width,
                    height: dims.height,
                    data: flattened.to_vec(),
                },
            )
        });
        pool.release(composite);
        pool.release(flattened);
        out
    }
}

impl Default for BlockScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE)
    }
}

pub(crate) fn build_thread_pool(threads: Option<usize>) -> DualFrameResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(DualFrameError::validation(
            "block threads must be >= 1 when set",
        ));
    }
    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| DualFrameError::pool(format!("failed to build rayon thread pool: {e}")))
}

#[cfg(test)]
#[path = "../../tests/unit/compose/scheduler.rs"]
mod tests;
