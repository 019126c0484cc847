use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::compose::scheduler::DEFAULT_BLOCK_SIZE;
use crate::encode::png_opt::DEFAULT_PNG_LEVEL;
use crate::encode::still::OutputFormat;
use crate::foundation::core::ChannelMode;
use crate::foundation::error::{DualFrameError, DualFrameResult};
use crate::memory::pool::PoolOpts;
use crate::worker::pool::{WorkerPoolOpts, default_worker_count};
use crate::worker::task::DEFAULT_CHUNK_SIZE;

/// Frames per dispatched batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;
/// Encoded frames between cooperative yields.
pub const DEFAULT_YIELD_EVERY: usize = 10;

/// Engine-wide defaults for a [`crate::Composer`].
///
/// Every field has a default, so a JSON file only needs the keys it changes.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComposerConfig {
    /// Channel layout used when a call does not choose one.
    pub mode: ChannelMode,
    /// Output format used when a call does not choose one.
    pub format: OutputFormat,
    /// JPEG quality used when a call does not choose one. `None` is adaptive.
    pub quality: Option<u8>,
    /// Worker thread count.
    pub workers: usize,
    /// Frames per dispatched batch.
    pub batch_size: usize,
    /// Frames per progress chunk inside a worker.
    pub chunk_size: usize,
    /// Block edge in pixels.
    pub block_size: u32,
    /// Run blocks of one frame on an inner rayon pool per worker.
    pub parallel_blocks: bool,
    /// Threads per inner pool. `None` uses rayon defaults.
    pub block_threads: Option<usize>,
    /// Encoded frames between cooperative yields. Zero disables yielding.
    pub yield_every: usize,
    /// Compose and encode byte-identical input frames once.
    pub elide_duplicate_frames: bool,
    /// Effort hint for the PNG optimizer.
    pub png_level: u8,
    /// Per-worker buffer pool limits.
    pub pool: PoolOpts,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            mode: ChannelMode::default(),
            format: OutputFormat::default(),
            quality: None,
            workers: default_worker_count(),
            batch_size: DEFAULT_BATCH_SIZE,
            chunk_size: DEFAULT_CHUNK_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            parallel_blocks: false,
            block_threads: None,
            yield_every: DEFAULT_YIELD_EVERY,
            elide_duplicate_frames: false,
            png_level: DEFAULT_PNG_LEVEL,
            pool: PoolOpts::default(),
        }
    }
}

impl ComposerConfig {
    /// Parse a config from a JSON reader and validate it.
    pub fn from_reader<R: std::io::Read>(r: R) -> DualFrameResult<Self> {
        let cfg: Self = serde_json::from_reader(r)
            .map_err(|e| DualFrameError::config(format!("parse composer config JSON: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse a config from a JSON string and validate it.
    pub fn from_json_str(s: &str) -> DualFrameResult<Self> {
        Self::from_reader(s.as_bytes())
    }

    /// Parse a config from a JSON file on disk and validate it.
    pub fn from_path(path: impl AsRef<Path>) -> DualFrameResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            DualFrameError::config(format!("open composer config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> DualFrameResult<()> {
        if self.workers == 0 {
            return Err(DualFrameError::config("'workers' must be >= 1"));
        }
        if self.batch_size == 0 {
            return Err(DualFrameError::config("'batch_size' must be >= 1"));
        }
        if self.chunk_size == 0 {
            return Err(DualFrameError::config("'chunk_size' must be >= 1"));
        }
        if self.block_size == 0 {
            return Err(DualFrameError::config("'block_size' must be >= 1"));
        }
        if self.block_threads == Some(0) {
            return Err(DualFrameError::config("'block_threads' must be >= 1 when set"));
        }
        if let Some(q) = self.quality
            && !(1..=100).contains(&q)
        {
            return Err(DualFrameError::config(format!(
                "'quality' must be in 1..=100, got {q}"
            )));
        }
        if !self.pool.min_bucket_len.is_power_of_two() {
            return Err(DualFrameError::config(
                "'pool.min_bucket_len' must be a power of two",
            ));
        }
        Ok(())
    }

    /// Worker pool options derived from this config.
    pub fn worker_pool_opts(&self) -> WorkerPoolOpts {
        WorkerPoolOpts {
            workers: self.workers,
            block_size: self.block_size,
            parallel_blocks: self.parallel_blocks,
            block_threads: self.block_threads,
            chunk_size: self.chunk_size,
            pool: self.pool,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
