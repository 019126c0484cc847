use std::collections::{HashMap, VecDeque};

use crate::compose::scheduler::{CompositeBuffer, FlattenedBuffer};
use crate::encode::png_opt::{PngOptimizer, optimize_png_or_passthrough};
use crate::encode::still::{EncodedFrame, OutputFormat, encode_flattened, resolve_quality};
use crate::foundation::core::{ChannelMode, Dimensions, Frame};
use crate::foundation::error::{DualFrameError, DualFrameResult};
use crate::session::config::ComposerConfig;
use crate::session::elision::duplicate_sources;
use crate::session::options::{ComposeOptions, ProgressReporter};
use crate::worker::pool::WorkerPool;
use crate::worker::protocol::{TaskId, TaskOutput, TaskRequest, TaskStatus};

/// Counters for one [`Composer::compose_with_stats`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ComposeStats {
    /// Input frames.
    pub frames_total: u64,
    /// Frames composed by workers.
    pub frames_composed: u64,
    /// Frames that reused the output of an identical earlier frame.
    pub frames_elided: u64,
    /// Total encoded bytes returned.
    pub bytes_out: u64,
    /// Batches dispatched to workers.
    pub batches: u64,
}

/// Settings for one call after merging options over the config.
struct Resolved<'o> {
    mode: ChannelMode,
    format: OutputFormat,
    quality: u8,
    optimizer: Option<&'o dyn PngOptimizer>,
    png_level: u8,
}

impl Resolved<'_> {
    fn encode(&self, frame_index: usize, flat: &FlattenedBuffer) -> DualFrameResult<EncodedFrame> {
        let mut enc = encode_flattened(flat, self.format, self.quality)
            .map_err(|e| DualFrameError::encode(frame_index, format!("{e:#}")))?;
        if self.format.is_lossless()
            && let Some(optimizer) = self.optimizer
        {
            enc.bytes = optimize_png_or_passthrough(
                optimizer,
                std::mem::take(&mut enc.bytes),
                self.png_level,
            );
        }
        Ok(enc)
    }
}

struct PendingBatch {
    indices: Vec<usize>,
    reported: usize,
}

/// Turns premultiplied RGBA frames into encoded dual-channel composites.
///
/// Owns a fixed pool of worker threads for its whole lifetime; dropping the composer shuts the
/// workers down and joins them.
#[derive(Debug)]
pub struct Composer {
    config: ComposerConfig,
    workers: WorkerPool,
}

impl Composer {
    /// Validate `config` and start the workers.
    pub fn new(config: ComposerConfig) -> DualFrameResult<Self> {
        config.validate()?;
        let workers = WorkerPool::new(config.worker_pool_opts())?;
        Ok(Self { config, workers })
    }

    /// Engine-wide defaults.
    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    /// Compose and encode every frame, returning one encoded image per input frame in order.
    ///
    /// After `Cancelled` is returned, batches already dispatched keep their workers busy until
    /// they finish; their results are discarded by the next call.
    pub fn compose(
        &mut self,
        frames: Vec<Frame>,
        opts: ComposeOptions<'_>,
    ) -> DualFrameResult<Vec<EncodedFrame>> {
        self.compose_with_stats(frames, opts).map(|(out, _)| out)
    }

    /// Like [`Composer::compose`], also returning counters.
    #[tracing::instrument(skip_all, fields(frames = frames.len()))]
    pub fn compose_with_stats(
        &mut self,
        frames: Vec<Frame>,
        mut opts: ComposeOptions<'_>,
    ) -> DualFrameResult<(Vec<EncodedFrame>, ComposeStats)> {
        let dims = validate_frames(&frames)?;
        let optimizer = opts.png_optimizer.clone();
        let settings = self.resolve(&opts, optimizer.as_deref(), dims)?;
        let total = frames.len();
        tracing::debug!(
            width = dims.width,
            height = dims.height,
            mode = %settings.mode,
            format = %settings.format,
            quality = settings.quality,
            "compose started"
        );

        let source_of: Vec<usize> = if self.config.elide_duplicate_frames {
            duplicate_sources(&frames)
        } else {
            (0..total).collect()
        };

        let mut stats = ComposeStats {
            frames_total: total as u64,
            ..ComposeStats::default()
        };
        let mut queue = VecDeque::<(Vec<usize>, Vec<Frame>)>::new();
        let mut indices = Vec::new();
        let mut batch = Vec::new();
        for (i, frame) in frames.into_iter().enumerate() {
            if source_of[i] != i {
                stats.frames_elided += 1;
                continue;
            }
            indices.push(i);
            batch.push(frame);
            if batch.len() == self.config.batch_size {
                queue.push_back((std::mem::take(&mut indices), std::mem::take(&mut batch)));
            }
        }
        if !batch.is_empty() {
            queue.push_back((indices, batch));
        }
        let unique = total - stats.frames_elided as usize;

        let mut pending = HashMap::<TaskId, PendingBatch>::new();
        let mut slots: Vec<Option<FlattenedBuffer>> = (0..total).map(|_| None).collect();
        let mut out = Vec::<EncodedFrame>::with_capacity(total);
        let yield_every = self.config.yield_every;
        let mut progress = ProgressReporter::new(opts.on_progress.as_mut(), unique + total);

        loop {
            while !queue.is_empty() {
                let Some(worker) = self.workers.idle_worker() else {
                    break;
                };
                if opts.on_cancel.as_mut().is_some_and(|f| f()) {
                    tracing::debug!(encoded = out.len(), "cancelled before dispatch");
                    return Err(DualFrameError::Cancelled);
                }
                let Some((indices, frames)) = queue.pop_front() else {
                    break;
                };
                let n = frames.len();
                let req = TaskRequest::batch(frames, indices.clone(), settings.mode, dims);
                let task_id = self.workers.submit(worker, req)?;
                tracing::debug!(task_id, worker, frames = n, "batch dispatched");
                pending.insert(
                    task_id,
                    PendingBatch {
                        indices,
                        reported: 0,
                    },
                );
                stats.batches += 1;
            }

            while out.len() < total {
                let i = out.len();
                let src = source_of[i];
                if src == i && slots[i].is_none() {
                    break;
                }
                if opts.on_cancel.as_mut().is_some_and(|f| f()) {
                    tracing::debug!(encoded = i, "cancelled before encode");
                    return Err(DualFrameError::Cancelled);
                }
                let encoded = match slots[i].take() {
                    Some(flat) => settings.encode(i, &flat)?,
                    None => out[src].clone(),
                };
                stats.bytes_out += encoded.bytes.len() as u64;
                out.push(encoded);
                progress.advance(1);
                if yield_every > 0 && out.len() % yield_every == 0 {
                    std::thread::yield_now();
                }
            }
            if out.len() == total {
                break;
            }

            let resp = self.workers.recv()?;
            if !pending.contains_key(&resp.task_id) {
                tracing::debug!(task_id = resp.task_id, "discarding response for stale task");
                continue;
            }
            match resp.status {
                TaskStatus::Progress(percent) => {
                    if let Some(p) = pending.get_mut(&resp.task_id) {
                        let done = usize::from(percent) * p.indices.len() / 100;
                        if done > p.reported {
                            progress.advance(done - p.reported);
                            p.reported = done;
                        }
                    }
                }
                TaskStatus::Error(failure) => {
                    tracing::debug!(
                        task_id = resp.task_id,
                        frame_index = failure.frame_index,
                        "batch failed"
                    );
                    return Err(DualFrameError::worker(failure.frame_index, failure.message));
                }
                TaskStatus::Result(TaskOutput::Batch { flattened, .. }) => {
                    let Some(p) = pending.remove(&resp.task_id) else {
                        continue;
                    };
                    if flattened.len() != p.indices.len() {
                        return Err(DualFrameError::pool(format!(
                            "batch returned {} buffers for {} frames",
                            flattened.len(),
                            p.indices.len()
                        )));
                    }
                    progress.advance(p.indices.len() - p.reported);
                    stats.frames_composed += p.indices.len() as u64;
                    for (idx, buf) in p.indices.into_iter().zip(flattened) {
                        slots[idx] = Some(buf);
                    }
                }
                TaskStatus::Result(_) => {
                    return Err(DualFrameError::pool("unexpected response to a batch request"));
                }
            }
        }

        progress.finish();
        tracing::debug!(
            frames = stats.frames_total,
            elided = stats.frames_elided,
            bytes_out = stats.bytes_out,
            "compose finished"
        );
        Ok((out, stats))
    }

    /// Compose and encode one frame.
    #[tracing::instrument(skip_all, fields(width = frame.width, height = frame.height))]
    pub fn compose_single(
        &mut self,
        frame: Frame,
        mut opts: ComposeOptions<'_>,
    ) -> DualFrameResult<EncodedFrame> {
        let dims = validate_frames(std::slice::from_ref(&frame))?;
        let optimizer = opts.png_optimizer.clone();
        let settings = self.resolve(&opts, optimizer.as_deref(), dims)?;
        if opts.cancelled() {
            return Err(DualFrameError::Cancelled);
        }
        let (_, flattened) = self.run_single(frame, settings.mode)?;

        let mut progress = ProgressReporter::new(opts.on_progress.as_mut(), 2);
        progress.advance(1);
        let encoded = settings.encode(0, &flattened)?;
        progress.finish();
        Ok(encoded)
    }

    /// Compose one frame and return the raw composite and flattened buffers, without encoding.
    pub fn compose_raw(
        &mut self,
        frame: Frame,
        mode: ChannelMode,
    ) -> DualFrameResult<(CompositeBuffer, FlattenedBuffer)> {
        validate_frames(std::slice::from_ref(&frame))?;
        self.run_single(frame, mode)
    }

    /// Drop every buffer retained by the workers' pools.
    pub fn clear_memory(&mut self) -> DualFrameResult<()> {
        self.workers.clear_memory()?;
        tracing::debug!(workers = self.workers.workers(), "worker memory cleared");
        Ok(())
    }

    fn run_single(
        &mut self,
        frame: Frame,
        mode: ChannelMode,
    ) -> DualFrameResult<(CompositeBuffer, FlattenedBuffer)> {
        match self.workers.run(TaskRequest::single(frame, 0, mode))? {
            TaskStatus::Result(TaskOutput::Single {
                composite,
                flattened,
            }) => Ok((composite, flattened)),
            TaskStatus::Error(failure) => {
                Err(DualFrameError::worker(failure.frame_index, failure.message))
            }
            _ => Err(DualFrameError::pool(
                "unexpected response to a single-frame request",
            )),
        }
    }

    fn resolve<'o>(
        &self,
        opts: &ComposeOptions<'_>,
        optimizer: Option<&'o dyn PngOptimizer>,
        dims: Dimensions,
    ) -> DualFrameResult<Resolved<'o>> {
        let format = opts.format.unwrap_or(self.config.format);
        Ok(Resolved {
            mode: opts.mode.unwrap_or(self.config.mode),
            format,
            quality: resolve_quality(opts.quality.or(self.config.quality), dims)?,
            optimizer,
            png_level: self.config.png_level,
        })
    }
}

/// Check that `frames` is non-empty and every frame matches the first one's size and length.
pub(crate) fn validate_frames(frames: &[Frame]) -> DualFrameResult<Dimensions> {
    let Some(first) = frames.first() else {
        return Err(DualFrameError::validation("no frames to compose"));
    };
    let dims = Dimensions::new(first.width, first.height)?;
    for (i, frame) in frames.iter().enumerate() {
        if frame.dimensions() != dims {
            return Err(DualFrameError::validation(format!(
                "frame {i} is {}x{}, expected {}x{}",
                frame.width, frame.height, dims.width, dims.height
            )));
        }
        if frame.data.len() != dims.byte_len() {
            return Err(DualFrameError::validation(format!(
                "frame {i} holds {} bytes, expected {}",
                frame.data.len(),
                dims.byte_len()
            )));
        }
    }
    Ok(dims)
}

#[cfg(test)]
#[path = "../../tests/unit/session/composer.rs"]
mod tests;
