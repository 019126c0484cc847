use std::panic::{AssertUnwindSafe, catch_unwind};

use crate::compose::scheduler::{BlockScheduler, CompositeBuffer, FlattenedBuffer};
use crate::foundation::core::Frame;
use crate::memory::pool::BytePool;
use crate::worker::protocol::{
    ProgressThrottle, TaskFailure, TaskKind, TaskOutput, TaskRequest, TaskStatus,
};

/// Default number of frames processed between progress checks.
pub const DEFAULT_CHUNK_SIZE: usize = 20;

/// Everything a single worker owns: its scheduler and its private buffer pool.
#[derive(Debug)]
pub(crate) struct WorkerState {
    pub(crate) id: usize,
    pool: BytePool,
    scheduler: BlockScheduler,
    chunk_size: usize,
}

impl WorkerState {
    pub(crate) fn new(
        id: usize,
        pool: BytePool,
        scheduler: BlockScheduler,
        chunk_size: usize,
    ) -> Self {
        Self {
            id,
            pool,
            scheduler,
            chunk_size: chunk_size.max(1),
        }
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &BytePool {
        &self.pool
    }

    /// Run one request to completion and return its terminal status.
    ///
    /// `progress` receives whole percentages for batches, at most once per 5% step.
    pub(crate) fn handle(&mut self, req: TaskRequest, progress: &mut dyn FnMut(u8)) -> TaskStatus {
        match req.kind {
            TaskKind::ClearMemory => {
                self.pool.clear();
                tracing::debug!(worker = self.id, "worker pool cleared");
                TaskStatus::Result(TaskOutput::Cleared)
            }
            TaskKind::ComposeSingle => self.compose_single(&req),
            TaskKind::ComposeBatch => self.compose_batch(&req, progress),
        }
    }

    fn compose_single(&mut self, req: &TaskRequest) -> TaskStatus {
        let [frame] = req.frames.as_slice() else {
            return TaskStatus::Error(TaskFailure {
                frame_index: req.index_of(0),
                message: format!(
                    "single-frame request carries {} frames",
                    req.frames.len()
                ),
            });
        };
        match self.compose_one(req, 0, frame, true) {
            Ok((Some(composite), flattened)) => TaskStatus::Result(TaskOutput::Single {
                composite,
                flattened,
            }),
            Ok((None, _)) => TaskStatus::Error(TaskFailure {
                frame_index: req.index_of(0),
                message: "composite buffer was not produced".to_owned(),
            }),
            Err(failure) => TaskStatus::Error(failure),
        }
    }

    fn compose_batch(&mut self, req: &TaskRequest, progress: &mut dyn FnMut(u8)) -> TaskStatus {
        let total = req.frames.len();
        let mut flattened = Vec::with_capacity(total);
        let mut composites = req.keep_composite.then(|| Vec::with_capacity(total));
        let mut throttle = ProgressThrottle::default();

        for (chunk_idx, chunk) in req.frames.chunks(self.chunk_size).enumerate() {
            let base = chunk_idx * self.chunk_size;
            for (i, frame) in chunk.iter().enumerate() {
                match self.compose_one(req, base + i, frame, req.keep_composite) {
                    Ok((composite, flat)) => {
                        flattened.push(flat);
                        if let (Some(out), Some(c)) = (composites.as_mut(), composite) {
                            out.push(c);
                        }
                    }
                    Err(failure) => {
                        tracing::debug!(
                            worker = self.id,
                            frame_index = failure.frame_index,
                            "batch aborted"
                        );
                        return TaskStatus::Error(failure);
                    }
                }
            }
            if let Some(p) = throttle.update(base + chunk.len(), total) {
                progress(p);
            }
        }

        TaskStatus::Result(TaskOutput::Batch {
            flattened,
            composites,
        })
    }

    fn compose_one(
        &mut self,
        req: &TaskRequest,
        pos: usize,
        frame: &Frame,
        keep_composite: bool,
    ) -> Result<(Option<CompositeBuffer>, FlattenedBuffer), TaskFailure> {
        let frame_index = req.index_of(pos);
        if frame.dimensions() != req.dimensions {
            return Err(TaskFailure {
                frame_index,
                message: format!(
                    "frame is {}x{}, request expects {}x{}",
                    frame.width, frame.height, req.dimensions.width, req.dimensions.height
                ),
            });
        }

        let scheduler = &self.scheduler;
        let pool = &mut self.pool;
        let res = catch_unwind(AssertUnwindSafe(|| {
            scheduler.process_pooled(frame, req.mode, pool, keep_composite)
        }));
        match res {
            Ok(Ok(out)) => Ok(out),
            Ok(Err(e)) => Err(TaskFailure {
                frame_index,
                message: e.to_string(),
            }),
            Err(payload) => Err(TaskFailure {
                frame_index,
                message: format!("worker panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/task.rs"]
mod tests;
