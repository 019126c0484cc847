use crate::compose::scheduler::{CompositeBuffer, FlattenedBuffer};
use crate::foundation::core::{ChannelMode, Dimensions, Frame};

/// Correlation id matching a response to its request.
pub type TaskId = u64;

/// What a request asks the worker to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskKind {
    /// Exactly one frame; both composite and flattened buffers come back.
    ComposeSingle,
    /// Any number of frames; flattened buffers come back in input order.
    ComposeBatch,
    /// Drop every buffer retained by the worker's pool.
    ClearMemory,
}

/// A unit of work shipped to a worker. Frames are moved in, never shared.
#[derive(Debug)]
pub struct TaskRequest {
    /// Correlation id.
    pub task_id: TaskId,
    /// Request kind.
    pub kind: TaskKind,
    /// Source frames, owned by the request.
    pub frames: Vec<Frame>,
    /// Caller-visible index of each frame, used in error reports. Same length as `frames`.
    pub indices: Vec<usize>,
    /// Which half receives color.
    pub mode: ChannelMode,
    /// Dimensions every frame must have.
    pub dimensions: Dimensions,
    /// Return composite buffers from batches too.
    pub keep_composite: bool,
}

impl TaskRequest {
    /// A `ComposeSingle` request. The task id is assigned on submit.
    pub fn single(frame: Frame, index: usize, mode: ChannelMode) -> Self {
        Self {
            task_id: 0,
            kind: TaskKind::ComposeSingle,
            dimensions: frame.dimensions(),
            frames: vec![frame],
            indices: vec![index],
            mode,
            keep_composite: true,
        }
    }

    /// A `ComposeBatch` request. The task id is assigned on submit.
    pub fn batch(
        frames: Vec<Frame>,
        indices: Vec<usize>,
        mode: ChannelMode,
        dimensions: Dimensions,
    ) -> Self {
        Self {
            task_id: 0,
            kind: TaskKind::ComposeBatch,
            frames,
            indices,
            mode,
            dimensions,
            keep_composite: false,
        }
    }

    /// Ask for composite buffers alongside the flattened ones.
    pub fn with_composites(mut self, keep: bool) -> Self {
        self.keep_composite = keep;
        self
    }

    /// A `ClearMemory` request.
    pub fn clear_memory(task_id: TaskId) -> Self {
        Self {
            task_id,
            kind: TaskKind::ClearMemory,
            frames: Vec::new(),
            indices: Vec::new(),
            mode: ChannelMode::default(),
            dimensions: Dimensions {
                width: 0,
                height: 0,
            },
            keep_composite: false,
        }
    }

    /// Caller-visible index of the frame at `pos`, falling back to `pos`.
    pub fn index_of(&self, pos: usize) -> usize {
        self.indices.get(pos).copied().unwrap_or(pos)
    }
}

/// Successful results.
#[derive(Debug)]
pub enum TaskOutput {
    /// Result of [`TaskKind::ComposeSingle`].
    Single {
        /// The dual-channel composite.
        composite: CompositeBuffer,
        /// The composite flattened over black.
        flattened: FlattenedBuffer,
    },
    /// Result of [`TaskKind::ComposeBatch`], in request order.
    Batch {
        /// Flattened buffers, one per frame.
        flattened: Vec<FlattenedBuffer>,
        /// Composites, only when `keep_composite` was set.
        composites: Option<Vec<CompositeBuffer>>,
    },
    /// Result of [`TaskKind::ClearMemory`].
    Cleared,
}

/// Why a request failed. One per failed request; no partial results.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaskFailure {
    /// Caller-visible index of the failing frame.
    pub frame_index: usize,
    /// Underlying message.
    pub message: String,
}

/// Response payload.
#[derive(Debug)]
pub enum TaskStatus {
    /// Terminal success.
    Result(TaskOutput),
    /// Terminal failure.
    Error(TaskFailure),
    /// Advisory progress in whole percent. Not terminal.
    Progress(u8),
}

impl TaskStatus {
    /// Return `true` for `Result` and `Error`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// A message from a worker back to the orchestrator.
#[derive(Debug)]
pub struct TaskResponse {
    /// Correlation id of the request.
    pub task_id: TaskId,
    /// Index of the worker that produced the response.
    pub worker: usize,
    /// Payload.
    pub status: TaskStatus,
}

/// Throttles progress so a message goes out only when a new 5% step is reached.
#[derive(Debug, Default)]
pub(crate) struct ProgressThrottle {
    last_step: u8,
}

impl ProgressThrottle {
    pub(crate) const STEP_PERCENT: u8 = 5;

    /// Percent to emit for `done / total`, or `None` if the step was already reported.
    pub(crate) fn update(&mut self, done: usize, total: usize) -> Option<u8> {
        if total == 0 {
            return None;
        }
        let percent = ((done.min(total) * 100 + total / 2) / total) as u8;
        let step = percent / Self::STEP_PERCENT;
        if step <= self.last_step {
            return None;
        }
        self.last_step = step;
        Some(percent)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/worker/protocol.rs"]
mod tests;
