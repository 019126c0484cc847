use std::collections::HashSet;
use std::sync::mpsc;
use std::thread::JoinHandle;

use crate::compose::scheduler::{BlockScheduler, DEFAULT_BLOCK_SIZE};
use crate::foundation::error::{DualFrameError, DualFrameResult};
use crate::memory::pool::{BytePool, PoolOpts};
use crate::worker::protocol::{TaskFailure, TaskId, TaskRequest, TaskResponse, TaskStatus};
use crate::worker::task::{DEFAULT_CHUNK_SIZE, WorkerState, panic_message};

/// Worker pool sizing and per-worker scheduler options.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerPoolOpts {
    /// Number of worker threads. Must be at least one.
    pub workers: usize,
    /// Block edge handed to each worker's scheduler.
    pub block_size: u32,
    /// Give each worker an inner rayon pool for its blocks.
    pub parallel_blocks: bool,
    /// Threads per inner pool. `None` uses rayon defaults.
    pub block_threads: Option<usize>,
    /// Frames per progress chunk inside a batch.
    pub chunk_size: usize,
    /// Options for each worker's private buffer pool.
    pub pool: PoolOpts,
}

impl Default for WorkerPoolOpts {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            block_size: DEFAULT_BLOCK_SIZE,
            parallel_blocks: false,
            block_threads: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            pool: PoolOpts::default(),
        }
    }
}

/// Hardware concurrency capped at four.
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, 4)
}

enum WorkerMsg {
    Task(TaskRequest),
    Shutdown,
}

struct WorkerHandle {
    tx: mpsc::Sender<WorkerMsg>,
    join: Option<JoinHandle<()>>,
    in_flight: usize,
}

/// Fixed set of worker threads, each with its own request channel and buffer pool.
///
/// All workers answer on one shared response channel. Requests and frames are moved into the
/// worker; nothing is shared between threads.
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
    responses: mpsc::Receiver<TaskResponse>,
    next_task_id: TaskId,
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("in_flight", &self.in_flight())
            .field("next_task_id", &self.next_task_id)
            .finish()
    }
}

impl WorkerPool {
    /// Spawn the workers.
    pub fn new(opts: WorkerPoolOpts) -> DualFrameResult<Self> {
        if opts.workers == 0 {
            return Err(DualFrameError::validation("worker count must be >= 1"));
        }
        let (resp_tx, responses) = mpsc::channel::<TaskResponse>();
        let mut workers = Vec::with_capacity(opts.workers);
        for id in 0..opts.workers {
            let scheduler = if opts.parallel_blocks {
                BlockScheduler::parallel(opts.block_size, opts.block_threads)?
            } else {
                BlockScheduler::new(opts.block_size)
            };
            let state = WorkerState::new(
                id,
                BytePool::new(opts.pool),
                scheduler,
                opts.chunk_size,
            );
            let (tx, rx) = mpsc::channel::<WorkerMsg>();
            let resp = resp_tx.clone();
            let join = std::thread::Builder::new()
                .name(format!("dualframe-worker-{id}"))
                .spawn(move || worker_loop(state, rx, resp))
                .map_err(|e| DualFrameError::pool(format!("failed to spawn worker {id}: {e}")))?;
            workers.push(WorkerHandle {
                tx,
                join: Some(join),
                in_flight: 0,
            });
        }
        tracing::debug!(
            workers = opts.workers,
            parallel_blocks = opts.parallel_blocks,
            "worker pool started"
        );
        Ok(Self {
            workers,
            responses,
            next_task_id: 1,
        })
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Requests submitted but not yet answered with a terminal response.
    pub fn in_flight(&self) -> usize {
        self.workers.iter().map(|w| w.in_flight).sum()
    }

    /// Lowest-numbered worker with nothing in flight.
    pub fn idle_worker(&self) -> Option<usize> {
        self.workers.iter().position(|w| w.in_flight == 0)
    }

    /// Queue `req` on `worker` under a fresh task id and return that id.
    pub fn submit(&mut self, worker: usize, mut req: TaskRequest) -> DualFrameResult<TaskId> {
        let task_id = self.next_task_id;
        self.next_task_id += 1;
        req.task_id = task_id;
        let kind = req.kind;
        let frames = req.frames.len();
        let handle = self
            .workers
            .get_mut(worker)
            .ok_or_else(|| DualFrameError::pool(format!("no worker with index {worker}")))?;
        handle
            .tx
            .send(WorkerMsg::Task(req))
            .map_err(|_| DualFrameError::pool(format!("worker {worker} is not accepting tasks")))?;
        handle.in_flight += 1;
        tracing::trace!(worker, task_id, ?kind, frames, "task submitted");
        Ok(task_id)
    }

    /// Block until any worker responds. Terminal responses free their worker.
    pub fn recv(&mut self) -> DualFrameResult<TaskResponse> {
        let resp = self
            .responses
            .recv()
            .map_err(|_| DualFrameError::pool("all workers disconnected"))?;
        if resp.status.is_terminal()
            && let Some(w) = self.workers.get_mut(resp.worker)
        {
            w.in_flight = w.in_flight.saturating_sub(1);
        }
        Ok(resp)
    }

    /// Block until the terminal response for `task_id`, discarding everything else.
    pub fn wait_for(&mut self, task_id: TaskId) -> DualFrameResult<TaskStatus> {
        loop {
            let resp = self.recv()?;
            if resp.task_id == task_id {
                if resp.status.is_terminal() {
                    return Ok(resp.status);
                }
                continue;
            }
            tracing::debug!(task_id = resp.task_id, "discarding response for stale task");
        }
    }

    /// Run one request on the first idle worker and wait for its terminal status.
    ///
    /// Responses to earlier, abandoned requests are drained while waiting.
    pub fn run(&mut self, req: TaskRequest) -> DualFrameResult<TaskStatus> {
        let worker = loop {
            if let Some(w) = self.idle_worker() {
                break w;
            }
            let stale = self.recv()?;
            tracing::debug!(task_id = stale.task_id, "discarding response for stale task");
        };
        let task_id = self.submit(worker, req)?;
        self.wait_for(task_id)
    }

    /// Ask every worker to drop its retained buffers and wait until all have.
    pub fn clear_memory(&mut self) -> DualFrameResult<()> {
        let mut pending = HashSet::with_capacity(self.workers.len());
        for worker in 0..self.workers.len() {
            pending.insert(self.submit(worker, TaskRequest::clear_memory(0))?);
        }
        let mut failure = None;
        while !pending.is_empty() {
            let resp = self.recv()?;
            if !resp.status.is_terminal() || !pending.remove(&resp.task_id) {
                continue;
            }
            if let TaskStatus::Error(TaskFailure { message, .. }) = resp.status {
                failure.get_or_insert(message);
            }
        }
        match failure {
            Some(message) => Err(DualFrameError::pool(message)),
            None => Ok(()),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for w in &self.workers {
            let _ = w.tx.send(WorkerMsg::Shutdown);
        }
        for (id, w) in self.workers.iter_mut().enumerate() {
            if let Some(join) = w.join.take()
                && join.join().is_err()
            {
                tracing::warn!(worker = id, "worker thread panicked during shutdown");
            }
        }
    }
}

fn worker_loop(
    mut state: WorkerState,
    rx: mpsc::Receiver<WorkerMsg>,
    tx: mpsc::Sender<TaskResponse>,
) {
    while let Ok(WorkerMsg::Task(req)) = rx.recv() {
        let task_id = req.task_id;
        let worker = state.id;
        let first_index = req.index_of(0);
        let status = {
            let mut progress = |percent: u8| {
                let _ = tx.send(TaskResponse {
                    task_id,
                    worker,
                    status: TaskStatus::Progress(percent),
                });
            };
            match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                state.handle(req, &mut progress)
            })) {
                Ok(status) => status,
                Err(payload) => TaskStatus::Error(TaskFailure {
                    frame_index: first_index,
                    message: format!("worker panicked: {}", panic_message(payload.as_ref())),
                }),
            }
        };
        if tx
            .send(TaskResponse {
                task_id,
                worker,
                status,
            })
            .is_err()
        {
            break;
        }
    }
    tracing::trace!(worker = state.id, "worker exiting");
}

#[cfg(test)]
#[path = "../../tests/unit/worker/pool.rs"]
mod tests;
