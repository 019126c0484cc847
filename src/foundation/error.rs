/// Convenience result type used across dualframe.
pub type DualFrameResult<T> = Result<T, DualFrameError>;

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum DualFrameError {
    /// Invalid caller input: empty frame list, inconsistent dimensions, bad options.
    #[error("validation error: {0}")]
    Validation(String),

    /// A worker failed while composing a frame. The whole request is aborted.
    #[error("worker error at frame {frame_index}: {message}")]
    Worker {
        /// Index of the failing frame within the enclosing call.
        frame_index: usize,
        /// Underlying failure message.
        message: String,
    },

    /// Still-image encoding failed for a frame.
    #[error("encode error at frame {frame_index}: {message}")]
    Encode {
        /// Index of the frame that could not be encoded.
        frame_index: usize,
        /// Underlying codec message.
        message: String,
    },

    /// The caller's cancellation hook asked to stop.
    #[error("operation cancelled by caller")]
    Cancelled,

    /// Worker pool plumbing failed (thread spawn, channel disconnect, panicked worker).
    #[error("worker pool error: {0}")]
    Pool(String),

    /// Errors when loading or parsing configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DualFrameError {
    /// Build a [`DualFrameError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`DualFrameError::Worker`] value.
    pub fn worker(frame_index: usize, msg: impl Into<String>) -> Self {
        Self::Worker {
            frame_index,
            message: msg.into(),
        }
    }

    /// Build a [`DualFrameError::Encode`] value.
    pub fn encode(frame_index: usize, msg: impl Into<String>) -> Self {
        Self::Encode {
            frame_index,
            message: msg.into(),
        }
    }

    /// Build a [`DualFrameError::Pool`] value.
    pub fn pool(msg: impl Into<String>) -> Self {
        Self::Pool(msg.into())
    }

    /// Build a [`DualFrameError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Return `true` when the error is a user cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Failing frame index for worker and encode errors.
    pub fn frame_index(&self) -> Option<usize> {
        match self {
            Self::Worker { frame_index, .. } | Self::Encode { frame_index, .. } => {
                Some(*frame_index)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
