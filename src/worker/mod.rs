//! Background compositing workers and the message protocol they speak.

/// Thread pool owning the workers and their channels.
pub mod pool;
/// Request and response messages.
pub mod protocol;
pub(crate) mod task;
