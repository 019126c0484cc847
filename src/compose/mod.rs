//! Pixel transform and block scheduling.

/// Block tiling and the per-frame driver.
pub mod scheduler;
/// Per-pixel un-premultiply, pack and flatten.
pub mod transform;
