//! Buffer recycling for per-frame scratch memory.

/// Bucketed power-of-two buffer pool.
pub mod pool;
