use crate::foundation::math::round_up_pow2;
use std::collections::HashMap;

/// Pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct PoolOpts {
    /// Smallest bucket capacity in elements (a power of two).
    pub min_bucket_len: usize,
    /// Maximum number of free buffers kept per bucket.
    pub max_buffers_per_bucket: usize,
    /// Buffers larger than this (in elements) are never pooled.
    pub max_buffer_len: usize,
    /// Maximum bytes retained across all buckets.
    pub max_retained_bytes: usize,
}

impl Default for PoolOpts {
    fn default() -> Self {
        Self {
            min_bucket_len: 1024,
            max_buffers_per_bucket: 50,
            max_buffer_len: 50 * 1024 * 1024,
            max_retained_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Allocation and reuse counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers allocated fresh.
    pub allocated_buffers: u64,
    /// Bytes allocated fresh.
    pub allocated_bytes: u64,
    /// Acquires served from a free list.
    pub reused: u64,
    /// Buffers currently sitting in free lists.
    pub retained_buffers: usize,
    /// Bytes currently sitting in free lists.
    pub retained_bytes: usize,
    /// Releases that dropped the buffer instead of keeping it.
    pub dropped_on_release: u64,
}

/// A buffer lent out by a [`BufferPool`].
///
/// The backing storage is the bucket capacity; only the first `len()` elements are the
/// requested view.
#[derive(Debug)]
pub struct PooledBuffer<T> {
    data: Vec<T>,
    len: usize,
}

impl<T: Copy> PooledBuffer<T> {
    /// Requested length.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Return `true` when the requested length is zero.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Backing capacity (the bucket key for pooled buffers).
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Copy the requested view out into an owned vector.
    pub fn to_vec(&self) -> Vec<T> {
        self.data[..self.len].to_vec()
    }

    /// Take the storage, truncated to the requested length. The pool never sees it again.
    pub fn into_vec(mut self) -> Vec<T> {
        self.data.truncate(self.len);
        self.data
    }
}

impl<T> std::ops::Deref for PooledBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data[..self.len]
    }
}

impl<T> std::ops::DerefMut for PooledBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        &mut self.data[..self.len]
    }
}

struct Bucket<T> {
    capacity: usize,
    free: Vec<Vec<T>>,
}

/// Bucketed recycler for fixed-shape buffers.
///
/// Keyed by capacity rounded up to a power of two. Buffers come back zero-filled. Not meant to be
/// shared between threads: every worker owns its own pool.
pub struct BufferPool<T> {
    opts: PoolOpts,
    stats: PoolStats,

    bucket_idx_by_capacity: HashMap<usize, usize>,
    buckets: Vec<Bucket<T>>,
}

/// The byte pool used by the compositing workers.
pub type BytePool = BufferPool<u8>;

impl<T: Copy + Default> BufferPool<T> {
    /// Create an empty pool.
    pub fn new(opts: PoolOpts) -> Self {
        Self {
            opts,
            stats: PoolStats::default(),
            bucket_idx_by_capacity: HashMap::new(),
            buckets: Vec::new(),
        }
    }

    /// Pool configuration.
    pub fn opts(&self) -> PoolOpts {
        self.opts
    }

    /// Snapshot of the counters.
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    fn bytes_of(len: usize) -> usize {
        len.saturating_mul(std::mem::size_of::<T>())
    }

    fn is_poolable(&self, len: usize) -> bool {
        len != 0 && len <= self.opts.max_buffer_len
    }

    /// Bucket capacity a request of `len` elements lands in, or `None` if it is never pooled.
    ///
    /// A request whose rounded capacity would exceed `max_buffer_len` is not pooled either.
    pub fn bucket_capacity(&self, len: usize) -> Option<usize> {
        if !self.is_poolable(len) {
            return None;
        }
        let capacity = round_up_pow2(len, self.opts.min_bucket_len.max(1));
        (capacity <= self.opts.max_buffer_len).then_some(capacity)
    }

    /// Check out a buffer with at least `len` elements, all set to `T::default()`.
    pub fn acquire(&mut self, len: usize) -> PooledBuffer<T> {
        let Some(capacity) = self.bucket_capacity(len) else {
            return self.allocate(len, len);
        };

        if let Some(&bi) = self.bucket_idx_by_capacity.get(&capacity)
            && let Some(data) = self.buckets[bi].free.pop()
        {
            self.stats.reused = self.stats.reused.saturating_add(1);
            self.stats.retained_buffers = self.stats.retained_buffers.saturating_sub(1);
            self.stats.retained_bytes = self
                .stats
                .retained_bytes
                .saturating_sub(Self::bytes_of(capacity));
            return PooledBuffer { data, len };
        }

        self.allocate(capacity, len)
    }

    fn allocate(&mut self, capacity: usize, len: usize) -> PooledBuffer<T> {
        self.stats.allocated_buffers = self.stats.allocated_buffers.saturating_add(1);
        self.stats.allocated_bytes = self
            .stats
            .allocated_bytes
            .saturating_add(Self::bytes_of(capacity) as u64);
        PooledBuffer {
            data: vec![T::default(); capacity],
            len,
        }
    }

    /// Return a buffer. It is zero-filled and kept, or dropped when its bucket is full, it is too
    /// large, or the global byte cap would be exceeded.
    pub fn release(&mut self, buffer: PooledBuffer<T>) {
        let capacity = buffer.capacity();
        if self.bucket_capacity(capacity) != Some(capacity) {
            self.drop_buffer();
            return;
        }

        let bytes = Self::bytes_of(capacity);
        if self.stats.retained_bytes.saturating_add(bytes) > self.opts.max_retained_bytes {
            self.drop_buffer();
            return;
        }

        let bi = match self.bucket_idx_by_capacity.get(&capacity).copied() {
            Some(i) => i,
            None => {
                let i = self.buckets.len();
                self.buckets.push(Bucket {
                    capacity,
                    free: Vec::new(),
                });
                self.bucket_idx_by_capacity.insert(capacity, i);
                i
            }
        };

        let bucket = &mut self.buckets[bi];
        if bucket.free.len() >= self.opts.max_buffers_per_bucket {
            self.drop_buffer();
            return;
        }

        let mut data = buffer.data;
        data.fill(T::default());
        bucket.free.push(data);
        self.stats.retained_buffers = self.stats.retained_buffers.saturating_add(1);
        self.stats.retained_bytes = self.stats.retained_bytes.saturating_add(bytes);
    }

    fn drop_buffer(&mut self) {
        self.stats.dropped_on_release = self.stats.dropped_on_release.saturating_add(1);
    }

    /// Drop every retained buffer. Counters other than the retained totals are kept.
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            tracing::trace!(capacity = bucket.capacity, freed = bucket.free.len(), "pool clear");
            bucket.free.clear();
        }
        self.buckets.clear();
        self.bucket_idx_by_capacity.clear();
        self.stats.retained_buffers = 0;
        self.stats.retained_bytes = 0;
    }
}

impl<T: Copy + Default> Default for BufferPool<T> {
    fn default() -> Self {
        Self::new(PoolOpts::default())
    }
}

impl<T> std::fmt::Debug for BufferPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferPool")
            .field("opts", &self.opts)
            .field("stats", &self.stats)
            .field("buckets", &self.buckets.len())
            .finish()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/memory/pool.rs"]
mod tests;
