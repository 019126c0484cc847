use super::*;

fn opts(per_bucket: usize) -> PoolOpts {
    PoolOpts {
        min_bucket_len: 1024,
        max_buffers_per_bucket: per_bucket,
        max_buffer_len: 1 << 20,
        max_retained_bytes: 1 << 30,
    }
}

#[test]
fn acquire_rounds_to_power_of_two_with_floor() {
    let mut p = BytePool::new(opts(4));
    let small = p.acquire(10);
    assert_eq!(small.len(), 10);
    assert_eq!(small.capacity(), 1024);
    let big = p.acquire(3000);
    assert_eq!(big.len(), 3000);
    assert_eq!(big.capacity(), 4096);
}

#[test]
fn released_buffer_is_reused_and_zeroed() {
    let mut p = BytePool::new(opts(4));
    let mut a = p.acquire(2000);
    a.iter_mut().for_each(|b| *b = 0xAB);
    p.release(a);

    let b = p.acquire(1500);
    assert_eq!(b.capacity(), 2048);
    assert!(b.iter().all(|&x| x == 0));
    assert_eq!(p.stats().reused, 1);
    assert_eq!(p.stats().allocated_buffers, 1);
}

#[test]
fn whole_backing_storage_is_zeroed_on_release() {
    let mut p = BytePool::new(opts(4));
    let mut a = p.acquire(1100);
    a.iter_mut().for_each(|b| *b = 1);
    p.release(a);
    // A larger request in the same bucket sees the tail that the first user never touched.
    let b = p.acquire(2048);
    assert!(b.iter().all(|&x| x == 0));
}

#[test]
fn pool_honors_bucket_cap() {
    let mut p = BytePool::new(opts(1));
    let a = p.acquire(1024);
    let b = p.acquire(1024);
    p.release(a);
    p.release(b);

    let st = p.stats();
    assert_eq!(st.retained_buffers, 1);
    assert_eq!(st.dropped_on_release, 1);
}

#[test]
fn pool_honors_global_byte_cap() {
    let mut p = BytePool::new(PoolOpts {
        max_retained_bytes: 1024,
        ..opts(8)
    });
    let a = p.acquire(1024);
    let b = p.acquire(1024);
    p.release(a);
    p.release(b);

    let st = p.stats();
    assert_eq!(st.retained_bytes, 1024);
    assert_eq!(st.retained_buffers, 1);
    assert_eq!(st.dropped_on_release, 1);
}

#[test]
fn oversized_requests_are_exact_and_never_retained() {
    let mut p = BytePool::new(opts(8));
    let huge = p.acquire((1 << 20) + 1);
    assert_eq!(huge.capacity(), (1 << 20) + 1);
    assert_eq!(p.bucket_capacity((1 << 20) + 1), None);
    p.release(huge);
    assert_eq!(p.stats().retained_buffers, 0);
    assert_eq!(p.stats().dropped_on_release, 1);
}

#[test]
fn requests_rounding_past_the_max_are_exact_sized() {
    let mut p = BytePool::new(PoolOpts {
        max_buffer_len: 3000,
        ..opts(8)
    });
    assert_eq!(p.bucket_capacity(2048), Some(2048));
    assert_eq!(p.bucket_capacity(2500), None);
    for _ in 0..3 {
        let buf = p.acquire(2500);
        assert_eq!(buf.capacity(), 2500);
        p.release(buf);
    }
    let stats = p.stats();
    assert_eq!(stats.allocated_bytes, 3 * 2500);
    assert_eq!(stats.retained_buffers, 0);
}

#[test]
fn generic_element_types_are_counted_in_bytes() {
    let mut p = BufferPool::<u32>::new(opts(2));
    let a = p.acquire(1024);
    assert_eq!(p.stats().allocated_bytes, 4096);
    p.release(a);
    assert_eq!(p.stats().retained_bytes, 4096);
}

#[test]
fn clear_drops_retained_buffers() {
    let mut p = BytePool::new(opts(8));
    let a = p.acquire(1024);
    p.release(a);
    p.clear();
    assert_eq!(p.stats().retained_buffers, 0);
    let _b = p.acquire(1024);
    assert_eq!(p.stats().allocated_buffers, 2);
}

#[test]
fn into_vec_truncates_to_requested_len() {
    let mut p = BytePool::new(opts(8));
    let a = p.acquire(5);
    assert_eq!(a.to_vec().len(), 5);
    assert_eq!(a.into_vec().len(), 5);
}
