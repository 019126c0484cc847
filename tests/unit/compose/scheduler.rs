use super::*;

fn gradient_frame(w: u32, h: u32) -> Frame {
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for y in 0..h {
        for x in 0..w {
            let a = ((x * 37 + y * 11) % 256) as u8;
            let r = a.saturating_sub((x % 7) as u8);
            let g = a / 2;
            let b = a.saturating_sub((y % 5) as u8);
            data.extend_from_slice(&[r, g, b, a]);
        }
    }
    Frame::new(w, h, data).unwrap()
}

fn buffers(frame: &Frame) -> (Vec<u8>, Vec<u8>) {
    let len = frame.dimensions().composite_byte_len().unwrap();
    (vec![0u8; len], vec![0u8; len])
}

#[test]
fn partition_clips_edge_blocks() {
    let blocks = partition(300, 130, 128);
    assert_eq!(blocks.len(), 3 * 2);
    assert_eq!(
        blocks[2],
        Block {
            x: 256,
            y: 0,
            width: 44,
            height: 128
        }
    );
    assert_eq!(
        blocks[5],
        Block {
            x: 256,
            y: 128,
            width: 44,
            height: 2
        }
    );
}

#[test]
fn partition_covers_every_pixel_once() {
    let (w, h) = (37u32, 23u32);
    let mut hits = vec![0u8; (w * h) as usize];
    for b in partition(w, h, 8) {
        assert!(b.width <= 8 && b.height <= 8);
        for y in b.y..b.y + b.height {
            for x in b.x..b.x + b.width {
                hits[(y * w + x) as usize] += 1;
            }
        }
    }
    assert!(hits.iter().all(|&n| n == 1));
}

#[test]
fn partition_treats_zero_block_size_as_one() {
    assert_eq!(partition(2, 2, 0).len(), 4);
}

#[test]
fn block_order_does_not_change_output() {
    let frame = gradient_frame(45, 31);
    let blocks = partition(45, 31, 8);

    let (mut c_fwd, mut f_fwd) = buffers(&frame);
    process_blocks_in_order(&frame, ChannelMode::ColorLeft, &blocks, &mut c_fwd, &mut f_fwd)
        .unwrap();

    let mut reversed = blocks.clone();
    reversed.reverse();
    let (mut c_rev, mut f_rev) = buffers(&frame);
    process_blocks_in_order(&frame, ChannelMode::ColorLeft, &reversed, &mut c_rev, &mut f_rev)
        .unwrap();

    // Deterministic interleave: odd-indexed blocks first, then even ones backwards.
    let mut shuffled: Vec<Block> = blocks.iter().skip(1).step_by(2).copied().collect();
    shuffled.extend(blocks.iter().step_by(2).rev().copied());
    let (mut c_shuf, mut f_shuf) = buffers(&frame);
    process_blocks_in_order(&frame, ChannelMode::ColorLeft, &shuffled, &mut c_shuf, &mut f_shuf)
        .unwrap();

    assert_eq!(c_fwd, c_rev);
    assert_eq!(f_fwd, f_rev);
    assert_eq!(c_fwd, c_shuf);
    assert_eq!(f_fwd, f_shuf);
}

#[test]
fn parallel_bands_match_sequential() {
    let frame = gradient_frame(70, 53);
    let seq = BlockScheduler::new(16);
    let par = BlockScheduler::parallel(16, Some(3)).unwrap();
    assert!(par.is_parallel());

    for mode in [ChannelMode::ColorLeft, ChannelMode::AlphaLeft] {
        let (mut c1, mut f1) = buffers(&frame);
        let (mut c2, mut f2) = buffers(&frame);
        seq.process_into(&frame, mode, &mut c1, &mut f1).unwrap();
        par.process_into(&frame, mode, &mut c2, &mut f2).unwrap();
        assert_eq!(c1, c2);
        assert_eq!(f1, f2);
    }
}

#[test]
fn out_of_bounds_block_is_rejected() {
    let frame = gradient_frame(4, 4);
    let (mut c, mut f) = buffers(&frame);
    let bad = [Block {
        x: 2,
        y: 0,
        width: 4,
        height: 1,
    }];
    assert!(process_blocks_in_order(&frame, ChannelMode::ColorLeft, &bad, &mut c, &mut f).is_err());
    assert!(c.iter().all(|&b| b == 0));
}

#[test]
fn undersized_frame_buffer_is_an_error() {
    let frame = Frame {
        width: 4,
        height: 4,
        data: vec![0; 10],
    };
    let mut pool = BytePool::default();
    let err = BlockScheduler::default()
        .process_frame(&frame, ChannelMode::ColorLeft, &mut pool)
        .unwrap_err();
    assert!(err.to_string().contains("expected 64"));
    // Buffers were returned to the pool even though processing failed.
    assert_eq!(pool.stats().retained_buffers, 2);
}

#[test]
fn packing_invariant_holds_for_every_pixel() {
    let frame = gradient_frame(19, 7);
    let mut pool = BytePool::default();
    for mode in [ChannelMode::ColorLeft, ChannelMode::AlphaLeft] {
        let (composite, flattened) = BlockScheduler::new(4)
            .process_frame(&frame, mode, &mut pool)
            .unwrap();
        assert_eq!(composite.width, 38);
        assert_eq!(composite.height, 7);
        for y in 0..7 {
            for x in 0..19 {
                let a = frame.pixel(x, y)[3];
                let (color_x, alpha_x) = if mode.is_color_left() {
                    (x, x + 19)
                } else {
                    (x + 19, x)
                };
                assert_eq!(composite.pixel(alpha_x, y), [a, a, a, 255]);
                assert_eq!(composite.pixel(color_x, y)[3], a);
                assert_eq!(flattened.pixel(color_x, y)[3], 255);
                assert_eq!(flattened.pixel(alpha_x, y), [a, a, a, 255]);
            }
        }
    }
}

#[test]
fn opaque_input_flattens_to_itself() {
    let mut data = Vec::new();
    for i in 0..(9 * 5) {
        data.extend_from_slice(&[(i * 5) as u8, (i * 3) as u8, 200, 255]);
    }
    let frame = Frame::new(9, 5, data).unwrap();
    let mut pool = BytePool::default();
    let (composite, flattened) = BlockScheduler::new(4)
        .process_frame(&frame, ChannelMode::AlphaLeft, &mut pool)
        .unwrap();
    assert_eq!(composite.data, flattened.data);
}

#[test]
fn pool_buffers_are_reused_across_frames() {
    let frame = gradient_frame(16, 16);
    let mut pool = BytePool::default();
    let sched = BlockScheduler::default();
    for _ in 0..5 {
        sched
            .process_frame_flattened(&frame, ChannelMode::ColorLeft, &mut pool)
            .unwrap();
    }
    let st = pool.stats();
    assert_eq!(st.allocated_buffers, 2);
    assert_eq!(st.reused, 8);
}

#[test]
fn zero_thread_count_is_rejected() {
    assert!(BlockScheduler::parallel(8, Some(0)).is_err());
}
