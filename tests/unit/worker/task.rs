use super::*;
use crate::foundation::core::{ChannelMode, Dimensions};

fn state(chunk_size: usize) -> WorkerState {
    WorkerState::new(0, BytePool::default(), BlockScheduler::new(8), chunk_size)
}

fn solid_frames(n: usize, w: u32, h: u32) -> Vec<Frame> {
    (0..n)
        .map(|i| Frame::solid(w, h, [(i * 3) as u8, 0, 0, 200]).unwrap())
        .collect()
}

fn no_progress(_: u8) {}

#[test]
fn single_returns_both_buffers() {
    let frame = Frame::new(2, 2, [128, 0, 0, 128].repeat(4)).unwrap();
    let req = TaskRequest::single(frame, 7, ChannelMode::ColorLeft);
    let TaskStatus::Result(TaskOutput::Single {
        composite,
        flattened,
    }) = state(20).handle(req, &mut no_progress)
    else {
        panic!("expected single result");
    };
    assert_eq!(composite.width, 4);
    assert_eq!(composite.pixel(0, 0), [255, 0, 0, 128]);
    assert_eq!(composite.pixel(2, 1), [128, 128, 128, 255]);
    assert_eq!(flattened.pixel(1, 0), [128, 0, 0, 255]);
}

#[test]
fn batch_keeps_input_order_and_reports_progress() {
    let frames = solid_frames(45, 3, 2);
    let dims = Dimensions::new(3, 2).unwrap();
    let req = TaskRequest::batch(frames, (100..145).collect(), ChannelMode::AlphaLeft, dims);
    let mut seen = Vec::new();
    let status = state(20).handle(req, &mut |p| seen.push(p));
    let TaskStatus::Result(TaskOutput::Batch {
        flattened,
        composites,
    }) = status
    else {
        panic!("expected batch result");
    };
    assert!(composites.is_none());
    assert_eq!(flattened.len(), 45);
    for (i, f) in flattened.iter().enumerate() {
        // color half is on the right in alpha-left mode
        let unpremul = crate::foundation::math::div_alpha_round_u8((i * 3) as u8, 200);
        let flat = crate::foundation::math::mul_div255_u8(u16::from(unpremul), 200);
        assert_eq!(f.pixel(3, 0), [flat, 0, 0, 255]);
        assert_eq!(f.pixel(0, 0), [200, 200, 200, 255]);
    }
    // chunks of 20 over 45 frames: 44%, 89%, 100%
    assert_eq!(seen, vec![44, 89, 100]);
}

#[test]
fn batch_can_return_composites() {
    let dims = Dimensions::new(2, 2).unwrap();
    let req = TaskRequest::batch(solid_frames(3, 2, 2), vec![0, 1, 2], ChannelMode::ColorLeft, dims)
        .with_composites(true);
    let TaskStatus::Result(TaskOutput::Batch { composites, .. }) =
        state(2).handle(req, &mut no_progress)
    else {
        panic!("expected batch result");
    };
    assert_eq!(composites.map(|c| c.len()), Some(3));
}

#[test]
fn failing_frame_reports_its_caller_index() {
    let dims = Dimensions::new(2, 2).unwrap();
    let mut frames = solid_frames(4, 2, 2);
    frames[2] = Frame::solid(3, 2, [0, 0, 0, 0]).unwrap();
    let req = TaskRequest::batch(frames, vec![50, 51, 52, 53], ChannelMode::ColorLeft, dims);
    let status = state(20).handle(req, &mut no_progress);
    let TaskStatus::Error(failure) = status else {
        panic!("expected failure");
    };
    assert_eq!(failure.frame_index, 52);
    assert!(failure.message.contains("3x2"));
}

#[test]
fn malformed_buffer_is_a_task_failure() {
    let bad = Frame {
        width: 2,
        height: 2,
        data: vec![0; 3],
    };
    let req = TaskRequest::single(bad, 9, ChannelMode::ColorLeft);
    let TaskStatus::Error(failure) = state(20).handle(req, &mut no_progress) else {
        panic!("expected failure");
    };
    assert_eq!(failure.frame_index, 9);
}

#[test]
fn single_request_with_two_frames_is_rejected() {
    let mut req = TaskRequest::single(Frame::solid(1, 1, [0; 4]).unwrap(), 0, ChannelMode::ColorLeft);
    req.frames.push(Frame::solid(1, 1, [0; 4]).unwrap());
    assert!(matches!(
        state(20).handle(req, &mut no_progress),
        TaskStatus::Error(_)
    ));
}

#[test]
fn clear_memory_empties_the_worker_pool() {
    let mut st = state(20);
    let dims = Dimensions::new(4, 4).unwrap();
    let req = TaskRequest::batch(solid_frames(2, 4, 4), vec![0, 1], ChannelMode::ColorLeft, dims);
    st.handle(req, &mut no_progress);
    assert!(st.pool().stats().retained_buffers > 0);

    let status = st.handle(TaskRequest::clear_memory(2), &mut no_progress);
    assert!(matches!(status, TaskStatus::Result(TaskOutput::Cleared)));
    assert_eq!(st.pool().stats().retained_buffers, 0);
}

#[test]
fn panic_message_reads_common_payloads() {
    assert_eq!(panic_message(&"boom"), "boom");
    assert_eq!(panic_message(&String::from("bang")), "bang");
    assert_eq!(panic_message(&42u8), "unknown panic payload");
}
