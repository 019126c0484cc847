use super::*;

#[test]
fn throttle_emits_once_per_five_percent_step() {
    let mut t = ProgressThrottle::default();
    let emitted: Vec<u8> = (1..=100).filter_map(|done| t.update(done, 100)).collect();
    assert_eq!(emitted.len(), 20);
    assert_eq!(emitted.first(), Some(&5));
    assert_eq!(emitted.last(), Some(&100));
    assert!(emitted.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn throttle_coalesces_small_batches() {
    let mut t = ProgressThrottle::default();
    assert_eq!(t.update(1, 3), Some(33));
    assert_eq!(t.update(2, 3), Some(67));
    assert_eq!(t.update(3, 3), Some(100));
    assert_eq!(t.update(3, 3), None);
    assert_eq!(t.update(0, 0), None);
}

#[test]
fn progress_is_not_terminal() {
    assert!(!TaskStatus::Progress(50).is_terminal());
    assert!(TaskStatus::Result(TaskOutput::Cleared).is_terminal());
    assert!(
        TaskStatus::Error(TaskFailure {
            frame_index: 0,
            message: "x".into()
        })
        .is_terminal()
    );
}

#[test]
fn index_of_falls_back_to_position() {
    let mut req = TaskRequest::clear_memory(1);
    assert_eq!(req.index_of(3), 3);
    req.indices = vec![10, 11];
    assert_eq!(req.index_of(1), 11);
}
