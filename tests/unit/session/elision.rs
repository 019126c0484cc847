use super::*;

fn solid(rgba: [u8; 4]) -> Frame {
    Frame::solid(3, 2, rgba).unwrap()
}

#[test]
fn identical_frames_share_a_fingerprint() {
    let a = solid([1, 2, 3, 4]);
    assert_eq!(fingerprint_frame(&a), fingerprint_frame(&a.clone()));
    assert_ne!(fingerprint_frame(&a), fingerprint_frame(&solid([1, 2, 3, 5])));
}

#[test]
fn same_bytes_different_shape_differ() {
    let wide = Frame::solid(4, 1, [9, 9, 9, 9]).unwrap();
    let tall = Frame::solid(1, 4, [9, 9, 9, 9]).unwrap();
    assert_ne!(fingerprint_frame(&wide), fingerprint_frame(&tall));
}

#[test]
fn duplicates_point_at_first_occurrence() {
    let a = solid([10, 0, 0, 10]);
    let b = solid([0, 20, 0, 20]);
    let frames = vec![a.clone(), b.clone(), a.clone(), a, b, solid([0, 0, 0, 0])];
    assert_eq!(duplicate_sources(&frames), vec![0, 1, 0, 0, 1, 5]);
}

#[test]
fn all_unique_maps_to_self() {
    let frames: Vec<Frame> = (0..5).map(|i| solid([i, i, i, i])).collect();
    assert_eq!(duplicate_sources(&frames), vec![0, 1, 2, 3, 4]);
}
