use std::collections::HashMap;

use xxhash_rust::xxh3::Xxh3;

use crate::foundation::core::Frame;

const XXH3_SEED: u64 = 0x4d1f_a27c_93b0_e615;

/// 128-bit content fingerprint of a source frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) struct FrameFingerprint {
    pub(crate) hi: u64,
    pub(crate) lo: u64,
}

pub(crate) fn fingerprint_frame(frame: &Frame) -> FrameFingerprint {
    let mut h = Xxh3::with_seed(XXH3_SEED);
    h.update(&frame.width.to_le_bytes());
    h.update(&frame.height.to_le_bytes());
    h.update(&frame.data);
    let v = h.digest128();
    FrameFingerprint {
        hi: (v >> 64) as u64,
        lo: v as u64,
    }
}

/// For each frame, the index of the first frame with identical bytes (itself if unique).
///
/// Fingerprints only pick candidates; equality is always confirmed on the bytes.
pub(crate) fn duplicate_sources(frames: &[Frame]) -> Vec<usize> {
    let mut seen = HashMap::<FrameFingerprint, Vec<usize>>::new();
    let mut out = Vec::with_capacity(frames.len());
    for (i, frame) in frames.iter().enumerate() {
        let candidates = seen.entry(fingerprint_frame(frame)).or_default();
        let src = candidates
            .iter()
            .copied()
            .find(|&c| frames[c] == *frame)
            .unwrap_or(i);
        if src == i {
            candidates.push(i);
        }
        out.push(src);
    }
    out
}

#[cfg(test)]
#[path = "../../tests/unit/session/elision.rs"]
mod tests;
