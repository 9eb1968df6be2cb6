use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};

const SHINGLE_KEY: (u64, u64) = (0x5348_494E_474C_4531, 0x0000_0000_0000_0004);

/// Replace a feature set by hashed windows of `size` consecutive feature ids.
///
/// `features` must be sorted. Sets shorter than the window collapse to a
/// single shingle; an empty set stays empty. Output is sorted and unique.
pub fn shingle_features(features: &[u64], size: usize) -> Vec<u64> {
    if features.is_empty() {
        return Vec::new();
    }
    let size = size.max(1);
    let mut shingles: Vec<u64> = if features.len() < size {
        vec![hash_window(features)]
    } else {
        features.windows(size).map(hash_window).collect()
    };
    shingles.sort_unstable();
    shingles.dedup();
    shingles
}

fn hash_window(window: &[u64]) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(SHINGLE_KEY.0, SHINGLE_KEY.1);
    window.hash(&mut hasher);
    hasher.finish()
}
