use siphasher::sip::SipHasher13;
use std::hash::{Hash, Hasher};
use unicode_segmentation::UnicodeSegmentation;

/// Tokenize text into lowercase word tokens.
pub fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words().map(|w| w.to_lowercase()).collect()
}

/// Character n-grams over the normalized token stream.
pub fn char_shingles(text: &str, n: usize) -> Vec<String> {
    let normalized = tokenize(text).join(" ");
    let chars: Vec<char> = normalized.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() < n {
        return vec![normalized];
    }
    chars.windows(n.max(1)).map(|w| w.iter().collect()).collect()
}

/// Stable 64-bit feature id of a token.
pub fn feature_id(token: &str) -> u64 {
    let mut hasher = SipHasher13::new_with_keys(0x746F_6B65_6E69_7A65, 0x7368_696E_676C_6573);
    token.hash(&mut hasher);
    hasher.finish()
}

/// Sparse binary representation of a text: sorted, unique ids of its
/// character `n`-shingles.
pub fn text_features(text: &str, n: usize) -> Vec<u64> {
    let mut ids: Vec<u64> = char_shingles(text, n).iter().map(|s| feature_id(s)).collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_basic() {
        let tokens = tokenize("Hello World! Graph kernels.");
        assert_eq!(tokens, vec!["hello", "world", "graph", "kernels"]);
    }

    #[test]
    fn char_shingles_basic() {
        let s = char_shingles("hello", 3);
        assert_eq!(s, vec!["hel", "ell", "llo"]);
    }

    #[test]
    fn char_shingles_short_text() {
        assert_eq!(char_shingles("hi", 3), vec!["hi"]);
        assert!(char_shingles("  ", 3).is_empty());
    }

    #[test]
    fn case_and_punctuation_insensitive() {
        assert_eq!(text_features("Hello, World", 4), text_features("hello world", 4));
    }

    #[test]
    fn features_sorted_unique() {
        let ids = text_features("abababab", 2);
        // Only "ab" and "ba".
        assert_eq!(ids.len(), 2);
        assert!(ids[0] < ids[1]);
    }
}
