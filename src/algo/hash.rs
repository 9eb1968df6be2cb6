/// Upper bound of every hash value; also the empty-set sentinel.
/// Real hash values fall in `[0, MAX_VALUE)`.
pub const MAX_VALUE: u64 = i32::MAX as u64;

const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// splitmix64 finalizer: a bijective 64-bit avalanche mixer.
#[inline]
pub(crate) fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One member of the MinHash family: `feature_id -> [0, MAX_VALUE)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashFunction {
    key: u64,
}

impl HashFunction {
    #[inline]
    pub fn hash(&self, feature: u64) -> u64 {
        mix64(feature ^ self.key) % MAX_VALUE
    }
}

/// Deterministic family of independent hash functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HashFamily {
    functions: Vec<HashFunction>,
    seed: u64,
}

impl HashFamily {
    /// Build `count` functions from `seed`. Same inputs, same family.
    pub fn build(count: usize, seed: u64) -> Self {
        // Keys follow the splitmix64 sequence started at `seed`.
        let functions = (1..=count as u64)
            .map(|i| HashFunction {
                key: mix64(seed.wrapping_add(i.wrapping_mul(GOLDEN_GAMMA))),
            })
            .collect();
        Self { functions, seed }
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn functions(&self) -> &[HashFunction] {
        &self.functions
    }

    pub fn iter(&self) -> impl Iterator<Item = &HashFunction> {
        self.functions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_for_same_seed() {
        assert_eq!(HashFamily::build(32, 7), HashFamily::build(32, 7));
    }

    #[test]
    fn different_seed_different_family() {
        let a = HashFamily::build(8, 1);
        let b = HashFamily::build(8, 2);
        assert_ne!(a, b);
    }

    #[test]
    fn values_below_sentinel() {
        let family = HashFamily::build(16, 1);
        for f in family.iter() {
            for feature in 0..1000u64 {
                assert!(f.hash(feature) < MAX_VALUE);
            }
        }
    }

    #[test]
    fn functions_disagree() {
        let family = HashFamily::build(4, 1);
        let h: Vec<u64> = family.iter().map(|f| f.hash(42)).collect();
        assert!(h.windows(2).any(|w| w[0] != w[1]));
    }

    #[test]
    fn roughly_uniform() {
        // Each half of the range should receive a reasonable share.
        let f = HashFamily::build(1, 3).functions()[0];
        let low = (0..10_000u64).filter(|&x| f.hash(x) < MAX_VALUE / 2).count();
        assert!((4_000..6_000).contains(&low), "skewed: {low}");
    }

    #[test]
    fn prefix_stable() {
        // Growing the family keeps the existing functions.
        let small = HashFamily::build(4, 9);
        let large = HashFamily::build(8, 9);
        assert_eq!(small.functions(), &large.functions()[..4]);
    }
}
