//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! Each simulation instance owns exactly one generator (inside its `World`).
//! There is no process-wide instance, so batch runs never share a stream.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

/// Algorithm identifier written into every portable state.
pub const RNG_ALGORITHM: &str = "xorshift128+";

/// Version of the portable state layout.
pub const RNG_STATE_VERSION: u8 = 1;

/// Number of 64-bit words in the generator state.
const STATE_WORDS: usize = 2;

/// Scale for converting 53 random bits to a double in [0, 1).
const F64_UNIT: f64 = 1.0 / (1u64 << 53) as f64;

/// Errors returned when restoring a generator from a portable state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RngStateError {
    /// State was produced by a different algorithm.
    #[error("unsupported rng algorithm {0:?}")]
    UnknownAlgorithm(String),

    /// State layout version is not understood by this build.
    #[error("unsupported rng state version {found} (expected {expected})")]
    UnsupportedVersion {
        /// Version found in the state.
        found: u8,
        /// Version this build writes.
        expected: u8,
    },

    /// Wrong number of state words.
    #[error("rng state must contain {expected} words, got {found}")]
    WordCount {
        /// Words found in the state.
        found: usize,
        /// Words required.
        expected: usize,
    },

    /// All-zero state (Xorshift would be stuck at zero forever).
    #[error("rng state is all zeros")]
    ZeroState,
}

/// Portable, versioned encoding of a generator state.
///
/// On human-readable formats this is written as the nested array
/// `["xorshift128+", 1, [w0, w1]]`. The object form
/// `{"algorithm": .., "version": .., "words": [..]}` is accepted on input.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RngState {
    /// Algorithm identifier.
    pub algorithm: String,
    /// Layout version.
    pub version: u8,
    /// Raw state words.
    pub words: Vec<u64>,
}

impl RngState {
    /// Wrap native Xorshift128+ state words.
    pub fn from_words(words: [u64; 2]) -> Self {
        Self {
            algorithm: RNG_ALGORITHM.to_string(),
            version: RNG_STATE_VERSION,
            words: words.to_vec(),
        }
    }

    /// Validate and convert back to native state words.
    pub fn to_words(&self) -> Result<[u64; 2], RngStateError> {
        if self.algorithm != RNG_ALGORITHM {
            return Err(RngStateError::UnknownAlgorithm(self.algorithm.clone()));
        }
        if self.version != RNG_STATE_VERSION {
            return Err(RngStateError::UnsupportedVersion {
                found: self.version,
                expected: RNG_STATE_VERSION,
            });
        }
        if self.words.len() != STATE_WORDS {
            return Err(RngStateError::WordCount {
                found: self.words.len(),
                expected: STATE_WORDS,
            });
        }
        let words = [self.words[0], self.words[1]];
        if words == [0, 0] {
            return Err(RngStateError::ZeroState);
        }
        Ok(words)
    }
}

impl Serialize for RngState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (&self.algorithm, self.version, &self.words).serialize(serializer)
    }
}

/// Accepted shapes of a human-readable RNG state.
#[derive(Deserialize)]
#[serde(untagged)]
enum RngStateRepr {
    Nested(String, u8, Vec<u64>),
    Object {
        algorithm: String,
        version: u8,
        words: Vec<u64>,
    },
}

impl<'de> Deserialize<'de> for RngState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Untagged enums need self-describing input; binary formats only
        // ever see the tuple this type serializes to.
        if deserializer.is_human_readable() {
            let (algorithm, version, words) = match RngStateRepr::deserialize(deserializer)? {
                RngStateRepr::Nested(algorithm, version, words) => (algorithm, version, words),
                RngStateRepr::Object { algorithm, version, words } => (algorithm, version, words),
            };
            Ok(Self { algorithm, version, words })
        } else {
            let (algorithm, version, words) = <(String, u8, Vec<u64>)>::deserialize(deserializer)?;
            Ok(Self { algorithm, version, words })
        }
    }
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed (or the same restored [`RngState`]), every
/// operation produces the exact same results on any platform. No other
/// entropy source is consulted.
///
/// # Example
///
/// ```
/// use rollsync::core::rng::DeterministicRng;
///
/// let mut rng = DeterministicRng::new(12345);
/// let value = rng.next_u64();
/// assert_eq!(value, 6233086606872742541); // Always the same!
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        Self {
            state: seeded_state(seed),
        }
    }

    /// Re-seed in place, discarding the current stream.
    pub fn seed(&mut self, seed: u64) {
        self.state = seeded_state(seed);
        debug!(seed, "rng re-seeded");
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Next double in `[0.0, 1.0)` built from the top 53 bits.
    #[inline]
    pub fn random(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * F64_UNIT
    }

    /// Random integer N with `a <= N <= b`.
    ///
    /// Returns `a` when the range is empty or inverted.
    pub fn randint(&mut self, a: i64, b: i64) -> i64 {
        if a >= b {
            return a;
        }
        let span = (b as i128 - a as i128 + 1) as u128;
        if span > u64::MAX as u128 {
            // Full 64-bit range: every value is valid.
            return self.next_u64() as i64;
        }
        // Simple modulo - slight bias for very large spans, but acceptable
        let offset = self.next_u64() % span as u64;
        (a as i128 + offset as i128) as i64
    }

    /// Random double N with `a <= N <= b` (or `b <= N <= a`).
    #[inline]
    pub fn uniform(&mut self, a: f64, b: f64) -> f64 {
        a + (b - a) * self.random()
    }

    /// Select a random element from a slice.
    pub fn choice<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        if slice.is_empty() {
            None
        } else {
            let idx = self.next_u64() % slice.len() as u64;
            slice.get(idx as usize)
        }
    }

    /// Shuffle a slice in place using Fisher-Yates algorithm.
    pub fn shuffle<T>(&mut self, slice: &mut [T]) {
        let len = slice.len();
        for i in (1..len).rev() {
            let j = (self.next_u64() % (i as u64 + 1)) as usize;
            slice.swap(i, j);
        }
    }

    /// Capture the current state in its portable form.
    pub fn get_state(&self) -> RngState {
        RngState::from_words(self.state)
    }

    /// Restore from a state previously returned by [`get_state`](Self::get_state).
    pub fn set_state(&mut self, state: &RngState) -> Result<(), RngStateError> {
        self.state = state.to_words()?;
        Ok(())
    }

    /// Native state words (for hashing and debugging).
    pub fn words(&self) -> [u64; 2] {
        self.state
    }
}

fn seeded_state(seed: u64) -> [u64; 2] {
    let mut s = seed;
    let state0 = splitmix64(&mut s);
    let state1 = splitmix64(&mut s);

    // Ensure state is never all zeros
    if state0 == 0 && state1 == 0 {
        [1, 1]
    } else {
        [state0, state1]
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive an independent stream seed from a base seed and a stream index.
///
/// Batch runs use this so that instance `n` never shares a sequence with
/// instance `n + 1` even when base seeds are consecutive.
pub fn derive_stream_seed(base_seed: u64, stream: u64) -> u64 {
    let mut hasher = Sha256::new();

    // Domain separator
    hasher.update(b"ROLLSYNC_STREAM_V1");
    hasher.update(base_seed.to_le_bytes());
    hasher.update(stream.to_le_bytes());

    let hash = hasher.finalize();

    // Take first 8 bytes as seed
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[0..8]);
    u64::from_le_bytes(bytes)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_known_values() {
        // These values must never change!
        // If they do, existing replays will break.
        let mut rng = DeterministicRng::new(42);
        assert_eq!(rng.next_u64(), 16629283624882167704);
        assert_eq!(rng.next_u64(), 1420492921613871959);
        assert_eq!(rng.next_u64(), 9768315062676884790);
    }

    #[test]
    fn test_random_unit_interval() {
        let mut rng = DeterministicRng::new(9999);
        for _ in 0..10_000 {
            let v = rng.random();
            assert!((0.0..1.0).contains(&v));
        }
    }

    #[test]
    fn test_randint_inclusive_bounds() {
        let mut rng = DeterministicRng::new(5678);
        let mut seen_low = false;
        let mut seen_high = false;

        for _ in 0..2000 {
            let val = rng.randint(-3, 3);
            assert!((-3..=3).contains(&val));
            seen_low |= val == -3;
            seen_high |= val == 3;
        }
        assert!(seen_low && seen_high);

        // Edge case: a = b
        assert_eq!(rng.randint(5, 5), 5);
        // Full range does not overflow
        let _ = rng.randint(i64::MIN, i64::MAX);
    }

    #[test]
    fn test_uniform_range() {
        let mut rng = DeterministicRng::new(77);
        for _ in 0..1000 {
            let v = rng.uniform(2.5, 4.0);
            assert!((2.5..=4.0).contains(&v));
        }
    }

    #[test]
    fn test_choice() {
        let mut rng = DeterministicRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choice(&empty).is_none());

        let items = ["left", "right", "jump"];
        for _ in 0..100 {
            assert!(items.contains(rng.choice(&items).unwrap()));
        }
    }

    #[test]
    fn test_shuffle_determinism() {
        let mut rng1 = DeterministicRng::new(1111);
        let mut rng2 = DeterministicRng::new(1111);

        let mut arr1 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];
        let mut arr2 = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

        rng1.shuffle(&mut arr1);
        rng2.shuffle(&mut arr2);

        assert_eq!(arr1, arr2);
        let mut sorted = arr1;
        sorted.sort();
        assert_eq!(sorted, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
    }

    #[test]
    fn test_state_checkpoint_every_operation() {
        let mut rng = DeterministicRng::new(5555);
        for _ in 0..50 {
            rng.next_u64();
        }

        let saved = rng.get_state();
        let run = |rng: &mut DeterministicRng| {
            let mut list = vec![1, 2, 3, 4, 5];
            rng.shuffle(&mut list);
            (
                rng.random().to_bits(),
                rng.randint(0, 1000),
                rng.uniform(-1.0, 1.0).to_bits(),
                *rng.choice(&[10, 20, 30]).unwrap(),
                list,
            )
        };

        let first = run(&mut rng);
        rng.set_state(&saved).unwrap();
        let second = run(&mut rng);

        assert_eq!(first, second);
    }

    #[test]
    fn test_reseed_matches_fresh() {
        let mut rng = DeterministicRng::new(1);
        rng.next_u64();
        rng.seed(42);
        assert_eq!(rng, DeterministicRng::new(42));
    }

    #[test]
    fn test_state_json_nested_array_form() {
        let state = DeterministicRng::new(3).get_state();
        let json = serde_json::to_value(&state).unwrap();

        assert!(json.is_array());
        assert_eq!(json[0], RNG_ALGORITHM);
        assert_eq!(json[1], RNG_STATE_VERSION);
        assert!(json[2].is_array());

        let back: RngState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_state_json_object_form_accepted() {
        let state = DeterministicRng::new(3).get_state();
        let json = serde_json::json!({
            "algorithm": state.algorithm,
            "version": state.version,
            "words": state.words,
        });
        let back: RngState = serde_json::from_value(json).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_state_bincode_roundtrip() {
        let state = DeterministicRng::new(8).get_state();
        let bytes = bincode::serialize(&state).unwrap();
        let back: RngState = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back, state);
    }

    #[test]
    fn test_set_state_rejects_bad_states() {
        let mut rng = DeterministicRng::new(1);

        let mut foreign = rng.get_state();
        foreign.algorithm = "mt19937".to_string();
        assert!(matches!(
            rng.set_state(&foreign),
            Err(RngStateError::UnknownAlgorithm(_))
        ));

        let mut future = rng.get_state();
        future.version = 9;
        assert!(matches!(
            rng.set_state(&future),
            Err(RngStateError::UnsupportedVersion { found: 9, .. })
        ));

        let mut short = rng.get_state();
        short.words.pop();
        assert!(matches!(
            rng.set_state(&short),
            Err(RngStateError::WordCount { found: 1, .. })
        ));

        let zero = RngState::from_words([0, 0]);
        assert_eq!(rng.set_state(&zero), Err(RngStateError::ZeroState));
    }

    #[test]
    fn test_derive_stream_seed() {
        let a = derive_stream_seed(42, 0);
        assert_eq!(a, derive_stream_seed(42, 0));
        assert_ne!(a, derive_stream_seed(42, 1));
        assert_ne!(a, derive_stream_seed(43, 0));
    }

    #[test]
    fn test_state_roundtrip_arbitrary_seeds() {
        use rand::{Rng, SeedableRng};

        let mut seeds = rand::rngs::StdRng::seed_from_u64(0xC0FFEE);
        for _ in 0..100 {
            let mut rng = DeterministicRng::new(seeds.gen());
            for _ in 0..seeds.gen_range(0..64) {
                rng.next_u64();
            }

            let json = serde_json::to_string(&rng.get_state()).unwrap();
            let state: RngState = serde_json::from_str(&json).unwrap();
            let mut restored = DeterministicRng::new(0);
            restored.set_state(&state).unwrap();

            assert_eq!(restored.next_u64(), rng.next_u64());
        }
    }
}
