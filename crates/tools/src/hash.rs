//! Order-sensitive hash combination for cache keys.
//!
//! Both the combiner and the string hash are fixed algorithms so that keys
//! stay stable across processes and restarts.

/// Stable 32-bit hash of a string, computed over its UTF-16 code units
/// two at a time with two interleaved accumulators.
pub fn string_hash(s: &str) -> i32 {
    let units: Vec<u16> = s.encode_utf16().collect();
    let word = |i: usize| -> i32 {
        let lo = u32::from(units.get(i).copied().unwrap_or(0));
        let hi = u32::from(units.get(i + 1).copied().unwrap_or(0));
        (lo | (hi << 16)) as i32
    };

    let mut hash1: i32 = (5381 << 16) + 5381;
    let mut hash2: i32 = hash1;
    let mut remaining = units.len() as isize;
    let mut at = 0usize;
    while remaining > 0 {
        hash1 = hash1
            .wrapping_shl(5)
            .wrapping_add(hash1)
            .wrapping_add(hash1 >> 27)
            ^ word(at);
        if remaining <= 2 {
            break;
        }
        hash2 = hash2
            .wrapping_shl(5)
            .wrapping_add(hash2)
            .wrapping_add(hash2 >> 27)
            ^ word(at + 2);
        at += 4;
        remaining -= 4;
    }
    hash1.wrapping_add(hash2.wrapping_mul(1_566_083_941))
}

/// Rolling combiner: `h = ((h << 5) + h) ^ x`, seeded with 5381.
///
/// The combiner is `Copy` so a partially-fed state (e.g. after the base key)
/// can be forked and extended with more dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HashCombiner {
    combined: i64,
}

impl HashCombiner {
    pub const SEED: i64 = 0x1505;

    pub fn new() -> Self {
        Self {
            combined: Self::SEED,
        }
    }

    pub fn add_i64(&mut self, value: i64) {
        self.combined = self.combined.wrapping_shl(5).wrapping_add(self.combined) ^ value;
    }

    pub fn add_int(&mut self, value: i32) {
        self.add_i64(i64::from(value));
    }

    pub fn add_str(&mut self, s: &str) {
        self.add_int(string_hash(s));
    }

    pub fn add_case_insensitive_str(&mut self, s: &str) {
        self.add_int(string_hash(&s.to_lowercase()));
    }

    pub fn combined_hash(&self) -> i64 {
        self.combined
    }

    /// Folds the 64-bit state into 32 bits (low word xor high word).
    pub fn combined_hash32(&self) -> i32 {
        (self.combined as i32) ^ ((self.combined >> 32) as i32)
    }

    /// Lowercase hex of the two's-complement 64-bit state.
    pub fn combined_hash_string(&self) -> String {
        format!("{:x}", self.combined)
    }
}

impl Default for HashCombiner {
    fn default() -> Self {
        Self::new()
    }
}
