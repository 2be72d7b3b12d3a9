// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Seeded 64-bit mixing and fingerprint extraction shared by every filter.
//!
//! Every filter derives all of its index and fingerprint streams from a single 64-bit seed.
//! Independent streams come from [`Hasher64::derive`], which XORs the seed with one of the
//! salt constants below, so callers never have to supply more than one seed.

/// The seed used when a builder is not given one explicitly.
pub const DEFAULT_SEED: u64 = 0x1234_5678_9abc_def0;

/// Salt for the Bloom filter's in-block probe step hasher.
pub(crate) const BLOOM_STEP_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
/// Salt for the cuckoo filter's alternate-bucket hasher.
pub(crate) const CUCKOO_ALT_SALT: u64 = 0xfeed_beef_1234_5678;
/// Salt for the cuckoo filter's eviction random source.
pub(crate) const CUCKOO_RNG_SALT: u64 = 0xabcd_ef98_7654_3210;
/// Salt for the xor filter's second position hasher.
pub(crate) const XOR_SECOND_SALT: u64 = 0x9e37_79b9_7f4a_7c15;
/// Salt for the xor filter's third position hasher.
pub(crate) const XOR_THIRD_SALT: u64 = 0xbf58_476d_1ce4_e5b9;

/// A seeded hash function over 64-bit keys.
///
/// The hasher is stateless apart from its seed: identical `(seed, key)` pairs always produce
/// the same value.
///
/// # Examples
///
/// ```
/// use amqfilter::hash::Hasher64;
///
/// let h = Hasher64::new(7);
/// assert_eq!(h.hash(42), h.hash(42));
/// assert_ne!(h.hash(42), Hasher64::derive(7, 1).hash(42));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher64 {
    seed: u64,
}

impl Hasher64 {
    /// Creates a hasher for the given seed.
    pub const fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Creates a sibling hasher whose stream is decorrelated from `Hasher64::new(seed)`.
    pub const fn derive(seed: u64, salt: u64) -> Self {
        Self { seed: seed ^ salt }
    }

    /// Returns the seed this hasher mixes into every key.
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Hashes a key.
    #[inline]
    pub fn hash(&self, key: u64) -> u64 {
        mix(self.seed, key)
    }
}

/// Mixes a key with a seed into a well-distributed 64-bit value.
#[inline]
pub fn mix(seed: u64, key: u64) -> u64 {
    splitmix64(key ^ seed)
}

/// The splitmix64 finalizer: an add followed by two multiply-xor-shift rounds.
#[inline]
pub fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9e37_79b9_7f4a_7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// Extracts a `bits`-wide fingerprint from a hash.
///
/// The result always lies in `[1, 2^bits)`. A zero value is remapped to 1, which makes 0 an
/// unambiguous "empty" marker in every table that stores fingerprints. This is the only place
/// the remapping happens.
///
/// # Panics
///
/// Panics in debug builds if `bits` is not in `1..=32`.
///
/// # Examples
///
/// ```
/// use amqfilter::hash::fingerprint;
///
/// assert_eq!(fingerprint(0xabcd, 8), 0xcd);
/// assert_eq!(fingerprint(0x100, 8), 1);
/// ```
#[inline]
pub fn fingerprint(hash: u64, bits: u32) -> u32 {
    debug_assert!((1..=32).contains(&bits), "fingerprint bits must be in 1..=32");
    let mask = if bits >= 32 {
        u32::MAX as u64
    } else {
        (1u64 << bits) - 1
    };
    match (hash & mask) as u32 {
        0 => 1,
        fp => fp,
    }
}

/// Smallest power of two that is at least `x`, with `0` and `1` both mapping to `1`.
pub(crate) fn next_pow2(x: u64) -> u64 {
    x.max(1).next_power_of_two()
}
