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

use crate::MembershipFilter;
use crate::error::Error;
use crate::hash::Hasher64;
use crate::hash::XOR_SECOND_SALT;
use crate::hash::XOR_THIRD_SALT;
use crate::hash::fingerprint;
use crate::hash::next_pow2;
use crate::hash::splitmix64;
use crate::xor::XorFilterBuilder;

/// Array slots per key before rounding up to a power of two.
const SLOTS_PER_KEY: f64 = 1.23;
const MAX_ARRAY_SIZE: u64 = 1 << 36;

/// Outcome of constructing a [`XorFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStatus {
    /// Construction succeeded.
    Built {
        /// Number of attempts used, including the successful one. Zero for an empty key set.
        attempts: u32,
    },
    /// Every attempt stalled while peeling. The filter stores nothing and rejects every key.
    Failed {
        /// Number of attempts made.
        attempts: u32,
    },
}

/// Operation counters of a [`XorFilter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct XorStats {
    /// Number of recorded lookups (see [`XorFilter::query`]).
    pub lookups: u64,
    /// Number of recorded lookups that returned `true`.
    pub positives: u64,
}

/// An immutable xor filter over 64-bit keys with fingerprints of up to 16 bits.
///
/// Each key maps to three slots of a power-of-two sized array. A key is reported present when
/// the XOR of its three slots equals its fingerprint, so inserted keys are always found.
///
/// # Examples
///
/// ```
/// use amqfilter::xor::XorFilter;
///
/// let keys: Vec<u64> = (0..10_000).collect();
/// let filter = XorFilter::builder().build(&keys).unwrap();
///
/// assert!(filter.contains(42));
/// assert_eq!(filter.len(), 10_000);
/// ```
#[derive(Debug, Clone)]
pub struct XorFilter {
    /// Seed of the attempt that succeeded, or the initial seed on failure.
    seed: u64,
    hashers: [Hasher64; 3],
    fingerprint_bits: u32,
    /// Distinct keys the filter was built from.
    num_keys: u64,
    /// Empty unless the build succeeded with at least one key.
    fingerprints: Vec<u16>,
    status: BuildStatus,
    stats: XorStats,
}

/// A key removed from the hypergraph together with the slot it was peeled at.
#[derive(Debug, Clone, Copy)]
struct Peeled {
    key: u64,
    slot: usize,
}

/// Degree and XOR of the keys currently incident to one slot.
#[derive(Debug, Default, Clone, Copy)]
struct SlotSet {
    count: u32,
    keys: u64,
}

fn hashers_for(seed: u64) -> [Hasher64; 3] {
    [
        Hasher64::new(seed),
        Hasher64::derive(seed, XOR_SECOND_SALT),
        Hasher64::derive(seed, XOR_THIRD_SALT),
    ]
}

#[inline]
fn slots_of(hashers: &[Hasher64; 3], key: u64, mask: u64) -> [usize; 3] {
    hashers.map(|h| (h.hash(key) & mask) as usize)
}

#[inline]
fn fingerprint_of(hashers: &[Hasher64; 3], key: u64, bits: u32) -> u16 {
    fingerprint(hashers[0].hash(key) >> 32, bits) as u16
}

impl XorFilter {
    /// Creates a builder for xor filters.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::xor::XorFilter;
    ///
    /// let keys: Vec<u64> = (0..1_000).collect();
    /// let filter = XorFilter::builder().build(&keys).unwrap();
    /// assert!(filter.contains(42));
    /// ```
    pub fn builder() -> XorFilterBuilder {
        XorFilterBuilder::default()
    }

    pub(super) fn build_from_keys(
        keys: &[u64],
        fingerprint_bits: u32,
        seed: u64,
        max_attempts: u32,
    ) -> Result<Self, Error> {
        let mut keys = keys.to_vec();
        keys.sort_unstable();
        keys.dedup();

        if keys.is_empty() {
            return Ok(Self::empty(
                seed,
                fingerprint_bits,
                0,
                BuildStatus::Built { attempts: 0 },
            ));
        }

        let array_size = compute_array_size(keys.len() as u64)?;
        Ok(Self::construct(
            &keys,
            fingerprint_bits,
            seed,
            max_attempts,
            array_size,
        ))
    }

    /// Runs up to `max_attempts` peeling attempts over distinct `keys`.
    fn construct(
        keys: &[u64],
        fingerprint_bits: u32,
        seed: u64,
        max_attempts: u32,
        array_size: usize,
    ) -> Self {
        debug_assert!(array_size.is_power_of_two());
        let mut attempt_seed = seed;
        for attempt in 1..=max_attempts {
            if attempt > 1 {
                attempt_seed = splitmix64(seed.wrapping_add(u64::from(attempt)));
            }

            let hashers = hashers_for(attempt_seed);
            match try_assign(keys, &hashers, fingerprint_bits, array_size) {
                Some(fingerprints) => {
                    tracing::debug!(
                        keys = keys.len(),
                        array_size,
                        attempts = attempt,
                        "built xor filter"
                    );
                    return Self {
                        seed: attempt_seed,
                        hashers,
                        fingerprint_bits,
                        num_keys: keys.len() as u64,
                        fingerprints,
                        status: BuildStatus::Built { attempts: attempt },
                        stats: XorStats::default(),
                    };
                }
                None => {
                    tracing::debug!(attempt, seed = attempt_seed, "xor peeling stalled, retrying");
                }
            }
        }

        tracing::warn!(
            keys = keys.len(),
            attempts = max_attempts,
            "xor filter construction failed; filter will reject every key"
        );
        Self::empty(
            seed,
            fingerprint_bits,
            keys.len() as u64,
            BuildStatus::Failed {
                attempts: max_attempts,
            },
        )
    }

    fn empty(seed: u64, fingerprint_bits: u32, num_keys: u64, status: BuildStatus) -> Self {
        Self {
            seed,
            hashers: hashers_for(seed),
            fingerprint_bits,
            num_keys,
            fingerprints: Vec::new(),
            status,
            stats: XorStats::default(),
        }
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Returns `true` if the filter probably contains the key.
    ///
    /// Keys the filter was built from always return `true` unless the build failed.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::xor::XorFilter;
    ///
    /// let keys: Vec<u64> = (0..1_000).collect();
    /// let filter = XorFilter::builder().build(&keys).unwrap();
    /// assert!(filter.contains(7));
    /// ```
    pub fn contains(&self, key: u64) -> bool {
        if self.fingerprints.is_empty() {
            return false;
        }
        let mask = (self.fingerprints.len() - 1) as u64;
        let [a, b, c] = slots_of(&self.hashers, key, mask);
        let fp = fingerprint_of(&self.hashers, key, self.fingerprint_bits);
        fp == self.fingerprints[a] ^ self.fingerprints[b] ^ self.fingerprints[c]
    }

    /// Same as [`contains`](Self::contains), and records the lookup in the stats.
    pub fn query(&mut self, key: u64) -> bool {
        let found = self.contains(key);
        self.stats.lookups += 1;
        if found {
            self.stats.positives += 1;
        }
        found
    }

    /// Returns the outcome of construction.
    pub fn status(&self) -> BuildStatus {
        self.status
    }

    /// Returns `true` if construction succeeded.
    pub fn is_built(&self) -> bool {
        matches!(self.status, BuildStatus::Built { .. })
    }

    /// Returns the number of distinct keys the filter was built from.
    ///
    /// For a failed build this still counts the keys that were offered.
    pub fn len(&self) -> u64 {
        self.num_keys
    }

    /// Returns `true` if the filter stores no fingerprints.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::xor::XorFilter;
    ///
    /// let filter = XorFilter::builder().build(&[]).unwrap();
    /// assert!(filter.is_empty());
    /// ```
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }

    /// Returns the number of slots in the fingerprint array.
    pub fn array_size(&self) -> usize {
        self.fingerprints.len()
    }

    /// Returns the fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.fingerprint_bits
    }

    /// Returns the seed the stored fingerprints were computed with.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the fingerprint bits stored per key for a set of `n` keys.
    ///
    /// A failed or empty filter stores nothing and reports 0.
    pub fn bits_per_entry(&self, n: u64) -> f64 {
        if n == 0 {
            return 0.0;
        }
        (self.fingerprints.len() as u64 * u64::from(self.fingerprint_bits)) as f64 / n as f64
    }

    /// Returns a snapshot of the lookup counters.
    pub fn stats(&self) -> XorStats {
        self.stats
    }

    /// Clears the lookup counters.
    pub fn reset_stats(&mut self) {
        self.stats = XorStats::default();
    }
}

impl MembershipFilter for XorFilter {
    fn contains(&self, key: u64) -> bool {
        XorFilter::contains(self, key)
    }

    fn bits_per_entry(&self, n: u64) -> f64 {
        XorFilter::bits_per_entry(self, n)
    }
}

fn compute_array_size(num_keys: u64) -> Result<usize, Error> {
    let array_size = next_pow2((num_keys as f64 * SLOTS_PER_KEY).ceil() as u64);
    if array_size > MAX_ARRAY_SIZE {
        return Err(Error::config_invalid("key set too large for xor filter")
            .with_context("keys", num_keys));
    }
    Ok(array_size as usize)
}

/// Peels the key hypergraph and assigns slot values, or returns `None` if peeling stalls.
fn try_assign(
    keys: &[u64],
    hashers: &[Hasher64; 3],
    fingerprint_bits: u32,
    array_size: usize,
) -> Option<Vec<u16>> {
    let mask = (array_size - 1) as u64;
    let mut sets = vec![SlotSet::default(); array_size];
    for &key in keys {
        for slot in slots_of(hashers, key, mask) {
            sets[slot].count += 1;
            sets[slot].keys ^= key;
        }
    }

    let mut queue: Vec<usize> = (0..array_size).filter(|&i| sets[i].count == 1).collect();
    let mut stack: Vec<Peeled> = Vec::with_capacity(keys.len());
    while let Some(slot) = queue.pop() {
        if sets[slot].count != 1 {
            continue;
        }
        let key = sets[slot].keys;
        stack.push(Peeled { key, slot });
        for other in slots_of(hashers, key, mask) {
            sets[other].count -= 1;
            sets[other].keys ^= key;
            if sets[other].count == 1 {
                queue.push(other);
            }
        }
    }

    if stack.len() != keys.len() {
        return None;
    }

    let mut fingerprints = vec![0u16; array_size];
    for peeled in stack.iter().rev() {
        let [a, b, c] = slots_of(hashers, peeled.key, mask);
        // the peeled slot is still zero here, so it drops out of the XOR
        let fp = fingerprint_of(hashers, peeled.key, fingerprint_bits);
        fingerprints[peeled.slot] = fp ^ fingerprints[a] ^ fingerprints[b] ^ fingerprints[c];
    }
    Some(fingerprints)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(n: u64) -> Vec<u64> {
        (0..n).map(|i| splitmix64(i ^ 0x5555)).collect()
    }

    #[test]
    fn test_array_size_is_power_of_two() {
        assert_eq!(compute_array_size(1).unwrap(), 2);
        assert_eq!(compute_array_size(100).unwrap(), 128);
        assert_eq!(compute_array_size(1000).unwrap(), 2048);
    }

    #[test]
    fn test_built_filter_has_no_false_negatives() {
        let keys = keys(5_000);
        let filter = XorFilter::build_from_keys(&keys, 8, 7, 20).unwrap();
        assert!(filter.is_built());
        assert_eq!(filter.array_size(), 8192);
        for &key in &keys {
            assert!(filter.contains(key));
        }
    }

    #[test]
    fn test_stalled_construction_yields_failed_filter() {
        // a single slot is never peelable
        let keys = keys(10);
        let mut filter = XorFilter::construct(&keys, 12, 3, 4, 1);
        assert_eq!(filter.status(), BuildStatus::Failed { attempts: 4 });
        assert!(filter.is_empty());
        assert_eq!(filter.len(), 10);
        assert_eq!(filter.bits_per_entry(10), 0.0);
        for &key in &keys {
            assert!(!filter.query(key));
        }
        assert_eq!(filter.stats().positives, 0);
        assert_eq!(filter.stats().lookups, 10);
    }

    #[test]
    fn test_duplicate_keys_are_collapsed() {
        let mut keys = keys(1_000);
        keys.extend_from_slice(&keys.clone());
        let filter = XorFilter::build_from_keys(&keys, 12, 11, 20).unwrap();
        assert!(filter.is_built());
        assert_eq!(filter.len(), 1_000);
        for &key in &keys {
            assert!(filter.contains(key));
        }
    }
}
