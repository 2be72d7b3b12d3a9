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
use crate::common::random::RandomSource;
use crate::common::random::XorShift64;
use crate::cuckoo::CuckooFilterBuilder;
use crate::hash::CUCKOO_ALT_SALT;
use crate::hash::CUCKOO_RNG_SALT;
use crate::hash::Hasher64;
use crate::hash::fingerprint;

/// Marks an empty slot. Stored fingerprints are never 0.
const EMPTY: u16 = 0;

/// Operation counters of a [`CuckooFilter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CuckooStats {
    /// Number of `insert` calls.
    pub inserts: u64,
    /// Inserts that ran out of both eviction budget and stash room.
    pub insert_failures: u64,
    /// Number of `erase` calls.
    pub deletes: u64,
    /// Erases that found nothing to remove.
    pub delete_misses: u64,
    /// Total evictions performed.
    pub kicks: u64,
    /// Longest eviction walk of a single insert.
    pub max_kicks: u64,
    /// Fingerprints placed in the stash.
    pub stash_inserts: u64,
    /// Recorded lookups answered from the stash.
    pub stash_hits: u64,
    /// Number of recorded lookups (see [`CuckooFilter::query`]).
    pub lookups: u64,
    /// Slot comparisons made by recorded lookups.
    pub fingerprint_checks: u64,
}

impl CuckooStats {
    fn record_insert(&mut self, placement: Placement) {
        self.inserts += 1;
        let kicks = match placement {
            Placement::Direct => 0,
            Placement::Relocated { kicks } => kicks,
            Placement::Stashed { kicks } => {
                self.stash_inserts += 1;
                kicks
            }
            Placement::Failed { kicks } => {
                self.insert_failures += 1;
                kicks
            }
        };
        self.kicks += u64::from(kicks);
        self.max_kicks = self.max_kicks.max(u64::from(kicks));
    }

    fn record_lookup(&mut self, lookup: Lookup) {
        self.lookups += 1;
        self.fingerprint_checks += u64::from(lookup.fingerprint_checks);
        if lookup.stash_hit {
            self.stash_hits += 1;
        }
    }

    fn record_erase(&mut self, removed: bool) {
        self.deletes += 1;
        if !removed {
            self.delete_misses += 1;
        }
    }
}

/// How an insert ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Found a free slot in one of the two candidate buckets.
    Direct,
    /// Found a free slot after evicting `kicks` fingerprints.
    Relocated { kicks: u32 },
    /// The walk ran out of budget and the displaced fingerprint went to the stash.
    Stashed { kicks: u32 },
    /// The walk ran out of budget, the stash is full, and the walk was undone.
    Failed { kicks: u32 },
}

impl Placement {
    fn is_success(self) -> bool {
        !matches!(self, Placement::Failed { .. })
    }
}

/// The result of a lookup together with the work it took.
#[derive(Debug, Clone, Copy)]
struct Lookup {
    found: bool,
    fingerprint_checks: u32,
    stash_hit: bool,
}

/// A key's fingerprint and its two candidate buckets.
#[derive(Debug, Clone, Copy)]
struct Candidates {
    fingerprint: u16,
    primary: usize,
    alternate: usize,
}

/// A fingerprint that could not be placed in the table, with both buckets it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StashEntry {
    fingerprint: u16,
    buckets: [usize; 2],
}

impl StashEntry {
    fn matches(&self, c: &Candidates) -> bool {
        self.fingerprint == c.fingerprint
            && (self.buckets.contains(&c.primary) || self.buckets.contains(&c.alternate))
    }
}

/// A bucketized cuckoo filter with a bounded stash.
///
/// Use [`CuckooFilterBuilder`] to construct instances.
///
/// # Examples
///
/// ```
/// use amqfilter::cuckoo::CuckooFilter;
///
/// let mut filter = CuckooFilter::builder(1_000).build().unwrap();
/// for key in 0..500 {
///     assert!(filter.insert(key));
/// }
/// assert_eq!(filter.len(), 500);
/// assert!((0..500).all(|key| filter.contains(key)));
/// ```
#[derive(Debug, Clone)]
pub struct CuckooFilter {
    seed: u64,
    fingerprint_bits: u32,
    bucket_size: usize,
    max_kicks: u32,
    /// Always a power of two
    num_buckets: u64,
    mask: u64,
    /// `num_buckets * bucket_size` slots, bucket-major
    table: Vec<u16>,
    stash: Vec<StashEntry>,
    stash_capacity: usize,
    /// Live fingerprints, table and stash together
    len: usize,
    hasher: Hasher64,
    alt_hasher: Hasher64,
    rng: XorShift64,
    stats: CuckooStats,
}

impl CuckooFilter {
    /// Returns a builder for a filter expected to hold `capacity` keys.
    pub fn builder(capacity: u64) -> CuckooFilterBuilder {
        CuckooFilterBuilder::with_capacity(capacity)
    }

    pub(super) fn with_layout(
        seed: u64,
        num_buckets: u64,
        bucket_size: usize,
        fingerprint_bits: u32,
        max_kicks: u32,
        stash_capacity: usize,
    ) -> Self {
        debug_assert!(num_buckets.is_power_of_two());
        CuckooFilter {
            seed,
            fingerprint_bits,
            bucket_size,
            max_kicks,
            num_buckets,
            mask: num_buckets - 1,
            table: vec![EMPTY; num_buckets as usize * bucket_size],
            stash: Vec::with_capacity(stash_capacity),
            stash_capacity,
            len: 0,
            hasher: Hasher64::new(seed),
            alt_hasher: Hasher64::derive(seed, CUCKOO_ALT_SALT),
            rng: XorShift64::seeded(seed ^ CUCKOO_RNG_SALT),
            stats: CuckooStats::default(),
        }
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts a key, returning whether it was stored.
    ///
    /// A `false` result is an expected outcome near capacity. The filter is left exactly as it
    /// was before the call, so every previously inserted key is still found.
    pub fn insert(&mut self, key: u64) -> bool {
        let placement = self.place(key);
        self.stats.record_insert(placement);
        if placement.is_success() {
            self.len += 1;
        }
        placement.is_success()
    }

    /// Removes one copy of the key's fingerprint, returning whether anything was removed.
    pub fn erase(&mut self, key: u64) -> bool {
        let c = self.candidates(key);
        let removed = self.bucket_remove(c.primary, c.fingerprint)
            || self.bucket_remove(c.alternate, c.fingerprint)
            || self.stash_remove(&c);
        self.stats.record_erase(removed);
        if removed {
            self.len -= 1;
        }
        removed
    }

    fn place(&mut self, key: u64) -> Placement {
        let c = self.candidates(key);
        if self.bucket_insert(c.primary, c.fingerprint)
            || self.bucket_insert(c.alternate, c.fingerprint)
        {
            return Placement::Direct;
        }

        let mut bucket = if self.rng.next_bool() {
            c.primary
        } else {
            c.alternate
        };
        let mut in_flight = c.fingerprint;
        // (slot, previous value) for every swap, so a failed walk can be undone.
        let mut undo_log: Vec<(usize, u16)> = Vec::new();

        for kick in 1..=self.max_kicks {
            let slot = bucket * self.bucket_size + self.rng.next_below(self.bucket_size);
            undo_log.push((slot, self.table[slot]));
            std::mem::swap(&mut in_flight, &mut self.table[slot]);
            bucket = self.alt_index(bucket, in_flight);
            if self.bucket_insert(bucket, in_flight) {
                return Placement::Relocated { kicks: kick };
            }
        }

        if self.stash.len() < self.stash_capacity {
            let entry = StashEntry {
                fingerprint: in_flight,
                buckets: [bucket, self.alt_index(bucket, in_flight)],
            };
            self.stash.push(entry);
            tracing::debug!(
                stash_len = self.stash.len(),
                stash_capacity = self.stash_capacity,
                "cuckoo eviction walk spilled into stash"
            );
            return Placement::Stashed {
                kicks: self.max_kicks,
            };
        }

        for (slot, previous) in undo_log.into_iter().rev() {
            self.table[slot] = previous;
        }
        tracing::debug!(len = self.len, "cuckoo insert failed: eviction budget and stash exhausted");
        Placement::Failed {
            kicks: self.max_kicks,
        }
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether a key is possibly in the set.
    pub fn contains(&self, key: u64) -> bool {
        self.lookup(key).found
    }

    /// Same as [`contains`](Self::contains), and records the lookup in [`stats`](Self::stats).
    pub fn query(&mut self, key: u64) -> bool {
        let lookup = self.lookup(key);
        self.stats.record_lookup(lookup);
        lookup.found
    }

    fn lookup(&self, key: u64) -> Lookup {
        let c = self.candidates(key);
        let mut checks = 0;
        for bucket in [c.primary, c.alternate] {
            let (found, compared) = self.bucket_contains(bucket, c.fingerprint);
            checks += compared;
            if found {
                return Lookup {
                    found: true,
                    fingerprint_checks: checks,
                    stash_hit: false,
                };
            }
        }
        let stash_hit = self.stash.iter().any(|entry| entry.matches(&c));
        Lookup {
            found: stash_hit,
            fingerprint_checks: checks,
            stash_hit,
        }
    }

    // ========================================================================
    // Table Helpers
    // ========================================================================

    fn candidates(&self, key: u64) -> Candidates {
        let hash = self.hasher.hash(key);
        let fingerprint = fingerprint((hash >> 32) ^ hash, self.fingerprint_bits) as u16;
        let primary = (hash & self.mask) as usize;
        Candidates {
            fingerprint,
            primary,
            alternate: self.alt_index(primary, fingerprint),
        }
    }

    /// The other bucket of a fingerprint stored in `bucket`.
    ///
    /// `alt_index(alt_index(b, fp), fp) == b` for every bucket `b`.
    #[inline]
    fn alt_index(&self, bucket: usize, fingerprint: u16) -> usize {
        let offset = self.alt_hasher.hash(u64::from(fingerprint));
        ((bucket as u64 ^ offset) & self.mask) as usize
    }

    fn bucket(&self, bucket: usize) -> &[u16] {
        let base = bucket * self.bucket_size;
        &self.table[base..base + self.bucket_size]
    }

    fn bucket_mut(&mut self, bucket: usize) -> &mut [u16] {
        let base = bucket * self.bucket_size;
        &mut self.table[base..base + self.bucket_size]
    }

    /// Returns whether the bucket holds `fp`, and how many slots were compared.
    fn bucket_contains(&self, bucket: usize, fp: u16) -> (bool, u32) {
        let mut compared = 0;
        for &slot in self.bucket(bucket) {
            compared += 1;
            if slot == fp {
                return (true, compared);
            }
        }
        (false, compared)
    }

    fn bucket_insert(&mut self, bucket: usize, fp: u16) -> bool {
        debug_assert_ne!(fp, EMPTY);
        match self.bucket_mut(bucket).iter_mut().find(|slot| **slot == EMPTY) {
            Some(slot) => {
                *slot = fp;
                true
            }
            None => false,
        }
    }

    fn bucket_remove(&mut self, bucket: usize, fp: u16) -> bool {
        match self.bucket_mut(bucket).iter_mut().find(|slot| **slot == fp) {
            Some(slot) => {
                *slot = EMPTY;
                true
            }
            None => false,
        }
    }

    fn stash_remove(&mut self, c: &Candidates) -> bool {
        match self.stash.iter().position(|entry| entry.matches(c)) {
            Some(index) => {
                self.stash.swap_remove(index);
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Statistics and Properties
    // ========================================================================

    /// Returns the number of stored fingerprints, including stashed ones.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the filter holds no fingerprints.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the realized number of bits per key for a filter holding `n` keys.
    ///
    /// Counts every table slot plus every stash entry (fingerprint and two 32-bit bucket
    /// indices) at full capacity, so the value does not change as the filter fills.
    pub fn bits_per_entry(&self, n: u64) -> f64 {
        let fp_bits = f64::from(self.fingerprint_bits);
        let table_bits = self.table.len() as f64 * fp_bits;
        let stash_bits = self.stash_capacity as f64 * (fp_bits + 64.0);
        (table_bits + stash_bits) / n as f64
    }

    /// Returns the number of buckets.
    pub fn num_buckets(&self) -> u64 {
        self.num_buckets
    }

    /// Returns the number of slots per bucket.
    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }

    /// Returns the fingerprint width in bits.
    pub fn fingerprint_bits(&self) -> u32 {
        self.fingerprint_bits
    }

    /// Returns the eviction budget of one insert.
    pub fn max_kicks(&self) -> u32 {
        self.max_kicks
    }

    /// Returns the number of occupied stash entries.
    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the fraction of table slots holding a fingerprint.
    pub fn load_factor(&self) -> f64 {
        let used = self.table.iter().filter(|&&slot| slot != EMPTY).count();
        used as f64 / self.table.len() as f64
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> CuckooStats {
        self.stats
    }

    /// Zeroes the operation counters.
    pub fn reset_stats(&mut self) {
        self.stats = CuckooStats::default();
    }
}

impl MembershipFilter for CuckooFilter {
    fn contains(&self, key: u64) -> bool {
        CuckooFilter::contains(self, key)
    }

    fn bits_per_entry(&self, n: u64) -> f64 {
        CuckooFilter::bits_per_entry(self, n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_filter(stash_capacity: usize, max_kicks: u32) -> CuckooFilter {
        CuckooFilter::with_layout(17, 4, 2, 16, max_kicks, stash_capacity)
    }

    #[test]
    fn test_alt_index_is_an_involution() {
        let filter = CuckooFilter::with_layout(5, 1024, 4, 12, 500, 32);
        for fp in 1..4096u16 {
            for bucket in [0usize, 1, 511, 1023] {
                let other = filter.alt_index(bucket, fp);
                assert!(other < 1024);
                assert_eq!(filter.alt_index(other, fp), bucket);
            }
        }
    }

    #[test]
    fn test_stored_fingerprints_are_nonzero() {
        let mut filter = CuckooFilter::with_layout(5, 64, 4, 4, 500, 8);
        for key in 0..200u64 {
            filter.insert(key);
        }
        let live = filter.table.iter().filter(|&&slot| slot != EMPTY).count();
        assert_eq!(live + filter.stash_len(), filter.len());
        assert!(filter.stash.iter().all(|entry| entry.fingerprint != EMPTY));
    }

    #[test]
    fn test_failed_insert_leaves_table_untouched() {
        // 8 slots, no stash: the ninth key can never fit.
        let mut filter = small_filter(0, 50);
        let mut inserted = Vec::new();
        let mut key = 0u64;
        while inserted.len() < 8 && key < 10_000 {
            if filter.insert(key) {
                inserted.push(key);
            }
            key += 1;
        }
        let table_before = filter.table.clone();

        assert!(!filter.insert(1_000_000));
        assert_eq!(filter.table, table_before);
        assert!(inserted.iter().all(|&k| filter.contains(k)));
        assert!(filter.stats().insert_failures >= 1);
    }

    #[test]
    fn test_stash_absorbs_overflow() {
        let mut filter = small_filter(4, 10);
        let mut inserted = Vec::new();
        for key in 0..64u64 {
            if filter.insert(key) {
                inserted.push(key);
            }
        }
        assert_eq!(inserted.len(), 12);
        assert_eq!(filter.stash_len(), 4);
        assert!(inserted.iter().all(|&k| filter.contains(k)));

        let stats = filter.stats();
        assert_eq!(stats.stash_inserts, 4);
        assert_eq!(stats.inserts, 64);
        assert_eq!(stats.insert_failures, 64 - 12);
        assert_eq!(stats.max_kicks, 10);
    }

    #[test]
    fn test_erase_from_stash() {
        let mut filter = small_filter(4, 10);
        let inserted: Vec<u64> = (0..64u64).filter(|&k| filter.insert(k)).collect();
        let stashed_before = filter.stash_len();
        assert!(stashed_before > 0);

        for &key in &inserted {
            assert!(filter.erase(key));
        }
        assert!(filter.is_empty());
        assert_eq!(filter.stash_len(), 0);
        assert!(filter.table.iter().all(|&slot| slot == EMPTY));
    }
}
