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
use crate::hash::Hasher64;
use crate::hash::fingerprint;
use crate::quotient::QuotientFilterBuilder;
use crate::quotient::slots::Slot;
use crate::quotient::slots::SlotTable;

/// Tables up to this many slots are validated exhaustively.
const EXHAUSTIVE_VALIDATION_LIMIT: usize = 4096;
/// Number of slots sampled when validating larger tables.
const VALIDATION_SAMPLES: usize = 2048;
const VALIDATION_SEED: u64 = 0x9e37_79b9_7f4a_7c15;

/// Operation counters of a [`QuotientFilter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct QuotientStats {
    /// Number of `insert` calls.
    pub inserts: u64,
    /// Inserts rejected because the cluster could not grow.
    pub insert_failures: u64,
    /// Number of `erase` calls.
    pub deletes: u64,
    /// Erases that found no matching remainder.
    pub delete_misses: u64,
    /// Number of recorded lookups (see [`QuotientFilter::query`]).
    pub lookups: u64,
    /// Slots visited while locating clusters.
    pub scan_steps: u64,
    /// Most slots visited by a single operation.
    pub max_scan: u64,
}

impl QuotientStats {
    fn record_scan(&mut self, outcome: Outcome) {
        self.scan_steps += outcome.scanned;
        self.max_scan = self.max_scan.max(outcome.scanned);
    }

    fn record_insert(&mut self, outcome: Outcome) {
        self.inserts += 1;
        if !outcome.ok {
            self.insert_failures += 1;
        }
        self.record_scan(outcome);
    }

    fn record_erase(&mut self, outcome: Outcome) {
        self.deletes += 1;
        if !outcome.ok {
            self.delete_misses += 1;
        }
        self.record_scan(outcome);
    }

    fn record_lookup(&mut self, outcome: Outcome) {
        self.lookups += 1;
        self.record_scan(outcome);
    }
}

/// The primary result of an operation and the number of slots it visited.
#[derive(Debug, Clone, Copy)]
struct Outcome {
    ok: bool,
    scanned: u64,
}

impl Outcome {
    fn new(ok: bool, scanned: u64) -> Self {
        Outcome { ok, scanned }
    }
}

/// A maximal stretch of non-empty slots that starts with an unshifted entry.
///
/// Nothing stored before `start` belongs to a quotient inside the cluster, so the cluster can
/// be rewritten in isolation.
#[derive(Debug, Clone, Copy)]
struct Cluster {
    start: usize,
    len: usize,
    scanned: u64,
}

/// All remainders of one quotient, in ascending order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Run {
    /// Distance of the quotient's home slot from the cluster start.
    home: usize,
    remainders: Vec<u16>,
}

/// A quotient filter: an open-addressed table of `(quotient, remainder)` pairs.
///
/// The low bits of a key's hash pick the quotient, its home slot; the next bits are the
/// remainder stored in the table. Remainders sharing a quotient are kept together and sorted
/// as a run, and runs are laid out in quotient order, so a run starts at its home slot or as
/// soon after it as the preceding runs allow.
///
/// Use [`QuotientFilterBuilder`] to construct instances.
///
/// # Examples
///
/// ```
/// use amqfilter::quotient::QuotientFilter;
///
/// let mut filter = QuotientFilter::builder(1_000).fingerprint_bits(16).build().unwrap();
/// assert!(filter.insert(3));
/// assert!(filter.contains(3));
/// assert!(filter.validate());
/// assert!(filter.erase(3));
/// assert!(!filter.contains(3));
/// ```
#[derive(Debug, Clone)]
pub struct QuotientFilter {
    seed: u64,
    hasher: Hasher64,
    quotient_bits: u32,
    remainder_bits: u32,
    slots: SlotTable,
    /// Live remainders, equal to the number of non-empty slots
    len: usize,
    stats: QuotientStats,
}

impl QuotientFilter {
    /// Returns a builder for a filter expected to hold `capacity` keys.
    pub fn builder(capacity: u64) -> QuotientFilterBuilder {
        QuotientFilterBuilder::with_capacity(capacity)
    }

    pub(super) fn with_layout(seed: u64, num_slots: usize, remainder_bits: u32) -> Self {
        debug_assert!(num_slots.is_power_of_two() && num_slots >= 2);
        debug_assert!((1..=16).contains(&remainder_bits));
        QuotientFilter {
            seed,
            hasher: Hasher64::new(seed),
            quotient_bits: num_slots.trailing_zeros(),
            remainder_bits,
            slots: SlotTable::new(num_slots),
            len: 0,
            stats: QuotientStats::default(),
        }
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts a key, returning whether it was stored.
    ///
    /// Fails without changing the filter when the key's cluster cannot grow by one slot. One
    /// slot of the table always stays empty, so a filter of capacity `m` holds at most `m - 1`
    /// remainders.
    pub fn insert(&mut self, key: u64) -> bool {
        let (quotient, remainder) = self.split(key);
        let outcome = self.insert_remainder(quotient, remainder);
        self.stats.record_insert(outcome);
        outcome.ok
    }

    /// Removes one copy of the key's remainder, returning whether anything was removed.
    ///
    /// Two keys that share both quotient and remainder are indistinguishable. Each insert
    /// stores its own copy, but erasing a key that was never inserted can remove the entry of
    /// a colliding member, which is then no longer found.
    pub fn erase(&mut self, key: u64) -> bool {
        let (quotient, remainder) = self.split(key);
        let outcome = self.erase_remainder(quotient, remainder);
        self.stats.record_erase(outcome);
        outcome.ok
    }

    fn insert_remainder(&mut self, quotient: usize, remainder: u16) -> Outcome {
        if self.len + 1 >= self.slots.capacity() {
            tracing::debug!(len = self.len, "quotient insert failed: table full");
            return Outcome::new(false, 0);
        }

        if !self.slots.is_occupied(quotient) && self.slots.get(quotient).is_empty() {
            self.slots.set(
                quotient,
                Slot::RunHead {
                    shifted: false,
                    remainder,
                },
            );
            self.slots.set_occupied(quotient, true);
            self.len += 1;
            return Outcome::new(true, 1);
        }

        let Some(cluster) = self.locate_cluster(quotient) else {
            return Outcome::new(false, self.slots.capacity() as u64);
        };
        let mut runs = self.materialize(&cluster);
        let home = self.slots.distance(cluster.start, quotient);
        match runs.binary_search_by_key(&home, |run| run.home) {
            Ok(i) => {
                let remainders = &mut runs[i].remainders;
                let at = remainders.partition_point(|&r| r <= remainder);
                remainders.insert(at, remainder);
            }
            Err(i) => runs.insert(
                i,
                Run {
                    home,
                    remainders: vec![remainder],
                },
            ),
        }

        let needed = span(&runs);
        let growth = needed.saturating_sub(cluster.len);
        let free = self.free_run(self.slots.offset(cluster.start, cluster.len), growth);
        if needed > cluster.len + free {
            return Outcome::new(false, cluster.scanned);
        }

        self.rewrite(&cluster, &runs);
        self.slots.set_occupied(quotient, true);
        self.len += 1;
        Outcome::new(true, cluster.scanned)
    }

    fn erase_remainder(&mut self, quotient: usize, remainder: u16) -> Outcome {
        if !self.slots.is_occupied(quotient) {
            return Outcome::new(false, 1);
        }
        let Some(cluster) = self.locate_cluster(quotient) else {
            return Outcome::new(false, self.slots.capacity() as u64);
        };

        let mut runs = self.materialize(&cluster);
        let home = self.slots.distance(cluster.start, quotient);
        let Ok(i) = runs.binary_search_by_key(&home, |run| run.home) else {
            return Outcome::new(false, cluster.scanned);
        };
        let Ok(at) = runs[i].remainders.binary_search(&remainder) else {
            return Outcome::new(false, cluster.scanned);
        };
        runs[i].remainders.remove(at);
        let run_vacated = runs[i].remainders.is_empty();
        if run_vacated {
            runs.remove(i);
        }

        self.rewrite(&cluster, &runs);
        if run_vacated {
            self.slots.set_occupied(quotient, false);
        }
        self.len -= 1;
        Outcome::new(true, cluster.scanned)
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether a key is possibly in the set.
    pub fn contains(&self, key: u64) -> bool {
        let (quotient, remainder) = self.split(key);
        self.lookup(quotient, remainder).ok
    }

    /// Same as [`contains`](Self::contains), and records the lookup in [`stats`](Self::stats).
    pub fn query(&mut self, key: u64) -> bool {
        let (quotient, remainder) = self.split(key);
        let outcome = self.lookup(quotient, remainder);
        self.stats.record_lookup(outcome);
        outcome.ok
    }

    fn lookup(&self, quotient: usize, remainder: u16) -> Outcome {
        if !self.slots.is_occupied(quotient) {
            return Outcome::new(false, 1);
        }
        let Some(cluster) = self.locate_cluster(quotient) else {
            return Outcome::new(false, self.slots.capacity() as u64);
        };
        let home = self.slots.distance(cluster.start, quotient);
        let Some((mut lo, mut hi)) = self.run_bounds(&cluster, home) else {
            return Outcome::new(false, cluster.scanned);
        };

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let stored = self
                .slots
                .get(self.slots.offset(cluster.start, mid))
                .remainder();
            match stored.cmp(&remainder) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Outcome::new(true, cluster.scanned),
            }
        }
        Outcome::new(false, cluster.scanned)
    }

    // ========================================================================
    // Cluster Helpers
    // ========================================================================

    /// Splits a key's hash into its quotient (home slot) and nonzero remainder.
    fn split(&self, key: u64) -> (usize, u16) {
        let hash = self.hasher.hash(key);
        let quotient = (hash & self.slots.mask() as u64) as usize;
        let remainder = fingerprint(hash >> self.quotient_bits, self.remainder_bits) as u16;
        (quotient, remainder)
    }

    /// Finds the cluster holding the non-empty slot `quotient`.
    ///
    /// Returns `None` only for a table without empty slots, which inserts never produce.
    fn locate_cluster(&self, quotient: usize) -> Option<Cluster> {
        let capacity = self.slots.capacity();

        let mut start = quotient;
        let mut back = 0;
        while self.slots.get(start).is_shifted() {
            back += 1;
            if back >= capacity {
                return None;
            }
            start = self.slots.prev(start);
        }

        let mut len = 0;
        while !self.slots.get(self.slots.offset(start, len)).is_empty() {
            len += 1;
            if len >= capacity {
                return None;
            }
        }

        Some(Cluster {
            start,
            len,
            scanned: (back + len + 1) as u64,
        })
    }

    /// Offsets `[begin, end)` of the run whose home is `home` slots into the cluster.
    fn run_bounds(&self, cluster: &Cluster, home: usize) -> Option<(usize, usize)> {
        let mut pos = 0;
        for distance in 0..cluster.len {
            if !self
                .slots
                .is_occupied(self.slots.offset(cluster.start, distance))
            {
                continue;
            }
            let begin = pos;
            pos = self.run_end(cluster, pos);
            if distance == home {
                return Some((begin, pos));
            }
            if distance > home {
                break;
            }
        }
        None
    }

    /// Offset just past the run that starts at offset `begin`.
    fn run_end(&self, cluster: &Cluster, begin: usize) -> usize {
        let mut pos = begin + 1;
        while pos < cluster.len
            && self
                .slots
                .get(self.slots.offset(cluster.start, pos))
                .is_continuation()
        {
            pos += 1;
        }
        pos
    }

    /// Reads a cluster into its runs, ordered by home.
    fn materialize(&self, cluster: &Cluster) -> Vec<Run> {
        let mut runs = Vec::new();
        let mut pos = 0;
        for distance in 0..cluster.len {
            if pos >= cluster.len {
                break;
            }
            if !self
                .slots
                .is_occupied(self.slots.offset(cluster.start, distance))
            {
                continue;
            }
            let end = self.run_end(cluster, pos);
            let remainders: Vec<u16> = (pos..end)
                .map(|p| self.slots.get(self.slots.offset(cluster.start, p)).remainder())
                .collect();
            debug_assert!(remainders.is_sorted());
            runs.push(Run {
                home: distance,
                remainders,
            });
            pos = end;
        }
        runs
    }

    /// Number of empty slots starting at `index`, counting at most `limit`.
    fn free_run(&self, index: usize, limit: usize) -> usize {
        (0..limit)
            .take_while(|&d| self.slots.get(self.slots.offset(index, d)).is_empty())
            .count()
    }

    /// Clears the old cluster and lays `runs` out again from its start.
    ///
    /// Each run begins at its home or right after the previous run, whichever is later, which
    /// restores the canonical continuation and shifted bits for every written slot.
    fn rewrite(&mut self, cluster: &Cluster, runs: &[Run]) {
        for distance in 0..cluster.len {
            let index = self.slots.offset(cluster.start, distance);
            self.slots.set(index, Slot::Empty);
        }

        let mut pos = 0;
        for run in runs {
            pos = pos.max(run.home);
            for (j, &remainder) in run.remainders.iter().enumerate() {
                let shifted = pos != run.home;
                let slot = if j == 0 {
                    Slot::RunHead { shifted, remainder }
                } else {
                    Slot::RunContinuation { shifted, remainder }
                };
                let index = self.slots.offset(cluster.start, pos);
                self.slots.set(index, slot);
                pos += 1;
            }
        }
    }

    // ========================================================================
    // Validation
    // ========================================================================

    /// Checks the slot invariants, returning `false` on the first violation.
    ///
    /// Tables of up to 4096 slots are checked exhaustively, including that the number of
    /// stored entries matches [`len`](Self::len). Larger tables are checked on a fixed sample
    /// of 2048 pseudo-random slots. This is a self-check of the table layout; it says nothing
    /// about whether any particular key is present.
    pub fn validate(&self) -> bool {
        let capacity = self.slots.capacity();
        if capacity <= EXHAUSTIVE_VALIDATION_LIMIT {
            return (0..capacity).all(|i| self.slots.is_well_formed(i))
                && self.slots.count_entries() == self.len;
        }

        let mut rng = XorShift64::seeded(VALIDATION_SEED);
        (0..VALIDATION_SAMPLES).all(|_| {
            let index = (rng.next_u64() as usize) & self.slots.mask();
            self.slots.is_well_formed(index)
        })
    }

    /// Returns the length of the cluster starting at slot `index`.
    ///
    /// Returns 0 if `index` is empty or its left neighbour is not, i.e. if no cluster starts
    /// there.
    pub fn cluster_len_at(&self, index: usize) -> usize {
        let index = index & self.slots.mask();
        if self.slots.get(index).is_empty() || !self.slots.get(self.slots.prev(index)).is_empty()
        {
            return 0;
        }
        let capacity = self.slots.capacity();
        (0..capacity)
            .take_while(|&d| !self.slots.get(self.slots.offset(index, d)).is_empty())
            .count()
    }

    // ========================================================================
    // Statistics and Properties
    // ========================================================================

    /// Returns the number of stored remainders.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether the filter holds no remainders.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of slots.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Returns the number of quotient bits, `log2(capacity)`.
    pub fn quotient_bits(&self) -> u32 {
        self.quotient_bits
    }

    /// Returns the number of remainder bits stored per slot.
    pub fn remainder_bits(&self) -> u32 {
        self.remainder_bits
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the fraction of slots holding a remainder.
    pub fn load_factor(&self) -> f64 {
        self.len as f64 / self.capacity() as f64
    }

    /// Returns the realized number of bits per key for a filter holding `n` keys.
    ///
    /// Every slot costs its remainder plus three metadata bits.
    pub fn bits_per_entry(&self, n: u64) -> f64 {
        let slot_bits = f64::from(self.remainder_bits) + 3.0;
        self.capacity() as f64 * slot_bits / n as f64
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> QuotientStats {
        self.stats
    }

    /// Zeroes the operation counters.
    pub fn reset_stats(&mut self) {
        self.stats = QuotientStats::default();
    }
}

impl MembershipFilter for QuotientFilter {
    fn contains(&self, key: u64) -> bool {
        QuotientFilter::contains(self, key)
    }

    fn bits_per_entry(&self, n: u64) -> f64 {
        QuotientFilter::bits_per_entry(self, n)
    }
}

/// Slots needed to lay out `runs` from a cluster start.
fn span(runs: &[Run]) -> usize {
    runs.iter().fold(0, |pos, run| {
        pos.max(run.home) + run.remainders.len()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(num_slots: usize) -> QuotientFilter {
        QuotientFilter::with_layout(11, num_slots, 8)
    }

    fn snapshot(f: &QuotientFilter) -> Vec<(Slot, bool)> {
        (0..f.capacity())
            .map(|i| (f.slots.get(i), f.slots.is_occupied(i)))
            .collect()
    }

    #[test]
    fn test_span() {
        let runs = vec![
            Run {
                home: 0,
                remainders: vec![1, 2],
            },
            Run {
                home: 1,
                remainders: vec![3],
            },
            Run {
                home: 5,
                remainders: vec![4, 5],
            },
        ];
        assert_eq!(span(&runs), 7);
        assert_eq!(span(&[]), 0);
    }

    #[test]
    fn test_shared_quotient_builds_run() {
        let mut f = filter(16);
        for r in [9u16, 3, 6] {
            assert!(f.insert_remainder(4, r).ok);
        }
        assert!(f.validate());

        assert_eq!(
            f.slots.get(4),
            Slot::RunHead {
                shifted: false,
                remainder: 3
            }
        );
        assert_eq!(
            f.slots.get(5),
            Slot::RunContinuation {
                shifted: true,
                remainder: 6
            }
        );
        assert_eq!(
            f.slots.get(6),
            Slot::RunContinuation {
                shifted: true,
                remainder: 9
            }
        );
        assert!(f.slots.is_occupied(4));
        assert!(!f.slots.is_occupied(5));
        for r in [3u16, 6, 9] {
            assert!(f.lookup(4, r).ok);
        }
        assert!(!f.lookup(4, 7).ok);
        assert!(!f.lookup(5, 6).ok);
        assert_eq!(f.cluster_len_at(4), 3);
        assert_eq!(f.cluster_len_at(5), 0);
    }

    #[test]
    fn test_neighbouring_run_is_shifted() {
        let mut f = filter(16);
        assert!(f.insert_remainder(4, 1).ok);
        assert!(f.insert_remainder(5, 2).ok);
        assert!(f.insert_remainder(4, 7).ok);
        assert!(f.validate());

        // Run for quotient 5 moved right by the growing run of quotient 4.
        assert_eq!(
            f.slots.get(6),
            Slot::RunHead {
                shifted: true,
                remainder: 2
            }
        );
        assert!(f.lookup(5, 2).ok);

        // Removing from quotient 4 lets quotient 5 return home.
        assert!(f.erase_remainder(4, 7).ok);
        assert!(f.validate());
        assert_eq!(
            f.slots.get(5),
            Slot::RunHead {
                shifted: false,
                remainder: 2
            }
        );
        assert!(f.slots.get(6).is_empty());
    }

    #[test]
    fn test_erase_leaves_gap_before_later_home() {
        let mut f = filter(16);
        assert!(f.insert_remainder(2, 1).ok);
        assert!(f.insert_remainder(2, 2).ok);
        assert!(f.insert_remainder(2, 3).ok);
        assert!(f.insert_remainder(4, 9).ok);
        assert!(f.validate());
        assert!(f.slots.get(5).is_shifted());

        assert!(f.erase_remainder(2, 1).ok);
        assert!(f.erase_remainder(2, 2).ok);
        assert!(f.validate());
        // Quotient 4's run must not move before its home.
        assert!(f.slots.get(3).is_empty());
        assert_eq!(
            f.slots.get(4),
            Slot::RunHead {
                shifted: false,
                remainder: 9
            }
        );
        assert!(f.lookup(2, 3).ok);
        assert!(f.lookup(4, 9).ok);
    }

    #[test]
    fn test_cluster_wraps_around_table_end() {
        let mut f = filter(8);
        assert!(f.insert_remainder(7, 1).ok);
        assert!(f.insert_remainder(7, 2).ok);
        assert!(f.insert_remainder(0, 3).ok);
        assert!(f.validate());
        assert_eq!(
            f.slots.get(0),
            Slot::RunContinuation {
                shifted: true,
                remainder: 2
            }
        );
        assert!(f.slots.get(1).is_shifted());
        assert!(f.lookup(7, 1).ok);
        assert!(f.lookup(7, 2).ok);
        assert!(f.lookup(0, 3).ok);

        assert!(f.erase_remainder(7, 1).ok);
        assert!(f.validate());
        assert!(f.lookup(0, 3).ok);
        assert!(!f.lookup(7, 1).ok);
    }

    #[test]
    fn test_full_table_rejects_insert_without_mutation() {
        let mut f = filter(8);
        for r in 1..=7u16 {
            assert!(f.insert_remainder(3, r).ok);
        }
        assert_eq!(f.len(), 7);
        let before = snapshot(&f);
        assert!(!f.insert_remainder(5, 100).ok);
        assert_eq!(snapshot(&f), before);
        assert!(f.validate());
    }

    #[test]
    fn test_duplicate_remainders_are_kept() {
        let mut f = filter(16);
        assert!(f.insert_remainder(1, 5).ok);
        assert!(f.insert_remainder(1, 5).ok);
        assert_eq!(f.len(), 2);
        assert!(f.erase_remainder(1, 5).ok);
        assert!(f.lookup(1, 5).ok);
        assert!(f.erase_remainder(1, 5).ok);
        assert!(!f.lookup(1, 5).ok);
        assert!(!f.erase_remainder(1, 5).ok);
        assert!(f.is_empty());
        assert!(f.validate());
    }
}
