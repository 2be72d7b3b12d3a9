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
use crate::bloom::BlockedBloomFilterBuilder;
use crate::hash::Hasher64;
use crate::hash::splitmix64;

/// Bits per block: one 64-byte cache line.
pub(super) const BLOCK_BITS: u64 = 512;
const WORDS_PER_BLOCK: usize = (BLOCK_BITS / 64) as usize;

/// Operation counters of a [`BlockedBloomFilter`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BloomStats {
    /// Number of `insert` calls.
    pub inserts: u64,
    /// Number of recorded lookups (see [`BlockedBloomFilter::query`]).
    pub lookups: u64,
    /// Number of bits tested or set across all recorded operations.
    pub bit_probes: u64,
}

/// A Bloom filter whose probes for one key all land inside one cache-line block.
///
/// Use [`BlockedBloomFilterBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct BlockedBloomFilter {
    seed: u64,
    /// Selects the block and the first probe.
    block_hasher: Hasher64,
    /// Supplies the step between successive probes.
    step_hasher: Hasher64,
    /// Number of bits set per key (k)
    num_hashes: u32,
    /// Always a power of two
    num_blocks: u64,
    /// `num_blocks * WORDS_PER_BLOCK` words
    bit_array: Vec<u64>,
    stats: BloomStats,
}

/// Where a key's probes land.
#[derive(Debug, Clone, Copy)]
struct ProbeSequence {
    /// First word of the selected block.
    base: usize,
    hash: u64,
    step: u64,
}

impl ProbeSequence {
    /// Bit offset of probe `i` inside the block.
    #[inline]
    fn bit(&self, i: u32) -> u64 {
        splitmix64(self.hash.wrapping_add(u64::from(i).wrapping_mul(self.step))) & (BLOCK_BITS - 1)
    }
}

impl BlockedBloomFilter {
    /// Returns a builder sized for `max_items` keys at the target false positive rate.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::bloom::BlockedBloomFilter;
    ///
    /// let filter = BlockedBloomFilter::builder(10_000, 0.01).build().unwrap();
    /// assert!(filter.num_hashes() >= 1);
    /// ```
    pub fn builder(max_items: u64, target_fpr: f64) -> BlockedBloomFilterBuilder {
        BlockedBloomFilterBuilder::with_accuracy(max_items, target_fpr)
    }

    pub(super) fn with_layout(seed: u64, num_blocks: u64, num_hashes: u32) -> Self {
        debug_assert!(num_blocks.is_power_of_two());
        let num_words = num_blocks as usize * WORDS_PER_BLOCK;
        BlockedBloomFilter {
            seed,
            block_hasher: Hasher64::new(seed),
            step_hasher: Hasher64::derive(seed, crate::hash::BLOOM_STEP_SALT),
            num_hashes,
            num_blocks,
            bit_array: vec![0u64; num_words],
            stats: BloomStats::default(),
        }
    }

    // ========================================================================
    // Update Operations
    // ========================================================================

    /// Inserts a key into the filter.
    ///
    /// After insertion, `contains(key)` will always return `true`.
    ///
    /// # Examples
    ///
    /// ```
    /// # use amqfilter::bloom::BlockedBloomFilterBuilder;
    /// let mut filter = BlockedBloomFilterBuilder::with_accuracy(100, 0.01).build().unwrap();
    /// filter.insert(42);
    /// assert!(filter.contains(42));
    /// ```
    pub fn insert(&mut self, key: u64) {
        let probes = self.probe_sequence(key);
        for i in 0..self.num_hashes {
            let bit = probes.bit(i);
            self.bit_array[probes.base + (bit >> 6) as usize] |= 1u64 << (bit & 63);
        }
        self.stats.inserts += 1;
        self.stats.bit_probes += u64::from(self.num_hashes);
    }

    /// Clears all bits while preserving the configuration.
    pub fn reset(&mut self) {
        self.bit_array.fill(0);
    }

    // ========================================================================
    // Query Operations
    // ========================================================================

    /// Tests whether a key is possibly in the set.
    ///
    /// Returns:
    /// - `true`: the key was **possibly** inserted (or false positive)
    /// - `false`: the key was **definitely not** inserted
    pub fn contains(&self, key: u64) -> bool {
        self.probe(key).0
    }

    /// Same as [`contains`](Self::contains), and records the lookup in [`stats`](Self::stats).
    pub fn query(&mut self, key: u64) -> bool {
        let (found, probed) = self.probe(key);
        self.stats.lookups += 1;
        self.stats.bit_probes += u64::from(probed);
        found
    }

    /// Returns whether every probe bit is set, and how many bits were tested.
    fn probe(&self, key: u64) -> (bool, u32) {
        let probes = self.probe_sequence(key);
        for i in 0..self.num_hashes {
            let bit = probes.bit(i);
            let word = self.bit_array[probes.base + (bit >> 6) as usize];
            if word & (1u64 << (bit & 63)) == 0 {
                return (false, i + 1);
            }
        }
        (true, self.num_hashes)
    }

    fn probe_sequence(&self, key: u64) -> ProbeSequence {
        let hash = self.block_hasher.hash(key);
        let block = (hash >> 32) & (self.num_blocks - 1);
        ProbeSequence {
            base: block as usize * WORDS_PER_BLOCK,
            hash,
            step: self.step_hasher.hash(key),
        }
    }

    // ========================================================================
    // Statistics and Properties
    // ========================================================================

    /// Returns the realized number of bits per key for a filter holding `n` keys.
    pub fn bits_per_entry(&self, n: u64) -> f64 {
        self.capacity_bits() as f64 / n as f64
    }

    /// Returns the total number of bits in the filter.
    pub fn capacity_bits(&self) -> u64 {
        self.bit_array.len() as u64 * 64
    }

    /// Returns the number of 512-bit blocks.
    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    /// Returns the number of bits set per key.
    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// Returns the hash seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Returns the number of bits set to 1.
    pub fn bits_used(&self) -> u64 {
        self.bit_array.iter().map(|w| u64::from(w.count_ones())).sum()
    }

    /// Returns a snapshot of the operation counters.
    pub fn stats(&self) -> BloomStats {
        self.stats
    }

    /// Zeroes the operation counters.
    pub fn reset_stats(&mut self) {
        self.stats = BloomStats::default();
    }
}

impl MembershipFilter for BlockedBloomFilter {
    fn contains(&self, key: u64) -> bool {
        BlockedBloomFilter::contains(self, key)
    }

    fn bits_per_entry(&self, n: u64) -> f64 {
        BlockedBloomFilter::bits_per_entry(self, n)
    }
}
