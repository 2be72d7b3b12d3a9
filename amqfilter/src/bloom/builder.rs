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

use super::BlockedBloomFilter;
use super::sketch::BLOCK_BITS;
use crate::error::Error;
use crate::hash::DEFAULT_SEED;
use crate::hash::next_pow2;

/// Upper bound on the bit array size (32 GiB).
pub const MAX_NUM_BITS: u64 = 1u64 << 38;

/// Builder for creating [`BlockedBloomFilter`] instances.
///
/// The filter is sized from the expected number of keys and the target false positive rate;
/// the bit count is then rounded up to a power-of-two number of 512-bit blocks.
#[derive(Debug, Clone)]
pub struct BlockedBloomFilterBuilder {
    max_items: u64,
    target_fpr: f64,
    seed: u64,
}

impl BlockedBloomFilterBuilder {
    /// Creates a builder with optimal parameters for a target accuracy.
    ///
    /// # Arguments
    ///
    /// - `max_items`: Maximum expected number of distinct keys
    /// - `target_fpr`: Target false positive rate, strictly between 0 and 1
    ///
    /// # Examples
    ///
    /// ```
    /// # use amqfilter::bloom::BlockedBloomFilterBuilder;
    /// let filter = BlockedBloomFilterBuilder::with_accuracy(10_000, 0.01)
    ///     .seed(42)
    ///     .build()
    ///     .unwrap();
    /// assert_eq!(filter.num_hashes(), 7);
    /// ```
    pub fn with_accuracy(max_items: u64, target_fpr: f64) -> Self {
        BlockedBloomFilterBuilder {
            max_items,
            target_fpr,
            seed: DEFAULT_SEED,
        }
    }

    /// Sets a custom hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if
    /// `max_items` is 0, `target_fpr` is not in `(0, 1)`, or the filter would exceed
    /// [`MAX_NUM_BITS`].
    pub fn build(self) -> Result<BlockedBloomFilter, Error> {
        if self.max_items == 0 {
            return Err(Error::config_invalid("max_items must be greater than 0"));
        }
        if !(self.target_fpr > 0.0 && self.target_fpr < 1.0) {
            return Err(
                Error::config_invalid("target_fpr must be between 0.0 and 1.0 (exclusive)")
                    .with_context("target_fpr", self.target_fpr),
            );
        }

        let num_bits = Self::suggest_num_bits(self.max_items, self.target_fpr);
        let num_hashes = Self::suggest_num_hashes(self.max_items, num_bits);
        let num_blocks = next_pow2(num_bits.div_ceil(BLOCK_BITS));
        if num_blocks.saturating_mul(BLOCK_BITS) > MAX_NUM_BITS {
            return Err(Error::config_invalid("bloom filter too large")
                .with_context("max_items", self.max_items)
                .with_context("target_fpr", self.target_fpr));
        }

        tracing::debug!(
            max_items = self.max_items,
            num_blocks,
            num_hashes,
            "built blocked bloom filter"
        );
        Ok(BlockedBloomFilter::with_layout(
            self.seed, num_blocks, num_hashes,
        ))
    }

    /// Suggests the number of bits for `max_items` keys at false positive rate `fpr`.
    ///
    /// Formula: `m = -n * ln(p) / (ln(2)^2)`
    ///
    /// # Examples
    ///
    /// ```
    /// # use amqfilter::bloom::BlockedBloomFilterBuilder;
    /// let bits = BlockedBloomFilterBuilder::suggest_num_bits(1000, 0.01);
    /// assert!(bits > 9000 && bits < 10000); // ~9586 bits
    /// ```
    pub fn suggest_num_bits(max_items: u64, fpr: f64) -> u64 {
        let ln2_squared = std::f64::consts::LN_2 * std::f64::consts::LN_2;
        (-(max_items as f64) * fpr.ln() / ln2_squared).ceil() as u64
    }

    /// Suggests the number of bits to set per key.
    ///
    /// Formula: `k = round((m/n) * ln(2))`, at least 1.
    ///
    /// # Examples
    ///
    /// ```
    /// # use amqfilter::bloom::BlockedBloomFilterBuilder;
    /// assert_eq!(BlockedBloomFilterBuilder::suggest_num_hashes(1000, 9586), 7);
    /// assert_eq!(BlockedBloomFilterBuilder::suggest_num_hashes(1000, 100), 1);
    /// ```
    pub fn suggest_num_hashes(max_items: u64, num_bits: u64) -> u32 {
        let k = (num_bits as f64 / max_items as f64 * std::f64::consts::LN_2).round();
        k.max(1.0) as u32
    }
}
