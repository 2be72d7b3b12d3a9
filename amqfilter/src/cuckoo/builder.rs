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

use super::CuckooFilter;
use crate::error::Error;
use crate::hash::DEFAULT_SEED;
use crate::hash::next_pow2;

/// Default fraction of slots expected to be occupied at design capacity.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.90;
/// Default fingerprint width in bits.
pub const DEFAULT_FINGERPRINT_BITS: u32 = 12;
/// Default number of slots per bucket.
pub const DEFAULT_BUCKET_SIZE: usize = 4;
/// Default eviction budget of one insert.
pub const DEFAULT_MAX_KICKS: u32 = 500;
/// Default number of stash entries.
pub const DEFAULT_STASH_CAPACITY: usize = 32;

const MAX_FINGERPRINT_BITS: u32 = 16;
const MAX_NUM_SLOTS: u64 = 1u64 << 36;

/// Builder for creating [`CuckooFilter`] instances.
///
/// # Examples
///
/// ```
/// use amqfilter::cuckoo::CuckooFilterBuilder;
///
/// let filter = CuckooFilterBuilder::with_capacity(1_000)
///     .load_factor(0.5)
///     .bucket_size(4)
///     .build()
///     .unwrap();
/// // 1000 / (0.5 * 4) = 500 buckets, rounded up to a power of two.
/// assert_eq!(filter.num_buckets(), 512);
/// ```
#[derive(Debug, Clone)]
pub struct CuckooFilterBuilder {
    capacity: u64,
    load_factor: f64,
    fingerprint_bits: u32,
    bucket_size: usize,
    max_kicks: u32,
    stash_capacity: usize,
    seed: u64,
}

impl CuckooFilterBuilder {
    /// Creates a builder for a filter expected to hold `capacity` keys.
    pub fn with_capacity(capacity: u64) -> Self {
        CuckooFilterBuilder {
            capacity,
            load_factor: DEFAULT_LOAD_FACTOR,
            fingerprint_bits: DEFAULT_FINGERPRINT_BITS,
            bucket_size: DEFAULT_BUCKET_SIZE,
            max_kicks: DEFAULT_MAX_KICKS,
            stash_capacity: DEFAULT_STASH_CAPACITY,
            seed: DEFAULT_SEED,
        }
    }

    /// Sets the target occupancy at `capacity` keys (default: 0.90).
    ///
    /// Lower values make inserts more likely to succeed at the cost of space.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Sets the fingerprint width, 1 to 16 bits (default: 12).
    pub fn fingerprint_bits(mut self, bits: u32) -> Self {
        self.fingerprint_bits = bits;
        self
    }

    /// Sets the number of slots per bucket (default: 4).
    pub fn bucket_size(mut self, bucket_size: usize) -> Self {
        self.bucket_size = bucket_size;
        self
    }

    /// Sets the maximum number of evictions one insert may perform (default: 500).
    pub fn max_kicks(mut self, max_kicks: u32) -> Self {
        self.max_kicks = max_kicks;
        self
    }

    /// Sets the number of stash entries (default: 32).
    pub fn stash_capacity(mut self, stash_capacity: usize) -> Self {
        self.stash_capacity = stash_capacity;
        self
    }

    /// Sets the hash seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the filter.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if the
    /// capacity or bucket size is 0, the load factor is not in `(0, 1]`, the fingerprint width
    /// is not in `1..=16`, or the table would be unreasonably large.
    pub fn build(self) -> Result<CuckooFilter, Error> {
        if self.capacity == 0 {
            return Err(Error::config_invalid("capacity must be greater than 0"));
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::config_invalid("load_factor must be in (0.0, 1.0]")
                .with_context("load_factor", self.load_factor));
        }
        if !(1..=MAX_FINGERPRINT_BITS).contains(&self.fingerprint_bits) {
            return Err(
                Error::config_invalid("fingerprint_bits must be between 1 and 16")
                    .with_context("fingerprint_bits", self.fingerprint_bits),
            );
        }
        if self.bucket_size == 0 {
            return Err(Error::config_invalid("bucket_size must be greater than 0"));
        }

        let buckets = (self.capacity as f64 / (self.load_factor * self.bucket_size as f64)).ceil();
        let num_buckets = next_pow2(buckets as u64);
        if num_buckets.saturating_mul(self.bucket_size as u64) > MAX_NUM_SLOTS {
            return Err(Error::config_invalid("cuckoo filter too large")
                .with_context("capacity", self.capacity)
                .with_context("load_factor", self.load_factor));
        }

        tracing::debug!(
            capacity = self.capacity,
            num_buckets,
            bucket_size = self.bucket_size,
            fingerprint_bits = self.fingerprint_bits,
            "built cuckoo filter"
        );
        Ok(CuckooFilter::with_layout(
            self.seed,
            num_buckets,
            self.bucket_size,
            self.fingerprint_bits,
            self.max_kicks,
            self.stash_capacity,
        ))
    }
}
