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

use crate::error::Error;
use crate::hash::DEFAULT_SEED;
use crate::xor::sketch::XorFilter;

const DEFAULT_MAX_ATTEMPTS: u32 = 20;
const DEFAULT_FINGERPRINT_BITS: u32 = 12;
const MAX_FINGERPRINT_BITS: u32 = 16;

/// Builder for creating Xor filters.
///
/// Xor filters are immutable after construction.
///
/// # Examples
///
/// ```
/// use amqfilter::xor::XorFilter;
///
/// let keys: Vec<u64> = (0..10_000).collect();
/// let filter = XorFilter::builder()
///     .fingerprint_bits(16)
///     .seed(42)
///     .max_attempts(25)
///     .build(&keys)
///     .unwrap();
///
/// assert!(filter.contains(9999));
/// ```
#[derive(Debug, Clone)]
pub struct XorFilterBuilder {
    seed: u64,
    fingerprint_bits: u32,
    max_attempts: u32,
}

impl Default for XorFilterBuilder {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            fingerprint_bits: DEFAULT_FINGERPRINT_BITS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl XorFilterBuilder {
    /// Sets the hash seed used for the first construction attempt.
    ///
    /// Later attempts derive fresh seeds from it, so the same keys and seed always produce
    /// the same filter.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::xor::XorFilter;
    ///
    /// let keys: Vec<u64> = (0..100).collect();
    /// let filter = XorFilter::builder().seed(123).build(&keys).unwrap();
    /// assert!(filter.contains(10));
    /// ```
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the fingerprint width, 1 to 16 bits (default: 12).
    ///
    /// The false positive rate is about `2^-bits`.
    pub fn fingerprint_bits(mut self, bits: u32) -> Self {
        self.fingerprint_bits = bits;
        self
    }

    /// Sets the maximum number of construction attempts (default: 20).
    ///
    /// # Panics
    ///
    /// Panics if `max_attempts` is 0.
    ///
    /// # Examples
    ///
    /// ```
    /// use amqfilter::xor::XorFilter;
    ///
    /// let keys: Vec<u64> = (0..100).collect();
    /// let filter = XorFilter::builder().max_attempts(10).build(&keys).unwrap();
    /// assert!(filter.contains(10));
    /// ```
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        assert!(max_attempts > 0, "max_attempts must be at least 1");
        self.max_attempts = max_attempts;
        self
    }

    /// Builds a filter from the provided keys.
    ///
    /// Running out of attempts is not an error: the returned filter then reports
    /// [`BuildStatus::Failed`](crate::xor::BuildStatus::Failed) and contains nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid) if the
    /// fingerprint width is not in `1..=16` or the key set is too large.
    pub fn build(self, keys: &[u64]) -> Result<XorFilter, Error> {
        if !(1..=MAX_FINGERPRINT_BITS).contains(&self.fingerprint_bits) {
            return Err(
                Error::config_invalid("fingerprint_bits must be between 1 and 16")
                    .with_context("fingerprint_bits", self.fingerprint_bits),
            );
        }
        XorFilter::build_from_keys(keys, self.fingerprint_bits, self.seed, self.max_attempts)
    }
}
