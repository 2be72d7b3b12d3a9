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

use super::QuotientFilter;
use crate::error::Error;
use crate::hash::DEFAULT_SEED;
use crate::hash::next_pow2;

/// Default fraction of slots expected to be occupied at design capacity.
pub const DEFAULT_LOAD_FACTOR: f64 = 0.90;
/// Default remainder width in bits.
pub const DEFAULT_FINGERPRINT_BITS: u32 = 10;

/// Remainders are clamped to this range.
const MIN_REMAINDER_BITS: u32 = 4;
const MAX_REMAINDER_BITS: u32 = 16;
/// Load factors below this are treated as this.
const MIN_EFFECTIVE_LOAD: f64 = 0.1;
const MAX_NUM_SLOTS: u64 = 1u64 << 36;

/// Builder for creating [`QuotientFilter`] instances.
///
/// The table gets the smallest power-of-two number of slots that holds `capacity` keys at the
/// configured load factor.
///
/// # Examples
///
/// ```
/// use amqfilter::quotient::QuotientFilterBuilder;
///
/// let filter = QuotientFilterBuilder::with_capacity(1_000)
///     .load_factor(0.5)
///     .fingerprint_bits(20)
///     .build()
///     .unwrap();
/// assert_eq!(filter.capacity(), 2048);
/// // Remainders are clamped to 16 bits.
/// assert_eq!(filter.remainder_bits(), 16);
/// ```
#[derive(Debug, Clone)]
pub struct QuotientFilterBuilder {
    capacity: u64,
    load_factor: f64,
    fingerprint_bits: u32,
    seed: u64,
}

impl QuotientFilterBuilder {
    /// Creates a builder for a filter expected to hold `capacity` keys.
    pub fn with_capacity(capacity: u64) -> Self {
        QuotientFilterBuilder {
            capacity,
            load_factor: DEFAULT_LOAD_FACTOR,
            fingerprint_bits: DEFAULT_FINGERPRINT_BITS,
            seed: DEFAULT_SEED,
        }
    }

    /// Sets the target occupancy at `capacity` keys (default: 0.90).
    ///
    /// Values below 0.1 size the table as if 0.1 had been given.
    pub fn load_factor(mut self, load_factor: f64) -> Self {
        self.load_factor = load_factor;
        self
    }

    /// Sets the remainder width (default: 10). Values outside `4..=16` are clamped.
    pub fn fingerprint_bits(mut self, bits: u32) -> Self {
        self.fingerprint_bits = bits;
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
    /// capacity is 0, the load factor is not in `(0, 1]`, or the table would be unreasonably
    /// large.
    pub fn build(self) -> Result<QuotientFilter, Error> {
        if self.capacity == 0 {
            return Err(Error::config_invalid("capacity must be greater than 0"));
        }
        if !(self.load_factor > 0.0 && self.load_factor <= 1.0) {
            return Err(Error::config_invalid("load_factor must be in (0.0, 1.0]")
                .with_context("load_factor", self.load_factor));
        }

        let remainder_bits = self
            .fingerprint_bits
            .clamp(MIN_REMAINDER_BITS, MAX_REMAINDER_BITS);
        let load = self.load_factor.max(MIN_EFFECTIVE_LOAD);
        let needed = (self.capacity as f64 / load).ceil() as u64;
        // At least two slots, since one always stays empty.
        let num_slots = next_pow2(needed).max(2);
        if num_slots > MAX_NUM_SLOTS {
            return Err(Error::config_invalid("quotient filter too large")
                .with_context("capacity", self.capacity)
                .with_context("load_factor", self.load_factor));
        }

        tracing::debug!(
            capacity = self.capacity,
            num_slots,
            remainder_bits,
            "built quotient filter"
        );
        Ok(QuotientFilter::with_layout(
            self.seed,
            num_slots as usize,
            remainder_bits,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_rejects_invalid_config() {
        let cases = [
            QuotientFilterBuilder::with_capacity(0),
            QuotientFilterBuilder::with_capacity(10).load_factor(0.0),
            QuotientFilterBuilder::with_capacity(10).load_factor(1.01),
            QuotientFilterBuilder::with_capacity(10).load_factor(f64::NAN),
        ];
        for builder in cases {
            let err = builder.build().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
        }
    }

    #[test]
    fn test_sizing() {
        let filter = QuotientFilterBuilder::with_capacity(1).load_factor(1.0).build().unwrap();
        assert_eq!(filter.capacity(), 2);
        assert_eq!(filter.quotient_bits(), 1);

        let filter = QuotientFilterBuilder::with_capacity(700)
            .load_factor(0.7)
            .build()
            .unwrap();
        assert_eq!(filter.capacity(), 1024);
        assert_eq!(filter.quotient_bits(), 10);

        // Tiny load factors are raised to 0.1.
        let filter = QuotientFilterBuilder::with_capacity(100)
            .load_factor(0.01)
            .build()
            .unwrap();
        assert_eq!(filter.capacity(), 1024);

        let filter = QuotientFilterBuilder::with_capacity(100)
            .fingerprint_bits(1)
            .build()
            .unwrap();
        assert_eq!(filter.remainder_bits(), 4);
    }
}
