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

//! The contract shared by every filter in this crate.

/// An approximate membership query over 64-bit keys.
///
/// `contains` may return `true` for a key that was never added (a false positive) but never
/// returns `false` for a live member. The mutable filters expose their own `insert` and
/// `erase`, since whether and how those can fail differs per structure.
///
/// # Examples
///
/// ```
/// use amqfilter::MembershipFilter;
/// use amqfilter::bloom::BlockedBloomFilterBuilder;
/// use amqfilter::xor::XorFilter;
///
/// fn hits(filter: &dyn MembershipFilter, keys: &[u64]) -> usize {
///     keys.iter().filter(|&&k| filter.contains(k)).count()
/// }
///
/// let keys: Vec<u64> = (0..1_000).collect();
/// let mut bloom = BlockedBloomFilterBuilder::with_accuracy(1_000, 0.01).build().unwrap();
/// keys.iter().for_each(|&k| bloom.insert(k));
/// let xor = XorFilter::builder().build(&keys).unwrap();
///
/// assert_eq!(hits(&bloom, &keys), 1_000);
/// assert_eq!(hits(&xor, &keys), 1_000);
/// ```
pub trait MembershipFilter {
    /// Returns `true` if `key` is possibly a member.
    fn contains(&self, key: u64) -> bool;

    /// Returns the realized table size in bits divided by `n`.
    ///
    /// The value depends only on how the filter was sized, not on how full it is.
    fn bits_per_entry(&self, n: u64) -> f64;

    /// Returns the fraction of `negatives` reported as members.
    ///
    /// Meant to be called with keys known to be absent, which makes the result an empirical
    /// false positive rate. Returns 0 for an empty slice.
    fn false_positive_rate(&self, negatives: &[u64]) -> f64 {
        if negatives.is_empty() {
            return 0.0;
        }
        let hits = negatives.iter().filter(|&&key| self.contains(key)).count();
        hits as f64 / negatives.len() as f64
    }
}
