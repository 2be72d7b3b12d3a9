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

use std::collections::HashSet;

use amqfilter::MembershipFilter;
use amqfilter::bloom::BlockedBloomFilterBuilder;
use amqfilter::error::ErrorKind;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::lt;
use rand::Rng;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

const N: usize = 200_000;

/// Returns `n` members and `n` disjoint non-members.
fn key_sets(seed: u64, n: usize) -> (Vec<u64>, Vec<u64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen = HashSet::with_capacity(2 * n);
    let mut keys = Vec::with_capacity(2 * n);
    while keys.len() < 2 * n {
        let key = rng.next_u64();
        if seen.insert(key) {
            keys.push(key);
        }
    }
    let negatives = keys.split_off(n);
    (keys, negatives)
}

#[test]
fn test_no_false_negatives_and_bounded_fpr() {
    let (keys, negatives) = key_sets(1, N);
    let mut filter = BlockedBloomFilterBuilder::with_accuracy(N as u64, 0.01)
        .build()
        .unwrap();
    for &key in &keys {
        filter.insert(key);
    }

    for &key in &keys {
        assert!(filter.contains(key), "missing key {key}");
    }
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..N {
        let key = keys[rng.gen_range(0..keys.len())];
        assert!(filter.contains(key));
    }

    let fpr = filter.false_positive_rate(&negatives);
    assert_that!(fpr, lt(0.03));
}

#[test]
fn test_bits_per_entry_ignores_occupancy() {
    let mut filter = BlockedBloomFilterBuilder::with_accuracy(10_000, 0.01)
        .build()
        .unwrap();
    let before = filter.bits_per_entry(10_000);
    for key in 0..10_000 {
        filter.insert(key);
    }
    assert_eq!(filter.bits_per_entry(10_000), before);
    assert_eq!(before, filter.capacity_bits() as f64 / 10_000.0);
    assert_eq!(filter.capacity_bits(), filter.num_blocks() * 512);
}

#[test]
fn test_contains_is_idempotent_and_unrecorded() {
    let mut filter = BlockedBloomFilterBuilder::with_accuracy(1_000, 0.01)
        .build()
        .unwrap();
    for key in 0..500 {
        filter.insert(key);
    }
    let stats = filter.stats();
    for key in 0..2_000 {
        assert_eq!(filter.contains(key), filter.contains(key));
    }
    assert_eq!(filter.stats(), stats);

    assert!(filter.query(7));
    assert_that!(filter.stats().lookups, eq(1));
    assert_that!(filter.stats().inserts, eq(500));
    filter.reset_stats();
    assert_eq!(filter.stats().lookups, 0);
}

#[test]
fn test_same_seed_same_filter() {
    let build = |seed| {
        let mut filter = BlockedBloomFilterBuilder::with_accuracy(1_000, 0.05)
            .seed(seed)
            .build()
            .unwrap();
        for key in 0..1_000 {
            filter.insert(key);
        }
        filter
    };
    let (a, b) = (build(9), build(9));
    for key in 1_000..20_000 {
        assert_eq!(a.contains(key), b.contains(key));
    }
    assert_eq!(a.bits_used(), b.bits_used());
}

#[test]
fn test_reset_forgets_keys() {
    let mut filter = BlockedBloomFilterBuilder::with_accuracy(100, 0.01)
        .build()
        .unwrap();
    filter.insert(42);
    filter.reset();
    assert!(!filter.contains(42));
    assert_eq!(filter.bits_used(), 0);
}

#[test]
fn test_invalid_config() {
    for (items, fpr) in [(0, 0.01), (10, 0.0), (10, 1.0), (10, f64::NAN)] {
        let err = BlockedBloomFilterBuilder::with_accuracy(items, fpr)
            .build()
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}
