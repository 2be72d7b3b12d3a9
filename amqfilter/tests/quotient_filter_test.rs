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
use amqfilter::error::ErrorKind;
use amqfilter::quotient::QuotientFilterBuilder;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::lt;
use rand::RngCore;
use rand::SeedableRng;
use rand::rngs::StdRng;

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

/// Inserts every key and then erases the first half, validating after each change.
fn insert_then_erase_half(capacity: u64, n: usize, seed: u64) {
    let (keys, _) = key_sets(seed, n);
    let mut filter = QuotientFilterBuilder::with_capacity(capacity)
        .load_factor(0.9)
        .fingerprint_bits(16)
        .build()
        .unwrap();

    for &key in &keys {
        assert!(filter.insert(key), "insert failed for {key}");
        assert!(filter.validate(), "invalid after inserting {key}");
    }
    assert_eq!(filter.len(), n);
    for &key in &keys {
        assert!(filter.contains(key), "missing key {key}");
    }

    let (gone, kept) = keys.split_at(n / 2);
    for &key in gone {
        assert!(filter.erase(key), "erase failed for {key}");
        assert!(filter.validate(), "invalid after erasing {key}");
    }
    assert_eq!(filter.len(), n - n / 2);
    for &key in kept {
        assert!(filter.contains(key), "lost key {key}");
    }
}

#[test]
fn test_insert_erase_sampled_validation() {
    // 32768 slots, checked on a sample
    insert_then_erase_half(20_000, 20_000, 6);
}

#[test]
fn test_insert_erase_exhaustive_validation() {
    // 4096 slots, checked slot by slot
    insert_then_erase_half(3_000, 3_000, 7);
}

#[test]
fn test_false_positive_rate() {
    let (keys, negatives) = key_sets(8, 50_000);
    let mut filter = QuotientFilterBuilder::with_capacity(50_000)
        .fingerprint_bits(10)
        .build()
        .unwrap();
    for &key in &keys {
        assert!(filter.insert(key));
    }
    // about load / 2^remainder_bits
    assert_that!(filter.false_positive_rate(&negatives), lt(2.0 / 1024.0));
}

#[test]
fn test_full_table_rejects_inserts() {
    let mut filter = QuotientFilterBuilder::with_capacity(7)
        .load_factor(1.0)
        .build()
        .unwrap();
    assert_eq!(filter.capacity(), 8);

    let stored = (0..20u64).filter(|&key| filter.insert(key)).count();
    assert_eq!(stored, 7);
    assert_eq!(filter.len(), 7);
    assert!(filter.validate());
    assert_that!(filter.stats().insert_failures, eq(13));
    for key in 0..7u64 {
        assert!(filter.contains(key));
    }
}

#[test]
fn test_clusters_cover_every_entry() {
    let (keys, _) = key_sets(9, 3_000);
    let mut filter = QuotientFilterBuilder::with_capacity(3_000).build().unwrap();
    for &key in &keys {
        filter.insert(key);
    }
    let covered: usize = (0..filter.capacity())
        .map(|i| filter.cluster_len_at(i))
        .sum();
    assert_eq!(covered, filter.len());
}

#[test]
fn test_bits_per_entry_ignores_occupancy() {
    let mut filter = QuotientFilterBuilder::with_capacity(1_000)
        .fingerprint_bits(10)
        .build()
        .unwrap();
    assert_eq!(filter.remainder_bits(), 10);
    let expected = filter.capacity() as f64 * 13.0 / 1_000.0;
    assert_eq!(filter.bits_per_entry(1_000), expected);
    for key in 0..1_000 {
        filter.insert(key);
    }
    assert_eq!(filter.bits_per_entry(1_000), expected);
}

#[test]
fn test_stats() {
    let mut filter = QuotientFilterBuilder::with_capacity(100).build().unwrap();
    assert!(!filter.erase(5));
    assert!(filter.insert(5));
    assert!(filter.query(5));
    assert!(filter.erase(5));

    let stats = filter.stats();
    assert_eq!(stats.inserts, 1);
    assert_eq!(stats.deletes, 2);
    assert_eq!(stats.delete_misses, 1);
    assert_eq!(stats.lookups, 1);

    let before = filter.stats();
    assert!(!filter.contains(5));
    assert_eq!(filter.stats(), before);
    filter.reset_stats();
    assert_eq!(filter.stats().inserts, 0);
}

#[test]
fn test_invalid_config() {
    let cases = [
        QuotientFilterBuilder::with_capacity(0),
        QuotientFilterBuilder::with_capacity(10).load_factor(0.0),
        QuotientFilterBuilder::with_capacity(10).load_factor(1.01),
    ];
    for builder in cases {
        assert_eq!(builder.build().unwrap_err().kind(), ErrorKind::ConfigInvalid);
    }
}
