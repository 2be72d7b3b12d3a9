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
use amqfilter::xor::BuildStatus;
use amqfilter::xor::XorFilter;
use googletest::assert_that;
use googletest::prelude::eq;
use googletest::prelude::lt;
use googletest::prelude::near;
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
fn test_no_false_negatives() {
    let (keys, negatives) = key_sets(10, N);
    let mut filter = XorFilter::builder()
        .fingerprint_bits(12)
        .build(&keys)
        .unwrap();
    assert!(filter.is_built());
    assert_eq!(filter.len(), N as u64);
    // 1.23 * 200_000 = 246_000 -> 2^18
    assert_eq!(filter.array_size(), 1 << 18);

    for &key in &keys {
        assert!(filter.contains(key), "missing key {key}");
    }
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..N {
        let key = keys[rng.gen_range(0..keys.len())];
        assert!(filter.query(key));
    }
    assert_that!(filter.stats().positives, eq(N as u64));

    // about 2^-12
    assert_that!(filter.false_positive_rate(&negatives), lt(2.0 / 4096.0));
}

#[test]
fn test_bits_per_entry() {
    let (keys, _) = key_sets(12, 10_000);
    let filter = XorFilter::builder()
        .fingerprint_bits(8)
        .build(&keys)
        .unwrap();
    // 12_300 -> 16_384 slots of 8 bits
    assert_that!(
        filter.bits_per_entry(10_000),
        near(16_384.0 * 8.0 / 10_000.0, 1e-9)
    );
}

#[test]
fn test_empty_key_set() {
    let filter = XorFilter::builder().build(&[]).unwrap();
    assert!(filter.is_empty());
    assert_eq!(filter.len(), 0);
    assert_eq!(filter.status(), BuildStatus::Built { attempts: 0 });
    assert!(!filter.contains(123));
}

#[test]
fn test_single_key() {
    let filter = XorFilter::builder().build(&[77]).unwrap();
    assert!(filter.is_built());
    assert!(filter.contains(77));
}

#[test]
fn test_duplicate_keys_are_ignored() {
    let keys = vec![1_u64, 2, 1, 3, 2];
    let filter = XorFilter::builder().build(&keys).unwrap();
    assert_eq!(filter.len(), 3);
    for key in keys {
        assert!(filter.contains(key));
    }
}

#[test]
fn test_same_seed_same_filter() {
    let (keys, negatives) = key_sets(13, 1_000);
    let a = XorFilter::builder().seed(123).build(&keys).unwrap();
    let b = XorFilter::builder().seed(123).build(&keys).unwrap();
    assert_eq!(a.seed(), b.seed());
    assert_eq!(a.status(), b.status());
    for &key in &negatives {
        assert_eq!(a.contains(key), b.contains(key));
    }
}

#[test]
fn test_invalid_fingerprint_bits() {
    for bits in [0, 17] {
        let err = XorFilter::builder()
            .fingerprint_bits(bits)
            .build(&[1, 2, 3])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }
}

#[test]
#[should_panic(expected = "max_attempts must be at least 1")]
fn test_zero_max_attempts_panics() {
    let _ = XorFilter::builder().max_attempts(0);
}
