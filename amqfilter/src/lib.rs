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

//! Approximate membership query (AMQ) filters over 64-bit keys.
//!
//! Four structures answer "is this key possibly in the set?" with no false negatives and a
//! tunable false positive rate:
//!
//! - [`bloom::BlockedBloomFilter`]: insert-only, every probe for a key inside one cache line.
//! - [`cuckoo::CuckooFilter`]: fingerprints in 4-way buckets with deletion support.
//! - [`quotient::QuotientFilter`]: quotient/remainder split into an open-addressed slot table.
//! - [`xor::XorFilter`]: immutable, built once from a key set.
//!
//! All of them implement [`MembershipFilter`] and are seeded explicitly, so the same seed and
//! inputs always produce the same filter.
//!
//! # Usage
//!
//! ```rust
//! use amqfilter::cuckoo::CuckooFilterBuilder;
//!
//! let mut filter = CuckooFilterBuilder::with_capacity(10_000).build().unwrap();
//! assert!(filter.insert(7));
//! assert!(filter.contains(7));
//! assert!(filter.erase(7));
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(missing_docs)]

pub mod bloom;
mod common;
pub mod cuckoo;
pub mod error;
mod filter;
pub mod hash;
pub mod quotient;
pub mod xor;

pub use self::filter::MembershipFilter;
