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

//! Blocked Bloom filter for probabilistic set membership testing.
//!
//! A blocked Bloom filter splits its bit array into 512-bit blocks, one cache line each. Every
//! key selects a single block and sets or tests all of its `k` bits inside that block, so an
//! operation touches one cache line no matter how large `k` is. The price is a slightly higher
//! false positive rate than a classic Bloom filter of the same size.
//!
//! # Properties
//!
//! - **No false negatives**: if a key was inserted, `contains()` always returns `true`
//! - **Possible false positives**: near the configured rate once the filter holds its design
//!   capacity
//! - **Fixed size**: the block count is a power of two chosen at construction time
//! - **No deletion**: bits are only ever set
//!
//! # Usage
//!
//! ```rust
//! use amqfilter::bloom::BlockedBloomFilterBuilder;
//!
//! let mut filter = BlockedBloomFilterBuilder::with_accuracy(1_000, 0.01)
//!     .seed(42)
//!     .build()
//!     .unwrap();
//!
//! filter.insert(7);
//! filter.insert(11);
//!
//! assert!(filter.contains(7));
//! assert!(filter.contains(11));
//! println!("bits per entry: {:.2}", filter.bits_per_entry(1_000));
//! ```

mod builder;
mod sketch;

pub use self::builder::BlockedBloomFilterBuilder;
pub use self::sketch::BlockedBloomFilter;
pub use self::sketch::BloomStats;
