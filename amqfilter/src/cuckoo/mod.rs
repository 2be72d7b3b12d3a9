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

//! Cuckoo filter for probabilistic set membership testing with deletion.
//!
//! A cuckoo filter stores small fingerprints in a table of buckets. Each key has two candidate
//! buckets, and either one can be computed from the other and the fingerprint alone, which is
//! what lets a full bucket push an existing fingerprint over to its other home. These
//! relocations ("kicks") form a bounded random walk; a walk that runs out of budget spills its
//! last displaced fingerprint into a small stash.
//!
//! # Usage
//!
//! ```rust
//! use amqfilter::cuckoo::CuckooFilterBuilder;
//!
//! let mut filter = CuckooFilterBuilder::with_capacity(10_000)
//!     .load_factor(0.9)
//!     .fingerprint_bits(12)
//!     .build()
//!     .unwrap();
//!
//! assert!(filter.insert(7));
//! assert!(filter.contains(7));
//!
//! assert!(filter.erase(7));
//! assert!(!filter.contains(7));
//! ```
//!
//! # Notes
//!
//! - Inserting can fail near capacity. `insert` then returns `false` and leaves the filter
//!   exactly as it was.
//! - Only erase keys that were inserted. Erasing a key that was never added may remove the
//!   fingerprint of a different key that happens to share it.

mod builder;
mod sketch;

pub use self::builder::CuckooFilterBuilder;
pub use self::sketch::CuckooFilter;
pub use self::sketch::CuckooStats;
