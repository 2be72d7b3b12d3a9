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

//! Xor filter implementation for probabilistic set membership testing.
//!
//! Xor filters are immutable, space-efficient structures with no false negatives. Each key is
//! mapped to three slots of a fingerprint array, and construction chooses slot values so that
//! the three slots of every key XOR to that key's fingerprint. Finding such an assignment
//! means peeling a random 3-uniform hypergraph, which succeeds with high probability once the
//! array has about 1.23 slots per key.
//!
//! # Usage
//!
//! ```rust
//! use amqfilter::xor::BuildStatus;
//! use amqfilter::xor::XorFilter;
//!
//! let keys: Vec<u64> = (0..10_000).collect();
//! let filter = XorFilter::builder().fingerprint_bits(12).build(&keys).unwrap();
//!
//! assert!(matches!(filter.status(), BuildStatus::Built { .. }));
//! assert!(filter.contains(42));
//! ```
//!
//! # Notes
//!
//! - Xor filters are immutable once built.
//! - Duplicate keys are removed before construction.
//! - If no attempt produces a peelable hypergraph, the filter is built in the
//!   [`BuildStatus::Failed`] state, where `contains` always returns `false`.

mod builder;
mod sketch;

pub use self::builder::XorFilterBuilder;
pub use self::sketch::BuildStatus;
pub use self::sketch::XorFilter;
pub use self::sketch::XorStats;
