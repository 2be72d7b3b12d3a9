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

//! Quotient filter for probabilistic set membership testing with deletion.
//!
//! A quotient filter splits each key's hash into a quotient, which picks a home slot, and a
//! remainder, which is what gets stored. Three metadata bits per slot (`occupied`,
//! `continuation`, `shifted`) make it possible to recover the quotient of every stored
//! remainder even after it has been pushed away from its home by collisions. Every insert and
//! erase rewrites the cluster of neighbouring slots it touches, so operations cost time
//! proportional to the cluster length.
//!
//! # Usage
//!
//! ```rust
//! use amqfilter::quotient::QuotientFilterBuilder;
//!
//! let mut filter = QuotientFilterBuilder::with_capacity(10_000)
//!     .load_factor(0.75)
//!     .fingerprint_bits(12)
//!     .build()
//!     .unwrap();
//!
//! for key in 0..100 {
//!     assert!(filter.insert(key));
//! }
//! assert!(filter.contains(42));
//! assert!(filter.validate());
//! ```
//!
//! # Notes
//!
//! - Keys with the same quotient and remainder are indistinguishable. Erasing a key that was
//!   never inserted can remove such a colliding member, which then stops being found.
//! - The table never fills up completely: one slot is always left empty.

mod builder;
mod sketch;
mod slots;

pub use self::builder::QuotientFilterBuilder;
pub use self::sketch::QuotientFilter;
pub use self::sketch::QuotientStats;
