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

//! Slot storage of the quotient filter.
//!
//! Each slot is packed into one `u32`:
//!
//! ```text
//!  bit 18      bit 17    bit 16         bits 0..16
//! +----------+---------+--------------+-----------+
//! | occupied | shifted | continuation | remainder |
//! +----------+---------+--------------+-----------+
//! ```
//!
//! `occupied` describes the slot as a quotient home ("some run belongs here"), while the
//! other three fields describe the entry physically stored in the slot. The two are
//! independent, which is why [`Slot`] does not carry the occupied bit.

const REMAINDER_MASK: u32 = 0xffff;
const CONTINUATION: u32 = 1 << 16;
const SHIFTED: u32 = 1 << 17;
const OCCUPIED: u32 = 1 << 18;

/// The entry stored in one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Slot {
    /// Remainder 0, continuation and shifted clear.
    Empty,
    /// First remainder of a run.
    RunHead { shifted: bool, remainder: u16 },
    /// Any later remainder of a run. Always shifted in a well-formed table.
    RunContinuation { shifted: bool, remainder: u16 },
}

impl Slot {
    fn encode(self) -> u32 {
        match self {
            Slot::Empty => 0,
            Slot::RunHead { shifted, remainder } => u32::from(remainder) | shift_bit(shifted),
            Slot::RunContinuation { shifted, remainder } => {
                u32::from(remainder) | CONTINUATION | shift_bit(shifted)
            }
        }
    }

    fn decode(word: u32) -> Slot {
        let word = word & !OCCUPIED;
        if word == 0 {
            return Slot::Empty;
        }
        let shifted = word & SHIFTED != 0;
        let remainder = (word & REMAINDER_MASK) as u16;
        if word & CONTINUATION != 0 {
            Slot::RunContinuation { shifted, remainder }
        } else {
            Slot::RunHead { shifted, remainder }
        }
    }

    pub(super) fn is_empty(self) -> bool {
        matches!(self, Slot::Empty)
    }

    pub(super) fn is_shifted(self) -> bool {
        match self {
            Slot::Empty => false,
            Slot::RunHead { shifted, .. } | Slot::RunContinuation { shifted, .. } => shifted,
        }
    }

    pub(super) fn is_continuation(self) -> bool {
        matches!(self, Slot::RunContinuation { .. })
    }

    /// The stored remainder, 0 for an empty slot.
    pub(super) fn remainder(self) -> u16 {
        match self {
            Slot::Empty => 0,
            Slot::RunHead { remainder, .. } | Slot::RunContinuation { remainder, .. } => remainder,
        }
    }
}

#[inline]
fn shift_bit(shifted: bool) -> u32 {
    if shifted { SHIFTED } else { 0 }
}

/// A power-of-two ring of packed slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct SlotTable {
    words: Vec<u32>,
    mask: usize,
}

impl SlotTable {
    pub(super) fn new(capacity: usize) -> Self {
        debug_assert!(capacity.is_power_of_two());
        SlotTable {
            words: vec![0; capacity],
            mask: capacity - 1,
        }
    }

    pub(super) fn capacity(&self) -> usize {
        self.words.len()
    }

    pub(super) fn mask(&self) -> usize {
        self.mask
    }

    /// Index `distance` slots to the right of `start`, wrapping around.
    #[inline]
    pub(super) fn offset(&self, start: usize, distance: usize) -> usize {
        start.wrapping_add(distance) & self.mask
    }

    /// Distance from `start` to `index` walking right, wrapping around.
    #[inline]
    pub(super) fn distance(&self, start: usize, index: usize) -> usize {
        index.wrapping_sub(start) & self.mask
    }

    #[inline]
    pub(super) fn prev(&self, index: usize) -> usize {
        index.wrapping_sub(1) & self.mask
    }

    #[inline]
    pub(super) fn get(&self, index: usize) -> Slot {
        Slot::decode(self.words[index])
    }

    /// Stores an entry, leaving the slot's occupied bit alone.
    #[inline]
    pub(super) fn set(&mut self, index: usize, slot: Slot) {
        let word = &mut self.words[index];
        *word = (*word & OCCUPIED) | slot.encode();
    }

    #[inline]
    pub(super) fn is_occupied(&self, index: usize) -> bool {
        self.words[index] & OCCUPIED != 0
    }

    #[inline]
    pub(super) fn set_occupied(&mut self, index: usize, occupied: bool) {
        if occupied {
            self.words[index] |= OCCUPIED;
        } else {
            self.words[index] &= !OCCUPIED;
        }
    }

    /// Number of non-empty slots in the whole table.
    pub(super) fn count_entries(&self) -> usize {
        (0..self.capacity())
            .filter(|&i| !self.get(i).is_empty())
            .count()
    }

    /// Checks the local invariants of slot `index`.
    ///
    /// - an empty slot is never a quotient home (`occupied` implies a stored entry);
    /// - a stored remainder is never 0;
    /// - continuations are shifted and follow a non-empty slot;
    /// - shifted entries follow a non-empty slot;
    /// - an unshifted entry sits at its own home, so it heads a run and its slot is occupied.
    pub(super) fn is_well_formed(&self, index: usize) -> bool {
        let slot = self.get(index);
        let occupied = self.is_occupied(index);
        let prev_empty = self.get(self.prev(index)).is_empty();
        match slot {
            Slot::Empty => !occupied,
            Slot::RunHead { remainder: 0, .. } | Slot::RunContinuation { remainder: 0, .. } => {
                false
            }
            Slot::RunContinuation { shifted, .. } => shifted && !prev_empty,
            Slot::RunHead { shifted: true, .. } => !prev_empty,
            Slot::RunHead { shifted: false, .. } => occupied,
        }
    }
}
