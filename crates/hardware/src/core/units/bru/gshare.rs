//! Gshare index function.
//!
//! A [`GshareIndex`] owns a branch history register (BHR) and maps
//! `{PC, BHR}` to a prediction-table index. Two independent instances are
//! used by the BPU: one in front of the packed conditional-branch counter
//! table, one in front of the indirect-target table.
//!
//! The BHR is speculative: it is shifted at prediction time, and restored
//! from a branch queue checkpoint on every roll-back.

use crate::config::IndexMix;

/// Gshare index state: a PC slice width, a BHR, and the mixing function.
#[derive(Clone, Debug)]
pub struct GshareIndex {
    /// Number of PC bits in the index; the table holds `1 << pc_bits` entries.
    pc_bits: usize,
    /// Branch history register length.
    bhr_bits: usize,
    /// The branch history register proper.
    bhr: u64,
    /// How the history is mixed into the PC slice.
    mix: IndexMix,
}

impl GshareIndex {
    /// Creates an index function of `1 << pc_bits` entries with a
    /// `bhr_bits`-deep history.
    ///
    /// # Panics
    ///
    /// Panics if the history is longer than the index.
    pub fn new(pc_bits: usize, bhr_bits: usize, mix: IndexMix) -> Self {
        assert!(
            bhr_bits <= pc_bits,
            "BHR length {bhr_bits} exceeds index width {pc_bits}"
        );
        Self {
            pc_bits,
            bhr_bits,
            bhr: 0,
            mix,
        }
    }

    /// Number of entries in the table this index addresses.
    #[inline]
    pub const fn table_size(&self) -> usize {
        1 << self.pc_bits
    }

    /// Indexes with the current (speculative) history.
    #[inline]
    pub fn index(&self, pc: u64) -> usize {
        self.index_with(pc, self.bhr)
    }

    /// Indexes with an explicit history value.
    ///
    /// Used at commit to re-reference the same entry a branch's fetch
    /// bundle used, from its checkpointed fetch-time history.
    pub fn index_with(&self, pc: u64, bhr: u64) -> usize {
        let index_mask = (1u64 << self.pc_bits) - 1;
        let bhr = bhr & self.bhr_mask();
        // The history occupies the high bits of the index in either mode.
        let shifted = bhr << (self.pc_bits - self.bhr_bits);
        let pc_slice = pc >> 2;
        let mixed = match self.mix {
            IndexMix::Xor => (pc_slice & index_mask) ^ shifted,
            IndexMix::Concat => {
                let pc_mask = (1u64 << (self.pc_bits - self.bhr_bits)) - 1;
                shifted | (pc_slice & pc_mask)
            }
        };
        (mixed & index_mask) as usize
    }

    /// The current history value, checkpointed into each branch queue entry.
    #[inline]
    pub const fn bhr(&self) -> u64 {
        self.bhr
    }

    /// Restores the history from a checkpoint (roll-back path).
    #[inline]
    pub const fn set_bhr(&mut self, bhr: u64) {
        self.bhr = bhr;
    }

    /// Shifts a predicted conditional-branch direction into the history.
    #[inline]
    pub const fn update_bhr(&mut self, taken: bool) {
        self.bhr = ((self.bhr << 1) | taken as u64) & self.bhr_mask();
    }

    #[inline]
    const fn bhr_mask(&self) -> u64 {
        if self.bhr_bits == 0 {
            0
        } else {
            (1u64 << self.bhr_bits) - 1
        }
    }
}
