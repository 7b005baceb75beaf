//! Branch Target Buffer (BTB).
//!
//! The BTB locates branches within a sequential fetch bundle and provides
//! their kinds and taken targets (the latter for conditional branches and
//! direct jumps/calls). Its output, combined with the packed conditional
//! branch predictions, determines the fetch bundle's length and selects the
//! next fetch PC among multiple choices.
//!
//! The BTB is banked: one bank per instruction slot of the maximum-width
//! fetch bundle, so all `n` slots can be searched in the same cycle and a
//! replacement for one slot can never evict another slot's entry.

use crate::common::{BranchKind, BtbSlot, INSN_BYTES, MAX_FETCH_WIDTH};
use crate::isa::{Insn, abi, opcodes};

/// A BTB entry.
#[derive(Clone, Copy, Debug, Default)]
struct BtbEntry {
    /// Indicates if this entry contains valid data.
    valid: bool,
    /// Tag for hit/miss determination within a set.
    tag: u64,
    /// LRU rank within the set; 0 is most recently used.
    lru: u64,
    /// Branch classification payload.
    kind: BranchKind,
    /// Predicted taken target payload.
    target: u64,
}

/// A predicted fetch bundle, as produced by the BTB (and optionally
/// overridden by the trace cache).
#[derive(Clone, Copy, Debug)]
pub struct BundlePrediction {
    /// Number of instructions in the bundle (1..=n).
    pub len: usize,
    /// Per-slot branch metadata; slots beyond `len` are meaningless.
    pub slots: [BtbSlot; MAX_FETCH_WIDTH],
    /// Predicted next fetch PC. For bundles ending in an indirect jump,
    /// indirect call, or return this is provisional; the BPU overrides it
    /// from the indirect-target table or the RAS.
    pub next_pc: u64,
}

impl Default for BundlePrediction {
    fn default() -> Self {
        Self {
            len: 0,
            slots: [BtbSlot::default(); MAX_FETCH_WIDTH],
            next_pc: 0,
        }
    }
}

/// Outcome of a set search: the hit coordinates, or the victim way.
struct SearchResult {
    hit: bool,
    set: usize,
    way: usize,
}

/// Banked, set-associative Branch Target Buffer.
pub struct Btb {
    /// Entry storage, laid out `[bank][set][way]`.
    entries: Vec<BtbEntry>,
    /// Bank count; equals the fetch width `n` and must be a power of two.
    banks: usize,
    /// Sets per bank; power of two.
    sets: usize,
    /// Ways per set.
    assoc: usize,
    /// PC bits consumed by bank selection.
    log2_banks: u32,
    /// PC bits consumed by set selection.
    log2_sets: u32,
    /// Maximum conditional branches per fetch bundle (`m`).
    cond_branch_budget: usize,
}

impl Btb {
    /// Creates a BTB with `num_entries` total entries split across `banks`
    /// banks of `assoc`-way sets.
    ///
    /// # Panics
    ///
    /// Panics unless `banks` and the derived set count are powers of two
    /// and `banks <= MAX_FETCH_WIDTH`.
    pub fn new(num_entries: usize, banks: usize, assoc: usize, cond_branch_budget: usize) -> Self {
        assert!(banks.is_power_of_two() && banks <= MAX_FETCH_WIDTH);
        let sets = num_entries / (banks * assoc);
        assert!(sets.is_power_of_two(), "BTB set count must be a power of two");

        let mut entries = vec![BtbEntry::default(); banks * sets * assoc];
        // Seed LRU ranks so every rank 0..assoc appears once per set.
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.lru = (i % assoc) as u64;
        }

        Self {
            entries,
            banks,
            sets,
            assoc,
            log2_banks: banks.trailing_zeros(),
            log2_sets: sets.trailing_zeros(),
            cond_branch_budget,
        }
    }

    /// Predicts the sequential fetch bundle starting at `pc`.
    ///
    /// `cb_predictions` packs `m` 2-bit counters; each conditional branch
    /// encountered consumes the low two bits. The bundle terminates at the
    /// first predicted-taken branch, at the `m`-th conditional branch, at
    /// any non-conditional branch, or at `n` slots.
    pub fn lookup(&mut self, pc: u64, mut cb_predictions: u64) -> BundlePrediction {
        let mut bundle = BundlePrediction::default();
        let mut num_cond_branch = 0;
        let mut terminated = false;

        for pos in 0..self.banks {
            let (bank, insn_pc) = self.convert(pc, pos);
            let result = self.search(bank, insn_pc);
            if !result.hit {
                bundle.slots[pos].hit = false;
                continue;
            }

            let entry = self.entries[self.index_of(bank, result.set, result.way)];
            bundle.slots[pos] = BtbSlot {
                hit: true,
                kind: entry.kind,
                target: entry.target,
            };
            self.update_lru(bank, result.set, result.way);

            if entry.kind.is_conditional() {
                // The low two bits are the counter for this branch; shift
                // them out to set up the next conditional branch.
                let taken = (cb_predictions & 3) >= 2;
                cb_predictions >>= 2;
                num_cond_branch += 1;

                if taken || num_cond_branch == self.cond_branch_budget {
                    terminated = true;
                    bundle.len = pos + 1;
                    bundle.next_pc = if taken {
                        entry.target
                    } else {
                        pc + (bundle.len as u64) * INSN_BYTES
                    };
                    break;
                }
            } else {
                // All other branch kinds are unconditionally taken. The
                // target is provisional for indirect kinds.
                terminated = true;
                bundle.len = pos + 1;
                bundle.next_pc = entry.target;
                break;
            }
        }

        if !terminated {
            bundle.len = self.banks;
            bundle.next_pc = pc + (self.banks as u64) * INSN_BYTES;
        }

        debug_assert!(bundle.len <= self.banks);
        bundle
    }

    /// Installs the branch that missed at `(pc, slot)` into its bank.
    ///
    /// Must be preceded by a miss: the caller reports only genuine BTB
    /// misses, and the victim way returned by the search is replaced.
    ///
    /// # Panics
    ///
    /// Panics if the branch is already present.
    pub fn update(&mut self, pc: u64, slot: usize, target: u64, insn: Insn) {
        let (bank, insn_pc) = self.convert(pc, slot);
        let result = self.search(bank, insn_pc);
        assert!(!result.hit, "BTB update must be preceded by a miss search");

        let tag = insn_pc >> self.log2_sets;
        let kind = Self::decode(insn);
        let idx = self.index_of(bank, result.set, result.way);
        self.entries[idx] = BtbEntry {
            valid: true,
            tag,
            lru: self.entries[idx].lru,
            kind,
            target,
        };
        self.update_lru(bank, result.set, result.way);
    }

    /// Classifies a control-transfer instruction from its encoding.
    ///
    /// A JAL that saves its return address into the ABI link register (x1)
    /// is a call; a JALR that discards its link (writes x0) and jumps
    /// through x1 is a return; a JALR that links into x1 is an indirect
    /// call; any other JALR is an indirect jump.
    ///
    /// # Panics
    ///
    /// Panics on a non-control-flow opcode.
    pub fn decode(insn: Insn) -> BranchKind {
        match insn.opcode() {
            opcodes::OP_BRANCH => BranchKind::Conditional,
            opcodes::OP_JAL => {
                if insn.rd() == abi::REG_RA {
                    BranchKind::CallDirect
                } else {
                    BranchKind::JumpDirect
                }
            }
            opcodes::OP_JALR => {
                if insn.rd() == abi::REG_ZERO && insn.rs1() == abi::REG_RA {
                    BranchKind::Return
                } else if insn.rd() == abi::REG_RA {
                    BranchKind::CallIndirect
                } else {
                    BranchKind::JumpIndirect
                }
            }
            opcode => panic!("not a control-transfer opcode: {opcode:#09b}"),
        }
    }

    /// Converts `(bundle pc, slot)` to `(bank, instruction pc)`.
    ///
    /// The instruction-level PC is `(pc >> 2) + slot`; its low bits select
    /// the bank and are then discarded, since they are implied by which
    /// bank is referenced.
    fn convert(&self, pc: u64, slot: usize) -> (usize, u64) {
        let insn_addr = (pc >> 2) + slot as u64;
        let bank = (insn_addr & (self.banks as u64 - 1)) as usize;
        (bank, insn_addr >> self.log2_banks)
    }

    /// Searches `bank` for `insn_pc`, returning either the hit coordinates
    /// or the set's LRU way as the replacement victim.
    fn search(&self, bank: usize, insn_pc: u64) -> SearchResult {
        let set = (insn_pc & (self.sets as u64 - 1)) as usize;
        let tag = insn_pc >> self.log2_sets;

        let mut victim = self.assoc;
        for way in 0..self.assoc {
            let entry = &self.entries[self.index_of(bank, set, way)];
            if entry.valid && entry.tag == tag {
                return SearchResult {
                    hit: true,
                    set,
                    way,
                };
            }
            if entry.lru == (self.assoc as u64 - 1) {
                victim = way;
            }
        }
        debug_assert!(victim < self.assoc);
        SearchResult {
            hit: false,
            set,
            way: victim,
        }
    }

    /// Makes `way` the most recently used in its set (true LRU).
    fn update_lru(&mut self, bank: usize, set: usize, way: usize) {
        let pivot = self.entries[self.index_of(bank, set, way)].lru;
        for w in 0..self.assoc {
            let idx = self.index_of(bank, set, w);
            if self.entries[idx].lru < pivot {
                self.entries[idx].lru += 1;
            }
        }
        let idx = self.index_of(bank, set, way);
        self.entries[idx].lru = 0;
    }

    /// Flattened storage index for `[bank][set][way]`.
    #[inline]
    fn index_of(&self, bank: usize, set: usize, way: usize) -> usize {
        (bank * self.sets + set) * self.assoc + way
    }
}

impl std::fmt::Debug for Btb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Btb")
            .field("banks", &self.banks)
            .field("sets", &self.sets)
            .field("assoc", &self.assoc)
            .finish_non_exhaustive()
    }
}
