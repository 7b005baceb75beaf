//! Trace Cache Metadata (TCM).
//!
//! The trace cache is a "BTB alternate" for non-sequential fetch bundles: a
//! hit overrides the BTB's sequential bundle with a recorded trace — its
//! length, per-slot branch metadata, and next PC. Traces are built online
//! by a line-fill buffer that accretes consecutive BTB-hit bundles as the
//! front end fetches them.
//!
//! Trace selection (enforced during fill): stop after the `m`-th
//! conditional branch; stop after any direct call, indirect jump, indirect
//! call, or return; any number of direct jumps may be embedded.
//!
//! A trace's conditional branches are matched by ordinal: bit `j` of
//! `br_mask`/`br_flags` describes the `j`-th conditional branch along the
//! trace. A trace that ends in a conditional branch excludes that branch
//! from the match (`ends_in_br`); its live prediction instead selects
//! between the recorded taken target and the fall-through PC at lookup.

use tracing::trace;

use crate::common::{BranchKind, BtbSlot, INSN_BYTES, MAX_FETCH_WIDTH};
use crate::core::units::bru::btb::BundlePrediction;

/// A stored trace.
#[derive(Clone, Copy, Debug, Default)]
struct TcmEntry {
    /// Metadata for hit/miss determination and replacement.
    valid: bool,
    tag: u64,
    lru: u64,
    /// Recorded direction of the j-th conditional branch (bit j).
    br_flags: u64,
    /// Bit j set when the trace contains a j-th (interior) conditional branch.
    br_mask: u64,

    /// Trace length in instructions.
    len: usize,
    /// Per-slot branch metadata, as captured from the BTB bundles.
    slots: [BtbSlot; MAX_FETCH_WIDTH],
    /// True when the final slot is a conditional branch whose direction is
    /// resolved at lookup time rather than matched.
    ends_in_br: bool,
    /// Next PC when the trace does not exit through a taken final branch.
    fall_thru_pc: u64,
}

/// Line-fill buffer: a scratch trace accumulated across fetch bundles.
#[derive(Clone, Copy, Debug, Default)]
struct LineFill {
    /// A fill is in progress.
    valid: bool,
    /// The fill has reached a terminator and awaits commit.
    full: bool,
    /// Key PC of the trace (first bundle's start PC).
    pc: u64,
    /// Packed counter word captured at fill start, used to locate the
    /// entry to replace at commit.
    cb_predictions: u64,
    /// Instructions accumulated so far.
    len: usize,
    /// Accumulated slots.
    slots: [BtbSlot; MAX_FETCH_WIDTH],
    /// Accumulated conditional directions, ordinal-indexed.
    dirs: u64,
    /// Accumulated conditional mask, ordinal-indexed.
    mask: u64,
    /// Conditional branches accumulated.
    cond_count: usize,
    /// The most recently appended slot is a conditional branch.
    last_is_cond: bool,
    /// Resolved at finalization.
    ends_in_br: bool,
    /// Running fall-through PC.
    fall_thru_pc: u64,
}

/// Set-associative trace store plus its line-fill buffer.
pub struct Tcm {
    entries: Vec<TcmEntry>,
    sets: usize,
    assoc: usize,
    log2_sets: u32,
    /// Maximum trace length (`n`, the fetch width).
    trace_width: usize,
    /// Maximum conditional branches per trace (`m`).
    cond_branch_budget: usize,
    /// Discard fills containing no predicted-taken conditional branch.
    fill_on_taken_branch: bool,

    fill: LineFill,
    fill_checkpoint: LineFill,
}

impl Tcm {
    /// Creates a trace cache of `num_entries` instruction slots organized
    /// as `assoc`-way sets of `trace_width`-instruction traces.
    ///
    /// # Panics
    ///
    /// Panics unless the derived set count is a power of two.
    pub fn new(
        num_entries: usize,
        trace_width: usize,
        assoc: usize,
        cond_branch_budget: usize,
        fill_on_taken_branch: bool,
    ) -> Self {
        assert!(trace_width <= MAX_FETCH_WIDTH);
        let sets = num_entries / (trace_width * assoc);
        assert!(sets.is_power_of_two(), "TCM set count must be a power of two");

        let mut entries = vec![TcmEntry::default(); sets * assoc];
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.lru = (i % assoc) as u64;
        }

        Self {
            entries,
            sets,
            assoc,
            log2_sets: sets.trailing_zeros(),
            trace_width,
            cond_branch_budget,
            fill_on_taken_branch,
            fill: LineFill::default(),
            fill_checkpoint: LineFill::default(),
        }
    }

    /// Searches for a trace rooted at `pc` consistent with the current
    /// conditional predictions. On a hit, overwrites `bundle` with the
    /// stored trace and returns true.
    pub fn lookup(&mut self, pc: u64, cb_predictions: u64, bundle: &mut BundlePrediction) -> bool {
        let preds = self.unpack(cb_predictions);
        let (set, tag) = self.key(pc);

        let Some(way) = self.find(set, tag, preds).0 else {
            return false;
        };

        let entry = self.entries[set * self.assoc + way];
        debug_assert!(entry.len <= self.trace_width);
        bundle.len = entry.len;
        bundle.slots = entry.slots;

        // The terminal conditional branch (if any) sits after the interior
        // conditionals, so its live prediction is the next ordinal bit.
        let interior = entry.br_mask.count_ones() as usize;
        let last_taken = (preds >> interior) & 1 == 1;
        bundle.next_pc = if entry.ends_in_br && last_taken {
            entry.slots[entry.len - 1].target
        } else {
            entry.fall_thru_pc
        };

        self.update_lru(set, way);
        true
    }

    /// Offers a validated BTB-hit fetch bundle to the line-fill buffer.
    ///
    /// The first offer starts a fill keyed by `pc`; subsequent offers
    /// append until a terminator is reached, at which point the fill is
    /// committed into the trace store (or discarded by policy).
    pub fn line_fill_buffer(
        &mut self,
        pc: u64,
        cb_predictions: u64,
        bundle_len: usize,
        slots: &[BtbSlot],
    ) {
        self.fill_checkpoint = self.fill;

        if !self.fill.valid {
            self.fill = LineFill {
                valid: true,
                pc,
                cb_predictions,
                ..LineFill::default()
            };
        }

        let mut cb = cb_predictions;
        // Follow the predicted path through this bundle to keep the
        // fall-through PC current.
        let mut seq_pc = pc;
        let mut cond_fall_thru = pc;
        let mut appended = 0usize;
        let mut terminal = false;

        for &slot in slots.iter().take(bundle_len) {
            if self.fill.len == self.trace_width
                || self.fill.cond_count == self.cond_branch_budget
            {
                break;
            }

            seq_pc += INSN_BYTES;
            self.fill.last_is_cond = false;

            if slot.hit && slot.kind.is_conditional() {
                let taken = (cb & 3) >= 2;
                cb >>= 2;
                cond_fall_thru = seq_pc;
                self.fill.dirs |= (taken as u64) << self.fill.cond_count;
                self.fill.mask |= 1 << self.fill.cond_count;
                self.fill.cond_count += 1;
                self.fill.last_is_cond = true;
                if taken {
                    seq_pc = slot.target;
                }
            } else if slot.hit && slot.kind == BranchKind::JumpDirect {
                cond_fall_thru = slot.target;
                seq_pc = slot.target;
            }

            self.fill.slots[self.fill.len] = slot;
            self.fill.len += 1;
            appended += 1;

            if slot.hit && !slot.kind.is_conditional() && slot.kind != BranchKind::JumpDirect {
                // Direct calls and all indirect kinds end trace selection.
                terminal = true;
                self.fill.full = true;
                break;
            }
        }

        debug_assert!(appended > 0, "line fill offered to a saturated buffer");
        debug_assert!(self.fill.len <= self.trace_width);

        let last = self.fill.slots[self.fill.len - 1];
        self.fill.fall_thru_pc = if terminal || (last.hit && last.kind == BranchKind::JumpDirect) {
            last.target
        } else if self.fill.last_is_cond {
            cond_fall_thru
        } else {
            seq_pc
        };

        if self.fill.len == self.trace_width || self.fill.cond_count == self.cond_branch_budget {
            self.fill.full = true;
        }

        if self.fill.full {
            if self.fill_on_taken_branch && self.fill.dirs == 0 {
                trace!(pc = self.fill.pc, "line fill discarded: no taken conditional");
                self.clear_line_fill();
            } else {
                if self.fill.last_is_cond {
                    // The trace ends in a conditional branch: exclude it
                    // from the match and resolve its direction at lookup.
                    self.fill.ends_in_br = true;
                    self.fill.cond_count -= 1;
                    self.fill.mask &= !(1 << self.fill.cond_count);
                    self.fill.dirs &= !(1 << self.fill.cond_count);
                }
                self.commit_line_fill();
            }
        }
    }

    /// Finalizes a full line fill into the trace store at the LRU way of
    /// its indexed set (or over an existing matching trace).
    pub fn commit_line_fill(&mut self) {
        if !self.fill.full {
            return;
        }

        let preds = self.unpack(self.fill.cb_predictions);
        let (set, tag) = self.key(self.fill.pc);
        let (hit_way, victim) = self.find(set, tag, preds);
        let way = hit_way.unwrap_or(victim);

        self.entries[set * self.assoc + way] = TcmEntry {
            valid: true,
            tag,
            lru: self.entries[set * self.assoc + way].lru,
            br_flags: self.fill.dirs,
            br_mask: self.fill.mask,
            len: self.fill.len,
            slots: self.fill.slots,
            ends_in_br: self.fill.ends_in_br,
            fall_thru_pc: self.fill.fall_thru_pc,
        };
        self.update_lru(set, way);
        trace!(
            pc = self.fill.pc,
            len = self.fill.len,
            ends_in_br = self.fill.ends_in_br,
            "trace committed"
        );

        self.clear_line_fill();
    }

    /// Restores the line-fill buffer to its state before the most recent
    /// `line_fill_buffer` call.
    pub fn rollback_line_fill(&mut self) {
        self.fill = self.fill_checkpoint;
    }

    /// Abandons the in-progress fill.
    pub fn clear_line_fill(&mut self) {
        self.fill = LineFill::default();
    }

    /// Expands a packed counter word into per-ordinal taken bits.
    fn unpack(&self, mut cb_predictions: u64) -> u64 {
        let mut preds = 0u64;
        for j in 0..self.cond_branch_budget {
            preds |= u64::from((cb_predictions & 3) >= 2) << j;
            cb_predictions >>= 2;
        }
        preds
    }

    /// Set index and tag for a trace key PC.
    fn key(&self, pc: u64) -> (usize, u64) {
        let word = pc >> 2;
        ((word & (self.sets as u64 - 1)) as usize, word >> self.log2_sets)
    }

    /// Searches a set: returns the hit way (if any) and the LRU victim.
    fn find(&self, set: usize, tag: u64, preds: u64) -> (Option<usize>, usize) {
        let mut victim = 0;
        for way in 0..self.assoc {
            let entry = &self.entries[set * self.assoc + way];
            if entry.valid
                && entry.tag == tag
                && (entry.br_mask & preds) == (entry.br_mask & entry.br_flags)
            {
                return (Some(way), victim);
            }
            if entry.lru == (self.assoc as u64 - 1) {
                victim = way;
            }
        }
        (None, victim)
    }

    /// Makes `way` the most recently used in its set (true LRU).
    fn update_lru(&mut self, set: usize, way: usize) {
        let pivot = self.entries[set * self.assoc + way].lru;
        for w in 0..self.assoc {
            let idx = set * self.assoc + w;
            if self.entries[idx].lru < pivot {
                self.entries[idx].lru += 1;
            }
        }
        self.entries[set * self.assoc + way].lru = 0;
    }
}

impl std::fmt::Debug for Tcm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tcm")
            .field("sets", &self.sets)
            .field("assoc", &self.assoc)
            .field("trace_width", &self.trace_width)
            .finish_non_exhaustive()
    }
}
