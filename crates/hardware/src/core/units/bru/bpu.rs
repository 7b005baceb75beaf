//! Branch Prediction Unit (BPU).
//!
//! The BPU orchestrates every front-end prediction structure: the banked
//! BTB, the trace cache metadata, the conditional-branch and
//! indirect-target gshare tables, the return address stack, and the branch
//! queue of outstanding predictions. It provides:
//! 1. **Prediction:** a fetch bundle per cycle — length, per-slot branch
//!    descriptors, next PC, and per-branch tags.
//! 2. **Recovery:** precise roll-back for BTB misses, branch
//!    mispredictions, and complete squashes, from per-branch checkpoints.
//! 3. **Training:** predictor updates at in-order branch commit, using each
//!    branch's fetch-time context.
//! 4. **Trace construction:** feeding validated bundles to the trace
//!    cache's line-fill buffer.

use tracing::trace;

use crate::common::{BranchKind, BtbSlot, INSN_BYTES, MAX_FETCH_WIDTH, PredTag};
use crate::config::Config;
use crate::core::units::bru::bq::BranchQueue;
use crate::core::units::bru::btb::{Btb, BundlePrediction};
use crate::core::units::bru::gshare::GshareIndex;
use crate::core::units::bru::ras::Ras;
use crate::core::units::bru::tcm::Tcm;
use crate::isa::Insn;
use crate::stats::BpuStats;

/// The BPU's answer for one fetch cycle.
#[derive(Clone, Copy, Debug)]
pub struct FetchPrediction {
    /// Roll-back point for the whole bundle; pass to
    /// [`Bpu::btb_miss`] if fetch finds a branch the BTB missed.
    pub fetch_tag: PredTag,
    /// Per-branch tags in bundle order; `branch_tags[..num_branches]` are
    /// valid. Passed back via [`Bpu::mispredict`] and [`Bpu::commit`].
    pub branch_tags: [PredTag; MAX_FETCH_WIDTH],
    /// Number of branches predicted within the bundle.
    pub num_branches: usize,
    /// True when the trace cache supplied this (non-sequential) bundle.
    pub tc_hit: bool,
    /// Predicted bundle length (1..=n).
    pub len: usize,
    /// Bit i set when slot i is a branch.
    pub branch_vector: u64,
    /// Bit i set when slot i is a conditional branch predicted taken.
    pub pred_vector: u64,
    /// Predicted start PC of the next fetch bundle.
    pub next_pc: u64,
}

/// Latched copy of the most recent BTB bundle, offered to the trace
/// cache's line-fill buffer at the end of the fetch cycle.
#[derive(Clone, Copy, Debug, Default)]
struct TraceLatch {
    pc: u64,
    cb_predictions: u64,
    len: usize,
    slots: [BtbSlot; MAX_FETCH_WIDTH],
}

/// Branch Prediction Unit: all prediction state plus its measurements.
pub struct Bpu {
    /// Maximum conditional branches per fetch bundle (`m`).
    cond_branch_budget: usize,

    /// Outstanding branch predictions, oldest at head.
    bq: BranchQueue,
    /// Branch locations, kinds, and direct targets per slot.
    btb: Btb,
    /// Alternate bundle provider for non-sequential fetch bundles.
    tcm: Tcm,

    /// Packed 2-bit counters for conditional branches; `m` per word.
    cb_table: Vec<u64>,
    cb_index: GshareIndex,
    /// Predicted targets for indirect jumps and calls.
    ib_table: Vec<u64>,
    ib_index: GshareIndex,

    /// Predicted return targets.
    ras: Ras,

    /// Commit-time measurements.
    stats: BpuStats,
    /// Bundle latched for trace construction.
    trace_latch: TraceLatch,
}

impl Bpu {
    /// Builds the BPU and every structure it owns from the configuration.
    ///
    /// # Panics
    ///
    /// Panics on geometries [`Config::validate`] would reject.
    pub fn new(config: &Config) -> Self {
        let n = config.fetch.width;
        let m = config.fetch.cond_branches;
        assert!(n.is_power_of_two() && n <= MAX_FETCH_WIDTH);

        let cb_index = GshareIndex::new(
            config.bpu.cb_pc_bits,
            config.bpu.cb_bhr_bits,
            config.bpu.index_mix,
        );
        let ib_index = GshareIndex::new(
            config.bpu.ib_pc_bits,
            config.bpu.ib_bhr_bits,
            config.bpu.index_mix,
        );
        let cb_table = vec![0; cb_index.table_size()];
        let ib_table = vec![0; ib_index.table_size()];

        Self {
            cond_branch_budget: m,
            bq: BranchQueue::new(config.bpu.bq_size),
            btb: Btb::new(config.bpu.btb_entries, n, config.bpu.btb_assoc, m),
            tcm: Tcm::new(
                config.tcm.entries,
                n,
                config.tcm.assoc,
                m,
                config.tcm.fill_on_taken_branch,
            ),
            cb_table,
            cb_index,
            ib_table,
            ib_index,
            ras: Ras::new(config.bpu.ras_size),
            stats: BpuStats::default(),
            trace_latch: TraceLatch::default(),
        }
    }

    /// Predicts the fetch bundle starting at `pc`.
    ///
    /// Marks the branch queue, snapshots the front-end context, queries the
    /// BTB (overlaid by the trace cache on a hit), then pushes one branch
    /// queue entry per predicted branch while updating the speculative
    /// histories and the RAS.
    ///
    /// # Panics
    ///
    /// Panics if a non-conditional branch is predicted anywhere but the
    /// last bundle slot, or if a predicted return disagrees with the RAS.
    pub fn predict(&mut self, pc: u64) -> FetchPrediction {
        // Record where the branch queue is now, so a BTB miss can undo the
        // whole bundle.
        let (mark_index, mark_phase) = self.bq.mark();

        // Fetch-time context. Each branch of the bundle carries this, so
        // commit can re-reference the same predictor entries.
        let fetch_pc = pc;
        let fetch_cb_bhr = self.cb_index.bhr();
        let fetch_ib_bhr = self.ib_index.bhr();
        let fetch_ras_tos = self.ras.tos();

        // Seed the marked slot with the fetch-time snapshot: a bundle with
        // no predicted branches never writes it otherwise, and btb_miss
        // restores from this slot unconditionally.
        {
            let entry = &mut self.bq[mark_index];
            entry.precise_cb_bhr = fetch_cb_bhr;
            entry.precise_ib_bhr = fetch_ib_bhr;
            entry.precise_ras_tos = fetch_ras_tos;
        }

        // Search all structures "in parallel": conditional counters,
        // indirect target, RAS peek, and the BTB bundle.
        let cb_predictions = self.cb_table[self.cb_index.index(pc)];
        let ib_predicted_target = self.ib_table[self.ib_index.index(pc)];
        let ras_predicted_target = self.ras.peek();

        let mut bundle: BundlePrediction = self.btb.lookup(pc, cb_predictions);
        let tc_hit = self.tcm.lookup(pc, cb_predictions, &mut bundle);
        if tc_hit {
            self.stats.tc_hits += 1;
        }

        // Latch the bundle for end-of-cycle trace construction.
        self.trace_latch = TraceLatch {
            pc,
            cb_predictions,
            len: bundle.len,
            slots: bundle.slots,
        };

        let mut pred = FetchPrediction {
            fetch_tag: PredTag::fuse(mark_index, mark_phase),
            branch_tags: [PredTag::default(); MAX_FETCH_WIDTH],
            num_branches: 0,
            tc_hit,
            len: bundle.len,
            branch_vector: 0,
            pred_vector: 0,
            next_pc: bundle.next_pc,
        };

        let mut cb = cb_predictions;
        let mut cond_pos = 0u64;

        for i in 0..bundle.len {
            let slot = bundle.slots[i];
            if !slot.hit {
                continue;
            }
            pred.branch_vector |= 1 << i;

            let (index, phase) = self.bq.push();
            pred.branch_tags[pred.num_branches] = PredTag::fuse(index, phase);
            pred.num_branches += 1;

            // Context fields common to every branch kind. The precise
            // snapshot is taken before this branch's own updates below.
            {
                let entry = &mut self.bq[index];
                entry.kind = slot.kind;
                entry.misp = false;
                entry.precise_cb_bhr = self.cb_index.bhr();
                entry.precise_ib_bhr = self.ib_index.bhr();
                entry.precise_ras_tos = self.ras.tos();
                entry.fetch_pc = fetch_pc;
                entry.fetch_cb_bhr = fetch_cb_bhr;
                entry.fetch_ib_bhr = fetch_ib_bhr;
                entry.fetch_cb_pos = 0;
            }

            // Sequential PC after this slot: the call return address and
            // the not-taken fall-through.
            let next_seq_pc = fetch_pc + (i as u64 + 1) * INSN_BYTES;
            let is_last = i == bundle.len - 1;

            match slot.kind {
                BranchKind::Conditional => {
                    // The low two bits are this branch's counter.
                    let taken = (cb & 3) >= 2;
                    cb >>= 2;
                    if taken {
                        pred.pred_vector |= 1 << i;
                    }

                    let entry = &mut self.bq[index];
                    entry.taken = taken;
                    entry.next_pc = if taken { slot.target } else { next_seq_pc };
                    entry.fetch_cb_pos = cond_pos;
                    cond_pos += 1;

                    self.cb_index.update_bhr(taken);
                    self.ib_index.update_bhr(taken);
                }

                BranchKind::JumpDirect => {
                    let entry = &mut self.bq[index];
                    entry.taken = true;
                    entry.next_pc = slot.target;
                }

                BranchKind::CallDirect => {
                    // One RAS operation per fetch cycle: the call must end
                    // the bundle.
                    assert!(is_last, "direct call not at end of fetch bundle");
                    self.ras.push(next_seq_pc);
                    let entry = &mut self.bq[index];
                    entry.taken = true;
                    entry.next_pc = slot.target;
                }

                BranchKind::JumpIndirect => {
                    assert!(is_last, "indirect jump not at end of fetch bundle");
                    // Neither the TCM nor the BTB could provide the next
                    // PC; the indirect-target table does.
                    pred.next_pc = ib_predicted_target;
                    let entry = &mut self.bq[index];
                    entry.taken = true;
                    entry.next_pc = ib_predicted_target;
                }

                BranchKind::CallIndirect => {
                    assert!(is_last, "indirect call not at end of fetch bundle");
                    pred.next_pc = ib_predicted_target;
                    self.ras.push(next_seq_pc);
                    let entry = &mut self.bq[index];
                    entry.taken = true;
                    entry.next_pc = ib_predicted_target;
                }

                BranchKind::Return => {
                    assert!(is_last, "return not at end of fetch bundle");
                    pred.next_pc = ras_predicted_target;
                    let popped = self.ras.pop();
                    assert_eq!(popped, ras_predicted_target, "RAS peek/pop mismatch");
                    let entry = &mut self.bq[index];
                    entry.taken = true;
                    entry.next_pc = ras_predicted_target;
                }
            }
        }

        debug_assert!(cond_pos <= self.cond_branch_budget as u64);
        pred
    }

    /// Handles a BTB miss detected while validating the predicted bundle.
    ///
    /// Rolls the branch queue back to the bundle's mark, restores both
    /// speculative histories and the RAS TOS from the marked snapshot, and
    /// installs the missing branch so the retried prediction sees it.
    pub fn btb_miss(&mut self, fetch_tag: PredTag, pc: u64, miss_slot: usize, target: u64, insn: Insn) {
        let index = fetch_tag.index();
        self.bq.rollback(index, fetch_tag.phase(), false);

        let entry = self.bq[index];
        self.cb_index.set_bhr(entry.precise_cb_bhr);
        self.ib_index.set_bhr(entry.precise_ib_bhr);
        self.ras.set_tos(entry.precise_ras_tos);

        trace!(pc, miss_slot, target, "BTB miss: bundle rolled back");
        self.btb.update(pc, miss_slot, target, insn);
    }

    /// Handles a detected branch misprediction.
    ///
    /// Rolls the branch queue back to the branch (inclusive) and re-pushes
    /// that single entry, corrects its outcome, restores the speculative
    /// histories and RAS TOS from its precise snapshot, and flags it for
    /// the misprediction measurements at commit.
    ///
    /// # Panics
    ///
    /// Panics if the reported outcome does not actually contradict the
    /// prediction, or if a non-conditional branch is reported not-taken.
    pub fn mispredict(&mut self, branch_tag: PredTag, taken: bool, next_pc: u64) {
        let index = branch_tag.index();
        let phase = branch_tag.phase();

        self.bq.rollback(index, phase, true);
        let repushed = self.bq.push();
        assert_eq!(repushed, (index, phase), "re-push must land on the rolled-back entry");

        let entry = &mut self.bq[index];
        assert_ne!(entry.next_pc, next_pc, "misprediction with identical next PC");
        entry.next_pc = next_pc;
        if entry.kind.is_conditional() {
            assert_ne!(entry.taken, taken, "misprediction with identical direction");
            entry.taken = taken;
        } else {
            assert!(taken && entry.taken, "non-conditional branches are always taken");
        }
        entry.misp = true;

        let (cb_bhr, ib_bhr, ras_tos) = (
            entry.precise_cb_bhr,
            entry.precise_ib_bhr,
            entry.precise_ras_tos,
        );
        self.cb_index.set_bhr(cb_bhr);
        self.ib_index.set_bhr(ib_bhr);
        self.ras.set_tos(ras_tos);

        trace!(tag = branch_tag.0, taken, next_pc, "branch mispredicted");
    }

    /// Commits the branch at the head of the branch queue.
    ///
    /// Trains the conditional-branch counters (or writes the resolved
    /// indirect target) using the branch's fetch-time context, then
    /// updates the per-category measurements.
    ///
    /// # Panics
    ///
    /// Panics if `branch_tag` is not the oldest outstanding branch, or if
    /// a direct jump or call was flagged mispredicted.
    pub fn commit(&mut self, branch_tag: PredTag) {
        let (index, phase) = self.bq.pop();
        assert_eq!(
            branch_tag,
            PredTag::fuse(index, phase),
            "commit must observe branch queue head order"
        );

        let entry = self.bq[index];
        match entry.kind {
            BranchKind::Conditional => {
                // Re-reference the same packed counter word this branch's
                // fetch bundle used, then train only its 2-bit field.
                let word = self.cb_index.index_with(entry.fetch_pc, entry.fetch_cb_bhr);
                let shamt = entry.fetch_cb_pos << 1;
                let mask = 3u64 << shamt;
                let mut ctr = (self.cb_table[word] & mask) >> shamt;
                if entry.taken {
                    if ctr < 3 {
                        ctr += 1;
                    }
                } else if ctr > 0 {
                    ctr -= 1;
                }
                self.cb_table[word] = (self.cb_table[word] & !mask) | (ctr << shamt);

                self.stats.branch_n += 1;
                if entry.misp {
                    self.stats.branch_m += 1;
                }
            }

            BranchKind::JumpDirect => {
                self.stats.jump_direct_n += 1;
                assert!(!entry.misp, "direct jumps cannot mispredict");
            }

            BranchKind::CallDirect => {
                self.stats.call_direct_n += 1;
                assert!(!entry.misp, "direct calls cannot mispredict");
            }

            BranchKind::JumpIndirect | BranchKind::CallIndirect => {
                // Write the resolved target at the fetch-time index.
                let word = self.ib_index.index_with(entry.fetch_pc, entry.fetch_ib_bhr);
                self.ib_table[word] = entry.next_pc;

                if entry.kind == BranchKind::JumpIndirect {
                    self.stats.jump_indirect_n += 1;
                    if entry.misp {
                        self.stats.jump_indirect_m += 1;
                    }
                } else {
                    self.stats.call_indirect_n += 1;
                    if entry.misp {
                        self.stats.call_indirect_m += 1;
                    }
                }
            }

            BranchKind::Return => {
                self.stats.return_n += 1;
                if entry.misp {
                    self.stats.return_m += 1;
                }
            }
        }
    }

    /// Complete squash: rolls the branch queue back to its head and
    /// restores the speculative histories and RAS TOS from the oldest
    /// outstanding branch's snapshot.
    pub fn flush(&mut self) {
        let head = self.bq.flush();
        let entry = self.bq[head];
        self.cb_index.set_bhr(entry.precise_cb_bhr);
        self.ib_index.set_bhr(entry.precise_ib_bhr);
        self.ras.set_tos(entry.precise_ras_tos);
        trace!("front end flushed to branch queue head");
    }

    /// End-of-cycle trace construction hook.
    ///
    /// Offers the latched bundle to the trace cache's line-fill buffer,
    /// but only when fetch validated the bundle (no BTB miss) and it came
    /// from the BTB rather than the trace cache.
    pub fn trace_construct(&mut self, bundle_valid: bool, tc_hit: bool) {
        if !bundle_valid || tc_hit {
            return;
        }
        let latch = self.trace_latch;
        self.tcm.line_fill_buffer(latch.pc, latch.cb_predictions, latch.len, &latch.slots);
    }

    /// Commit-time measurements.
    pub const fn stats(&self) -> &BpuStats {
        &self.stats
    }

    /// Writes the branch prediction measurement report to `out`.
    ///
    /// # Errors
    ///
    /// Propagates formatting errors from the sink.
    pub fn output<W: std::fmt::Write>(&self, num_instr: u64, out: &mut W) -> std::fmt::Result {
        self.stats.report(num_instr, out)
    }
}

impl std::fmt::Debug for Bpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bpu")
            .field("cond_branch_budget", &self.cond_branch_budget)
            .field("outstanding", &self.bq.len())
            .finish_non_exhaustive()
    }
}
