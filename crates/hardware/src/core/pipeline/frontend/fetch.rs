//! Fetch orchestrator.
//!
//! Drives the BPU one cycle at a time: predict a fetch bundle, fetch and
//! validate each instruction against its per-slot prediction, and either
//! hand the bundle downstream or discard it on the first BTB miss and
//! retry the same PC next cycle. Consistent BTB bundles are offered to the
//! trace cache's line-fill buffer at the end of the cycle.
//!
//! The instruction source stands in for the MMU and instruction cache,
//! which live outside this crate. A PC the source cannot supply becomes a
//! NOP carrying a fetch-exception marker, which surfaces at retirement
//! through the active list's exception bit.

use tracing::trace;

use crate::common::{INSN_BYTES, PredTag};
use crate::core::units::bru::Bpu;
use crate::isa::{Insn, opcodes};

/// Supplies raw instruction encodings to the fetch engine.
///
/// `None` models a fetch fault (translation failure or access fault); the
/// fetch engine injects an exception-marked NOP in its place.
pub trait InsnSource {
    /// Loads the instruction at `pc`.
    fn load_insn(&self, pc: u64) -> Option<Insn>;
}

/// A fetched instruction with its prediction bookkeeping, as handed to
/// decode.
#[derive(Clone, Copy, Debug)]
pub struct FetchedInsn {
    /// Program counter of the instruction.
    pub pc: u64,
    /// Raw encoding (a NOP when `fetch_exception` is set).
    pub insn: Insn,
    /// Predicted next PC after this instruction.
    pub next_pc: u64,
    /// Branch queue tag, present when this slot was predicted as a branch.
    pub pred_tag: Option<PredTag>,
    /// The instruction could not be fetched; carries an injected NOP.
    pub fetch_exception: bool,
}

/// Result of one fetch cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A consistent bundle of this many instructions was produced.
    Bundle(usize),
    /// The bundle was discarded on a BTB miss; the same PC is retried
    /// next cycle with the missing branch installed.
    BtbMissRetry,
}

/// Per-cycle fetch engine state: the fetch PC and the machine width.
#[derive(Debug)]
pub struct FetchUnit {
    pc: u64,
    width: usize,
}

impl FetchUnit {
    /// Creates a fetch engine starting at `start_pc` for an `n`-wide
    /// machine.
    pub const fn new(start_pc: u64, width: usize) -> Self {
        Self {
            pc: start_pc,
            width,
        }
    }

    /// The PC the next cycle will fetch from.
    pub const fn pc(&self) -> u64 {
        self.pc
    }

    /// Redirects fetch (branch resolution or trap vector).
    pub const fn set_pc(&mut self, pc: u64) {
        self.pc = pc;
    }

    /// Runs one fetch cycle.
    ///
    /// Appends the fetched bundle to `out`. On a BTB miss the appended
    /// entries are removed again, the BPU is rolled back and trained, and
    /// the PC is left unchanged for the retry.
    ///
    /// # Panics
    ///
    /// Panics when the BPU's prediction is inconsistent with the fetched
    /// instructions (a branch where none was predicted terminating the
    /// bundle early, a disagreeing next PC, or a non-maximal sequential
    /// bundle); these are modeling faults, not architectural events.
    pub fn cycle(
        &mut self,
        bpu: &mut Bpu,
        source: &impl InsnSource,
        out: &mut Vec<FetchedInsn>,
    ) -> FetchOutcome {
        let prediction = bpu.predict(self.pc);
        // Checkpoint the payload area so a malformed bundle can be undone.
        let payload_mark = out.len();
        let save_pc = self.pc;

        let mut btb_miss: Option<(usize, u64, Insn)> = None;
        let mut next_tag = 0usize;
        let mut fetched = 0usize;

        while fetched < prediction.len && btb_miss.is_none() {
            let i = fetched;
            let pc = self.pc;

            let (insn, fetch_exception) = match source.load_insn(pc) {
                Some(insn) => (insn, false),
                None => (Insn::NOP, true),
            };

            let slot_is_branch = prediction.branch_vector & (1 << i) != 0;
            let is_last = i == prediction.len - 1;
            let seq_pc = pc + INSN_BYTES;
            let mut pred_tag = None;

            let next_pc = match insn.opcode() {
                opcodes::OP_JAL => {
                    let direct_target = insn.jal_target(pc);
                    if slot_is_branch {
                        if prediction.tc_hit {
                            // The trace knows exactly where its branches
                            // are; only its final slot decides the next
                            // fetch PC.
                            if is_last {
                                assert_eq!(prediction.next_pc, direct_target);
                            }
                        } else {
                            // A detected jump always ends a BTB bundle.
                            assert!(is_last);
                            assert_eq!(prediction.next_pc, direct_target);
                        }
                        pred_tag = Some(prediction.branch_tags[next_tag]);
                        next_tag += 1;
                        direct_target
                    } else {
                        btb_miss = Some((i, direct_target, insn));
                        pc
                    }
                }

                opcodes::OP_JALR => {
                    if slot_is_branch {
                        // Indirect kinds terminate every bundle, trace or
                        // sequential; the BPU supplied the next PC.
                        assert!(is_last);
                        pred_tag = Some(prediction.branch_tags[next_tag]);
                        next_tag += 1;
                        prediction.next_pc
                    } else {
                        btb_miss = Some((i, 0, insn));
                        pc
                    }
                }

                opcodes::OP_BRANCH => {
                    let direct_target = insn.branch_target(pc);
                    if slot_is_branch {
                        let taken = prediction.pred_vector & (1 << i) != 0;
                        let next = if taken { direct_target } else { seq_pc };
                        if is_last {
                            assert_eq!(next, prediction.next_pc);
                        } else if !prediction.tc_hit {
                            // An interior conditional branch of a
                            // sequential bundle must be predicted
                            // not-taken.
                            assert_eq!(next, seq_pc);
                        }
                        pred_tag = Some(prediction.branch_tags[next_tag]);
                        next_tag += 1;
                        next
                    } else {
                        btb_miss = Some((i, direct_target, insn));
                        pc
                    }
                }

                _ => {
                    // Neither the trace cache nor the BTB may presume a
                    // non-branch to be a branch.
                    assert!(!slot_is_branch, "branch predicted at non-branch slot");
                    if is_last {
                        // A bundle that ends without a branch must span
                        // the full width and continue sequentially.
                        assert_eq!(prediction.len, self.width);
                        assert_eq!(prediction.next_pc, seq_pc);
                    }
                    seq_pc
                }
            };

            if btb_miss.is_some() {
                break;
            }

            out.push(FetchedInsn {
                pc,
                insn,
                next_pc,
                pred_tag,
                fetch_exception,
            });
            self.pc = next_pc;
            fetched += 1;
        }

        let outcome = if let Some((miss_slot, target, insn)) = btb_miss {
            // BTB misses are never reported under a trace cache hit: the
            // trace records branch positions exactly.
            assert!(!prediction.tc_hit, "BTB miss within a trace cache bundle");

            out.truncate(payload_mark);
            self.pc = save_pc;
            bpu.btb_miss(prediction.fetch_tag, save_pc, miss_slot, target, insn);
            trace!(pc = save_pc, miss_slot, "fetch bundle discarded, retrying");
            FetchOutcome::BtbMissRetry
        } else {
            assert_eq!(self.pc, prediction.next_pc);
            FetchOutcome::Bundle(fetched)
        };

        bpu.trace_construct(outcome != FetchOutcome::BtbMissRetry, prediction.tc_hit);
        outcome
    }
}
