//! End-to-End Front-End Scenarios.
//!
//! Full predict/fetch/validate/train flows across the BPU, the fetch
//! orchestrator, and the trace cache, using history-free predictors where
//! determinism matters.

use tracefront_core::Bpu;
use tracefront_core::config::Config;
use tracefront_core::core::pipeline::frontend::{FetchOutcome, FetchUnit};

use crate::common::{Program, beq, call, jal, ret, small_config};

/// A machine whose gshare histories are zero-length, so every prediction
/// for a PC hits the same table entry regardless of path history.
fn history_free_config(width: usize, cond: usize) -> Config {
    let mut config = small_config(width, cond);
    config.bpu.cb_bhr_bits = 0;
    config.bpu.ib_bhr_bits = 0;
    config
}

// ══════════════════════════════════════════════════════════
// S1. Conditional-branch training to saturation
// ══════════════════════════════════════════════════════════

#[test]
fn repeated_taken_branch_saturates_its_counter() {
    let mut bpu = Bpu::new(&history_free_config(2, 2));

    let pred = bpu.predict(0x1000);
    bpu.btb_miss(pred.fetch_tag, 0x1000, 0, 0x1F00, beq(16));

    for _ in 0..16 {
        let pred = bpu.predict(0x1000);
        let tag = pred.branch_tags[0];
        if pred.pred_vector & 1 == 0 {
            bpu.mispredict(tag, true, 0x1F00);
        }
        bpu.commit(tag);
    }

    let pred = bpu.predict(0x1000);
    assert_eq!(pred.pred_vector & 1, 1, "saturated counter predicts taken");
    assert_eq!(pred.len, 1);
    assert_eq!(pred.next_pc, 0x1F00);
    // Two cold mispredictions, fourteen correct predictions.
    assert_eq!(bpu.stats().branch_n, 16);
    assert_eq!(bpu.stats().branch_m, 2);
}

// ══════════════════════════════════════════════════════════
// S2. BTB miss retry through the fetch engine
// ══════════════════════════════════════════════════════════

#[test]
fn btb_miss_discards_bundle_then_retry_terminates_when_taken() {
    let mut bpu = Bpu::new(&history_free_config(2, 2));
    let mut fetch = FetchUnit::new(0x2000, 2);
    let mut program = Program::new();
    let _ = program.put(0x2000, beq(0x40));

    let mut out = Vec::new();

    // Cold BTB: the conditional at slot 0 is unknown; the whole bundle is
    // discarded and the PC stands still.
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::BtbMissRetry);
    assert!(out.is_empty());
    assert_eq!(fetch.pc(), 0x2000);

    // Train the branch taken through two mispredicted iterations.
    for _ in 0..2 {
        out.clear();
        fetch.set_pc(0x2000);
        let outcome = fetch.cycle(&mut bpu, &program, &mut out);
        assert_eq!(outcome, FetchOutcome::Bundle(2), "not-taken bundle spans the width");
        let tag = out[0].pred_tag.unwrap();
        bpu.mispredict(tag, true, 0x2040);
        bpu.commit(tag);
    }

    // Predicted taken now: the bundle terminates at slot 0 and fetch
    // follows the branch target.
    out.clear();
    fetch.set_pc(0x2000);
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::Bundle(1));
    assert_eq!(out[0].next_pc, 0x2040);
    assert_eq!(fetch.pc(), 0x2040);
}

// ══════════════════════════════════════════════════════════
// S3. Call/return pairing through the RAS
// ══════════════════════════════════════════════════════════

#[test]
fn call_and_return_pair_through_the_ras() {
    let mut bpu = Bpu::new(&history_free_config(2, 2));
    let mut fetch = FetchUnit::new(0x1000, 2);
    let mut program = Program::new();
    let _ = program.put(0x1000, call(0x6000)); // call 0x7000
    let _ = program.put(0x7000, ret());

    let mut out = Vec::new();

    // Call: miss, retry, follow into the callee.
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::BtbMissRetry);
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::Bundle(1));
    assert_eq!(fetch.pc(), 0x7000);
    let call_tag = out[0].pred_tag.unwrap();

    // Return: miss, retry, and the RAS supplies the call's successor.
    out.clear();
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::BtbMissRetry);
    assert_eq!(fetch.cycle(&mut bpu, &program, &mut out), FetchOutcome::Bundle(1));
    assert_eq!(fetch.pc(), 0x1004, "return address is the PC after the call");
    let ret_tag = out[0].pred_tag.unwrap();

    bpu.commit(call_tag);
    bpu.commit(ret_tag);
    assert_eq!(bpu.stats().call_direct_n, 1);
    assert_eq!(bpu.stats().return_n, 1);
}

// ══════════════════════════════════════════════════════════
// S6. Trace construction and trace cache override
// ══════════════════════════════════════════════════════════

#[test]
fn accreted_trace_overrides_the_btb_bundle() {
    // Program shape: taken branch at 0x3000 -> 0x3100; jump at 0x3100 ->
    // 0x3200; cold (not-taken) branch at 0x3200.
    let mut bpu = Bpu::new(&history_free_config(4, 2));

    // Install all three branches.
    let p = bpu.predict(0x3000);
    bpu.btb_miss(p.fetch_tag, 0x3000, 0, 0x3100, beq(0x100));
    let p = bpu.predict(0x3100);
    bpu.btb_miss(p.fetch_tag, 0x3100, 0, 0x3200, jal(0, 0x100));
    let p = bpu.predict(0x3200);
    bpu.btb_miss(p.fetch_tag, 0x3200, 0, 0x3300, beq(0x100));

    // Train the first branch taken.
    for _ in 0..2 {
        let p = bpu.predict(0x3000);
        bpu.mispredict(p.branch_tags[0], true, 0x3100);
        bpu.commit(p.branch_tags[0]);
    }

    // Fetch the path once, offering each validated bundle to the line
    // fill: [branch taken] ++ [jump] ++ [branch not-taken, ...].
    let p1 = bpu.predict(0x3000);
    assert!(!p1.tc_hit);
    assert_eq!(p1.len, 1);
    bpu.trace_construct(true, p1.tc_hit);
    bpu.commit(p1.branch_tags[0]);

    let p2 = bpu.predict(0x3100);
    assert_eq!(p2.len, 1);
    bpu.trace_construct(true, p2.tc_hit);
    bpu.commit(p2.branch_tags[0]);

    let p3 = bpu.predict(0x3200);
    bpu.trace_construct(true, p3.tc_hit);
    bpu.commit(p3.branch_tags[0]);

    // The accreted trace [branch, jump, branch] now overrides the BTB for
    // the next fetch of 0x3000.
    let p4 = bpu.predict(0x3000);
    assert!(p4.tc_hit, "trace cache supplies the bundle");
    assert_eq!(p4.len, 3);
    assert_eq!(p4.branch_vector, 0b111);
    assert_eq!(p4.pred_vector & 1, 1, "interior branch still predicted taken");
    assert_eq!(
        p4.next_pc, 0x3204,
        "trace exits through the third branch's fall-through"
    );
    assert_eq!(bpu.stats().tc_hits, 1);

    // All three trace branches are outstanding and commit in order.
    assert_eq!(p4.num_branches, 3);
    for b in 0..3 {
        bpu.commit(p4.branch_tags[b]);
    }
}
