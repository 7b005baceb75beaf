//! Branch Queue (BQ) Tests.
//!
//! Verifies the phase-bit full/empty discipline, fused tag stability, and
//! the mark/rollback/flush recovery surface, including a property over
//! arbitrary push/pop interleavings.

use proptest::prelude::*;
use tracefront_core::common::PredTag;
use tracefront_core::core::units::bru::bq::BranchQueue;

// ══════════════════════════════════════════════════════════
// 1. Full vs. empty at head == tail
// ══════════════════════════════════════════════════════════

#[test]
fn full_and_empty_disambiguated_by_phase() {
    let mut bq = BranchQueue::new(4);
    assert!(bq.is_empty() && !bq.is_full());

    for _ in 0..4 {
        let _ = bq.push();
    }
    assert!(bq.is_full() && !bq.is_empty());

    for _ in 0..4 {
        let _ = bq.pop();
    }
    assert!(bq.is_empty() && !bq.is_full());
}

#[test]
#[should_panic(expected = "overflow")]
fn push_into_full_queue_panics() {
    let mut bq = BranchQueue::new(2);
    let _ = bq.push();
    let _ = bq.push();
    let _ = bq.push();
}

#[test]
#[should_panic(expected = "underflow")]
fn pop_from_empty_queue_panics() {
    let mut bq = BranchQueue::new(2);
    let _ = bq.pop();
}

// ══════════════════════════════════════════════════════════
// 2. Phase and fused tags
// ══════════════════════════════════════════════════════════

#[test]
fn tail_phase_toggles_on_every_wrap() {
    let mut bq = BranchQueue::new(3);
    let mut phases = Vec::new();
    for _ in 0..9 {
        let (_, phase) = bq.push();
        phases.push(phase);
        let _ = bq.pop();
    }
    // Three allocations per phase value, alternating.
    assert_eq!(
        phases,
        vec![false, false, false, true, true, true, false, false, false]
    );
}

#[test]
fn fused_tag_round_trips_index_and_phase() {
    let tag = PredTag::fuse(13, true);
    assert_eq!(tag.0, (13 << 1) | 1);
    assert_eq!(tag.index(), 13);
    assert!(tag.phase());
}

// ══════════════════════════════════════════════════════════
// 3. Recovery surface
// ══════════════════════════════════════════════════════════

#[test]
fn rollback_to_mark_then_repush_reuses_slots() {
    let mut bq = BranchQueue::new(8);
    let (mark_idx, mark_phase) = bq.mark();
    let first = bq.push();
    let _ = bq.push();

    bq.rollback(mark_idx, mark_phase, false);
    assert!(bq.is_empty());
    assert_eq!(bq.push(), first);
}

#[test]
fn inclusive_rollback_keeps_entry_contents() {
    let mut bq = BranchQueue::new(8);
    let (idx, phase) = bq.push();
    bq[idx].next_pc = 0x4444;
    bq[idx].taken = true;
    let _ = bq.push();
    let _ = bq.push();

    bq.rollback(idx, phase, true);
    assert_eq!(bq.push(), (idx, phase));
    assert_eq!(bq[idx].next_pc, 0x4444);
    assert!(bq[idx].taken);
}

#[test]
fn flush_returns_head_for_snapshot_restore() {
    let mut bq = BranchQueue::new(4);
    let _ = bq.push();
    let _ = bq.pop();
    let (head, _) = bq.push();
    let _ = bq.push();
    let _ = bq.push();

    assert_eq!(bq.flush(), head);
    assert!(bq.is_empty());
}

// ══════════════════════════════════════════════════════════
// 4. Properties
// ══════════════════════════════════════════════════════════

proptest! {
    /// Occupancy tracks pushes minus pops, and full/empty remain mutually
    /// exclusive, across arbitrary interleavings.
    #[test]
    fn occupancy_is_consistent(ops in proptest::collection::vec(any::<bool>(), 0..256)) {
        let size = 4;
        let mut bq = BranchQueue::new(size);
        let mut expected = 0usize;
        for push in ops {
            if push {
                if expected < size {
                    let _ = bq.push();
                    expected += 1;
                }
            } else if expected > 0 {
                let _ = bq.pop();
                expected -= 1;
            }
            prop_assert_eq!(bq.len(), expected);
            prop_assert_eq!(bq.is_empty(), expected == 0);
            prop_assert_eq!(bq.is_full(), expected == size);
        }
    }

    /// Fused tags never repeat among simultaneously outstanding branches.
    #[test]
    fn outstanding_tags_are_unique(ops in proptest::collection::vec(any::<bool>(), 0..256)) {
        let size = 8;
        let mut bq = BranchQueue::new(size);
        let mut outstanding: Vec<PredTag> = Vec::new();
        for push in ops {
            if push {
                if !bq.is_full() {
                    let (idx, phase) = bq.push();
                    outstanding.push(PredTag::fuse(idx, phase));
                }
            } else if !bq.is_empty() {
                let (idx, phase) = bq.pop();
                let expected = outstanding.remove(0);
                prop_assert_eq!(PredTag::fuse(idx, phase), expected);
            }
            let mut tags: Vec<u64> = outstanding.iter().map(|t| t.0).collect();
            tags.sort_unstable();
            tags.dedup();
            prop_assert_eq!(tags.len(), outstanding.len());
        }
    }
}
