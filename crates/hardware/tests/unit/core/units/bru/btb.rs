//! Branch Target Buffer (BTB) Tests.
//!
//! Verifies banked lookup/update semantics, bundle termination rules,
//! LRU replacement, and geometry edge cases from one bank up to the full
//! sixteen.

use rstest::rstest;
use tracefront_core::common::BranchKind;
use tracefront_core::core::units::bru::btb::Btb;
use tracefront_core::isa::Insn;

use crate::common::{beq, call, jal, jalr, ret};

// ══════════════════════════════════════════════════════════
// 1. Update/lookup round trip
// ══════════════════════════════════════════════════════════

#[test]
fn update_then_lookup_returns_kind_and_target() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 2, 0x2000, jal(0, 0x100));

    let bundle = btb.lookup(0x1000, 0);
    assert!(bundle.slots[2].hit);
    assert_eq!(bundle.slots[2].kind, BranchKind::JumpDirect);
    assert_eq!(bundle.slots[2].target, 0x2000);
    assert_eq!(bundle.len, 3, "jump terminates the bundle at its slot");
}

#[rstest]
#[case::conditional(beq(16), BranchKind::Conditional)]
#[case::jump_direct(jal(0, 16), BranchKind::JumpDirect)]
#[case::call_direct(call(16), BranchKind::CallDirect)]
#[case::jump_indirect(jalr(0, 5), BranchKind::JumpIndirect)]
#[case::call_indirect(jalr(1, 5), BranchKind::CallIndirect)]
#[case::ret(ret(), BranchKind::Return)]
fn decode_covers_the_wire_taxonomy(#[case] insn: Insn, #[case] expected: BranchKind) {
    assert_eq!(Btb::decode(insn), expected);
}

// ══════════════════════════════════════════════════════════
// 2. Bundle termination rules
// ══════════════════════════════════════════════════════════

#[test]
fn open_bundle_runs_full_width_sequentially() {
    let mut btb = Btb::new(128, 8, 2, 2);
    let bundle = btb.lookup(0x4000, 0);
    assert_eq!(bundle.len, 8);
    assert_eq!(bundle.next_pc, 0x4000 + 8 * 4);
}

#[test]
fn taken_conditional_ends_bundle_at_its_slot() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 1, 0x5000, beq(16));

    // Strongly-taken counter in the low two bits.
    let bundle = btb.lookup(0x1000, 0b11);
    assert_eq!(bundle.len, 2);
    assert_eq!(bundle.next_pc, 0x5000);
}

#[test]
fn not_taken_conditional_does_not_end_bundle() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 1, 0x5000, beq(16));

    let bundle = btb.lookup(0x1000, 0b00);
    assert_eq!(bundle.len, 4);
    assert_eq!(bundle.next_pc, 0x1010);
}

#[test]
fn second_conditional_consumes_next_counter_pair() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 0, 0x5000, beq(16));
    btb.update(0x1000, 2, 0x6000, beq(16));

    // Slot 0 not-taken (bits 1:0 = 00), slot 2 taken (bits 3:2 = 11).
    let bundle = btb.lookup(0x1000, 0b1100);
    assert_eq!(bundle.len, 3);
    assert_eq!(bundle.next_pc, 0x6000);
}

#[test]
fn m_th_conditional_terminates_even_when_not_taken() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 0, 0x5000, beq(16));
    btb.update(0x1000, 1, 0x6000, beq(16));

    let bundle = btb.lookup(0x1000, 0);
    assert_eq!(bundle.len, 2, "m = 2 conditionals cap the bundle");
    assert_eq!(bundle.next_pc, 0x1008);
}

// ══════════════════════════════════════════════════════════
// 3. Banking
// ══════════════════════════════════════════════════════════

#[rstest]
#[case::single_bank(1)]
#[case::two_banks(2)]
#[case::full_width(16)]
fn every_slot_maps_to_its_own_bank(#[case] banks: usize) {
    // With assoc 1 and one set per bank, filling every slot of one bundle
    // must not evict anything: each slot owns a distinct bank.
    let mut btb = Btb::new(banks, banks, 1, banks);
    for slot in 0..banks {
        btb.update(0x8000, slot, 0x9000 + (slot as u64) * 4, beq(16));
    }
    let bundle = btb.lookup(0x8000, 0);
    let hits = bundle.slots[..banks].iter().filter(|s| s.hit).count();
    // Bundle may terminate early at the m-th conditional; count hits up
    // to the predicted length instead of the full width.
    assert!(hits >= bundle.len.min(banks));
}

// ══════════════════════════════════════════════════════════
// 4. Replacement
// ══════════════════════════════════════════════════════════

#[test]
fn lru_way_is_replaced_on_conflict() {
    // 1 bank, 2 sets, 2 ways: three same-set entries force an eviction.
    let mut btb = Btb::new(4, 1, 2, 1);
    btb.update(0x00, 0, 0xA0, jal(0, 16)); // set 0
    btb.update(0x10, 0, 0xB0, jal(0, 16)); // set 0
    // Touch the first entry so the second becomes LRU.
    assert_eq!(btb.lookup(0x00, 0).next_pc, 0xA0);

    btb.update(0x20, 0, 0xC0, jal(0, 16)); // evicts 0x10
    assert_eq!(btb.lookup(0x00, 0).next_pc, 0xA0);
    assert_eq!(btb.lookup(0x20, 0).next_pc, 0xC0);
    assert!(!btb.lookup(0x10, 0).slots[0].hit, "LRU entry was evicted");
}

#[test]
#[should_panic(expected = "preceded by a miss")]
fn double_insert_panics() {
    let mut btb = Btb::new(64, 4, 2, 2);
    btb.update(0x1000, 0, 0x2000, jal(0, 16));
    btb.update(0x1000, 0, 0x3000, jal(0, 16));
}
